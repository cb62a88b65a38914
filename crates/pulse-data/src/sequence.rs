//! Flow step ordering.
//!
//! Exports carry no explicit step number, so a message's position in its
//! flow is inferred from the first day it was ever sent.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDateTime;
use pulse_core::models::{FlowSequenceInfo, ProcessedFlowEmail};

/// One sighting of a flow message on a given send time.
#[derive(Debug, Clone, Copy)]
pub struct FlowMessageObservation<'a> {
    pub flow_id: &'a str,
    pub message_id: &'a str,
    pub sent_at: NaiveDateTime,
}

/// Position keyed by `(flow_id, message_id)`.
pub type SequenceMap = HashMap<(String, String), u32>;

/// Assign 1-based step positions per flow.
///
/// Messages are ordered by their earliest observed send time. Two messages
/// first seen at the same time are ordered by message id so the result does
/// not depend on row order.
pub fn resolve_sequence(observations: &[FlowMessageObservation<'_>]) -> SequenceMap {
    let mut earliest: HashMap<&str, HashMap<&str, NaiveDateTime>> = HashMap::new();
    for obs in observations {
        let first_seen = earliest
            .entry(obs.flow_id)
            .or_default()
            .entry(obs.message_id)
            .or_insert(obs.sent_at);
        if obs.sent_at < *first_seen {
            *first_seen = obs.sent_at;
        }
    }

    let mut positions = SequenceMap::new();
    for (flow_id, messages) in earliest {
        let mut ordered: Vec<(NaiveDateTime, &str)> = messages
            .into_iter()
            .map(|(message_id, first_seen)| (first_seen, message_id))
            .collect();
        ordered.sort();

        for (index, (_, message_id)) in ordered.into_iter().enumerate() {
            positions.insert(
                (flow_id.to_string(), message_id.to_string()),
                index as u32 + 1,
            );
        }
    }
    positions
}

/// The flow id that `flow` refers to.
///
/// An exact flow id match wins. Otherwise `flow` is read as a flow name and
/// the id whose most recent send carries that name is returned, so two flows
/// sharing a name never merge.
pub fn resolve_flow_id<'a>(flow_emails: &'a [ProcessedFlowEmail], flow: &str) -> Option<&'a str> {
    if let Some(email) = flow_emails.iter().find(|e| e.flow_id == flow) {
        return Some(email.flow_id.as_str());
    }
    flow_emails
        .iter()
        .filter(|e| e.flow_name == flow)
        .max_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.flow_id.cmp(&b.flow_id)))
        .map(|e| e.flow_id.as_str())
}

/// Step order and display names of one flow, given by id or name.
///
/// Each step's name is taken from its most recent send, since messages are
/// often renamed while the flow is live. The flow's own name is likewise the
/// one on its latest send.
pub fn flow_sequence_info(
    flow_emails: &[ProcessedFlowEmail],
    flow: &str,
) -> Option<FlowSequenceInfo> {
    let flow_id = resolve_flow_id(flow_emails, flow)?;
    let emails: Vec<&ProcessedFlowEmail> = flow_emails
        .iter()
        .filter(|e| e.flow_id == flow_id)
        .collect();
    let latest = emails.iter().max_by_key(|e| e.sent_at)?;
    let flow_name = latest.flow_name.clone();

    // message id → (position, latest send, latest name)
    let mut steps: HashMap<&str, (u32, NaiveDateTime, &str)> = HashMap::new();
    for email in &emails {
        let step = steps.entry(email.message_id.as_str()).or_insert((
            email.sequence_position,
            email.sent_at,
            email.message_name.as_str(),
        ));
        if email.sent_at >= step.1 {
            step.1 = email.sent_at;
            step.2 = email.message_name.as_str();
        }
    }

    let mut ordered: Vec<(u32, &str, &str)> = steps
        .into_iter()
        .map(|(message_id, (position, _, name))| (position, message_id, name))
        .collect();
    ordered.sort();

    let message_ids: Vec<String> = ordered.iter().map(|(_, id, _)| id.to_string()).collect();
    let email_names: Vec<String> = ordered.iter().map(|(_, _, n)| n.to_string()).collect();
    let distinct: HashSet<&String> = email_names.iter().collect();
    let has_duplicate_names = distinct.len() != email_names.len();

    Some(FlowSequenceInfo {
        flow_id: flow_id.to_string(),
        flow_name,
        sequence_length: message_ids.len(),
        message_ids,
        email_names,
        has_duplicate_names,
    })
}

/// Sorted, distinct names of live flows.
pub fn flow_names(flow_emails: &[ProcessedFlowEmail]) -> Vec<String> {
    flow_emails
        .iter()
        .filter(|e| e.is_live())
        .map(|e| e.flow_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pulse_core::models::{EmailRates, EmailVolumes};

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn obs<'a>(flow_id: &'a str, message_id: &'a str, day: u32) -> FlowMessageObservation<'a> {
        FlowMessageObservation {
            flow_id,
            message_id,
            sent_at: at(day),
        }
    }

    fn email(message_id: &str, name: &str, position: u32, day: u32, status: &str) -> ProcessedFlowEmail {
        ProcessedFlowEmail {
            flow_id: "F1".to_string(),
            flow_name: "Welcome".to_string(),
            message_id: message_id.to_string(),
            message_name: name.to_string(),
            sequence_position: position,
            sent_at: at(day),
            status: status.to_string(),
            volumes: EmailVolumes::default(),
            rates: EmailRates::default(),
        }
    }

    fn key(flow: &str, message: &str) -> (String, String) {
        (flow.to_string(), message.to_string())
    }

    #[test]
    fn test_resolve_sequence_orders_by_earliest_send() {
        let observations = vec![
            obs("F1", "M3", 5),
            obs("F1", "M1", 1),
            obs("F1", "M2", 3),
            obs("F1", "M1", 9),
            obs("F1", "M3", 2),
        ];
        let positions = resolve_sequence(&observations);
        // M3's earliest send (day 2) precedes M2's (day 3).
        assert_eq!(positions[&key("F1", "M1")], 1);
        assert_eq!(positions[&key("F1", "M3")], 2);
        assert_eq!(positions[&key("F1", "M2")], 3);
    }

    #[test]
    fn test_resolve_sequence_is_dense_per_flow() {
        let observations = vec![
            obs("F1", "A", 1),
            obs("F2", "B", 4),
            obs("F2", "C", 2),
            obs("F1", "D", 7),
        ];
        let positions = resolve_sequence(&observations);
        assert_eq!(positions.len(), 4);

        let mut f1: Vec<u32> = positions
            .iter()
            .filter(|((flow, _), _)| flow == "F1")
            .map(|(_, p)| *p)
            .collect();
        f1.sort();
        assert_eq!(f1, vec![1, 2]);
        assert_eq!(positions[&key("F2", "C")], 1);
        assert_eq!(positions[&key("F2", "B")], 2);
    }

    #[test]
    fn test_resolve_sequence_tie_breaks_on_message_id() {
        let observations = vec![obs("F1", "M9", 1), obs("F1", "M2", 1)];
        let positions = resolve_sequence(&observations);
        assert_eq!(positions[&key("F1", "M2")], 1);
        assert_eq!(positions[&key("F1", "M9")], 2);
    }

    #[test]
    fn test_resolve_sequence_empty() {
        assert!(resolve_sequence(&[]).is_empty());
    }

    #[test]
    fn test_flow_sequence_info_latest_name_wins() {
        let emails = vec![
            email("M1", "Welcome (old)", 1, 1, "live"),
            email("M2", "Discount", 2, 2, "live"),
            email("M1", "Welcome", 1, 8, "live"),
        ];
        let info = flow_sequence_info(&emails, "Welcome").unwrap();
        assert_eq!(info.flow_id, "F1");
        assert_eq!(info.message_ids, vec!["M1", "M2"]);
        assert_eq!(info.email_names, vec!["Welcome", "Discount"]);
        assert_eq!(info.sequence_length, 2);
        assert!(!info.has_duplicate_names);
    }

    #[test]
    fn test_flow_sequence_info_flags_duplicate_names() {
        let emails = vec![
            email("M1", "Reminder", 1, 1, "live"),
            email("M2", "Reminder", 2, 3, "live"),
        ];
        let info = flow_sequence_info(&emails, "Welcome").unwrap();
        assert!(info.has_duplicate_names);
    }

    #[test]
    fn test_flows_sharing_a_name_stay_apart() {
        let mut emails = vec![
            email("M1", "Old welcome", 1, 1, "live"),
            email("M2", "Old follow-up", 2, 2, "live"),
        ];
        let mut rebuilt = email("N1", "New welcome", 1, 5, "live");
        rebuilt.flow_id = "F2".to_string();
        emails.push(rebuilt);

        // By name: the flow with the latest send.
        let info = flow_sequence_info(&emails, "Welcome").unwrap();
        assert_eq!(info.flow_id, "F2");
        assert_eq!(info.message_ids, vec!["N1"]);

        // By id: only that flow's steps.
        let info = flow_sequence_info(&emails, "F1").unwrap();
        assert_eq!(info.message_ids, vec!["M1", "M2"]);
        assert_eq!(info.flow_name, "Welcome");
    }

    #[test]
    fn test_flow_name_is_latest_label() {
        let mut emails = vec![email("M1", "a", 1, 1, "live"), email("M1", "a", 1, 9, "live")];
        emails[1].flow_name = "Welcome Series".to_string();

        assert_eq!(resolve_flow_id(&emails, "Welcome"), Some("F1"));
        let info = flow_sequence_info(&emails, "F1").unwrap();
        assert_eq!(info.flow_name, "Welcome Series");
    }

    #[test]
    fn test_flow_sequence_info_unknown_flow() {
        assert!(flow_sequence_info(&[], "Nope").is_none());
    }

    #[test]
    fn test_flow_names_live_only_sorted() {
        let mut emails = vec![
            email("M1", "a", 1, 1, "live"),
            email("M2", "b", 1, 1, "manual"),
        ];
        emails[1].flow_name = "Abandoned Cart".to_string();
        let mut browse = email("M3", "c", 1, 1, "live");
        browse.flow_name = "Browse".to_string();
        emails.push(browse);

        assert_eq!(flow_names(&emails), vec!["Browse", "Welcome"]);
    }
}
