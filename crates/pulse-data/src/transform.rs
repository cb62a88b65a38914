//! Typed conversion of validated export rows.
//!
//! Transformers never fail: cells that cannot be read become zero, and the
//! handling of unreadable dates is decided per record type below.

use chrono::{NaiveDateTime, Timelike};
use pulse_core::calculations::RateCalculator;
use pulse_core::data_processors::{ConsentParser, NumberParser, RateParser, SuppressionParser};
use pulse_core::models::{EmailVolumes, ProcessedCampaign, ProcessedFlowEmail, ProcessedSubscriber};
use pulse_core::time_utils::{day_of_week_index, TimezoneHandler};
use tracing::{debug, warn};

use crate::columns::{campaign, flow, subscriber};
use crate::reader::RawRow;
use crate::sequence::{resolve_sequence, FlowMessageObservation};

/// Count from its own column, else `round(volume × rate)`, else 0.
///
/// `rate` turns a rate cell into a fraction.
fn count_or_derived(
    row: &RawRow,
    count_columns: &[&str],
    rate_columns: &[&str],
    rate: fn(&str) -> Option<f64>,
    volume: u64,
) -> u64 {
    if let Some(count) = row.get_any(count_columns).and_then(NumberParser::parse_count_opt) {
        return count;
    }
    row.get_any(rate_columns)
        .and_then(rate)
        .map(|rate| RateCalculator::count_from_rate(volume, rate))
        .unwrap_or(0)
}

fn text(row: &RawRow, columns: &[&str]) -> String {
    row.get_any(columns).unwrap_or_default().to_string()
}

// ── CampaignTransformer ───────────────────────────────────────────────────────

/// Builds [`ProcessedCampaign`]s from campaign export rows.
pub struct CampaignTransformer {
    timezone: TimezoneHandler,
}

impl CampaignTransformer {
    pub fn new(timezone: TimezoneHandler) -> Self {
        Self { timezone }
    }

    /// Convert rows, sorted by send time. Rows whose send time cannot be
    /// read are skipped.
    pub fn transform(&self, rows: &[RawRow]) -> Vec<ProcessedCampaign> {
        let mut campaigns: Vec<ProcessedCampaign> =
            rows.iter().filter_map(|row| self.transform_row(row)).collect();
        campaigns.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
        campaigns
    }

    fn transform_row(&self, row: &RawRow) -> Option<ProcessedCampaign> {
        let raw_time = row.get(campaign::SEND_TIME).unwrap_or_default();
        let sent_at = match self.timezone.parse_local(raw_time) {
            Ok(ts) => ts,
            Err(e) => {
                warn!("Campaigns file: skipping line {}: {}", row.line(), e);
                return None;
            }
        };

        let sent = row
            .get(campaign::RECIPIENTS)
            .map(NumberParser::parse_count)
            .unwrap_or(0);
        // Campaign exports write rates in percent, with or without the sign.
        let pct = RateParser::parse_percent;
        let volumes = EmailVolumes {
            emails_sent: sent,
            unique_opens: count_or_derived(row, &[campaign::UNIQUE_OPENS], campaign::OPEN_RATE, pct, sent),
            unique_clicks: count_or_derived(row, &[campaign::UNIQUE_CLICKS], campaign::CLICK_RATE, pct, sent),
            total_orders: count_or_derived(row, campaign::ORDERS, campaign::ORDER_RATE, pct, sent),
            revenue: row.get(campaign::REVENUE).map(NumberParser::parse).unwrap_or(0.0),
            unsubscribes: count_or_derived(row, campaign::UNSUBSCRIBES, campaign::UNSUBSCRIBE_RATE, pct, sent),
            spam_complaints: count_or_derived(row, campaign::SPAM_COMPLAINTS, campaign::SPAM_RATE, pct, sent),
            bounces: count_or_derived(row, campaign::BOUNCES, campaign::BOUNCE_RATE, pct, sent),
        };

        let name = text(row, campaign::NAME);
        let subject = row
            .get_any(campaign::SUBJECT)
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        let id = row
            .get_any(campaign::ID)
            .map(str::to_string)
            .unwrap_or_else(|| format!("campaign-{}", row.line()));

        Some(ProcessedCampaign {
            id,
            name,
            subject,
            sent_at,
            day_of_week: day_of_week_index(sent_at.date()),
            hour_of_day: sent_at.hour() as u8,
            rates: RateCalculator::derive_rates(&volumes),
            volumes,
        })
    }
}

// ── FlowTransformer ───────────────────────────────────────────────────────────

/// Builds [`ProcessedFlowEmail`]s from flow export rows.
pub struct FlowTransformer {
    timezone: TimezoneHandler,
}

impl FlowTransformer {
    pub fn new(timezone: TimezoneHandler) -> Self {
        Self { timezone }
    }

    /// Convert rows and assign each message its step position.
    ///
    /// Output is sorted by send time, then flow id, then position.
    pub fn transform(&self, rows: &[RawRow]) -> Vec<ProcessedFlowEmail> {
        let mut emails: Vec<ProcessedFlowEmail> =
            rows.iter().filter_map(|row| self.transform_row(row)).collect();

        let observations: Vec<FlowMessageObservation<'_>> = emails
            .iter()
            .map(|e| FlowMessageObservation {
                flow_id: &e.flow_id,
                message_id: &e.message_id,
                sent_at: e.sent_at,
            })
            .collect();
        let positions = resolve_sequence(&observations);

        for email in &mut emails {
            email.sequence_position = positions
                .get(&(email.flow_id.clone(), email.message_id.clone()))
                .copied()
                .unwrap_or(1);
        }

        emails.sort_by(|a, b| {
            a.sent_at
                .cmp(&b.sent_at)
                .then_with(|| a.flow_id.cmp(&b.flow_id))
                .then_with(|| a.sequence_position.cmp(&b.sequence_position))
        });
        emails
    }

    fn transform_row(&self, row: &RawRow) -> Option<ProcessedFlowEmail> {
        let raw_day = row.get(flow::DAY).unwrap_or_default();
        let sent_at = match self.timezone.parse_local(raw_day) {
            Ok(ts) => ts,
            Err(e) => {
                warn!("Flows file: skipping line {}: {}", row.line(), e);
                return None;
            }
        };

        let delivered = row.get(flow::DELIVERED).map(NumberParser::parse_count).unwrap_or(0);
        let volumes = EmailVolumes {
            emails_sent: delivered,
            unique_opens: count_or_derived(row, flow::UNIQUE_OPENS, flow::OPEN_RATE, RateParser::parse_fraction, delivered),
            unique_clicks: count_or_derived(row, flow::UNIQUE_CLICKS, flow::CLICK_RATE, RateParser::parse_fraction, delivered),
            total_orders: count_or_derived(row, flow::ORDERS, flow::ORDER_RATE, RateParser::parse_fraction, delivered),
            revenue: row.get_any(flow::REVENUE).map(NumberParser::parse).unwrap_or(0.0),
            unsubscribes: count_or_derived(row, flow::UNSUBSCRIBES, flow::UNSUBSCRIBE_RATE, RateParser::parse_fraction, delivered),
            spam_complaints: count_or_derived(row, flow::SPAM_COMPLAINTS, flow::SPAM_RATE, RateParser::parse_fraction, delivered),
            bounces: count_or_derived(row, flow::BOUNCES, flow::BOUNCE_RATE, RateParser::parse_fraction, delivered),
        };

        let flow_id = row.get(flow::FLOW_ID).unwrap_or_default().to_string();
        let flow_name = row
            .get_any(flow::FLOW_NAME)
            .map(str::to_string)
            .unwrap_or_else(|| flow_id.clone());

        Some(ProcessedFlowEmail {
            flow_id,
            flow_name,
            message_id: row.get(flow::MESSAGE_ID).unwrap_or_default().to_string(),
            message_name: row.get(flow::MESSAGE_NAME).unwrap_or_default().to_string(),
            sequence_position: 0,
            sent_at,
            status: row.get(flow::STATUS).unwrap_or_default().to_lowercase(),
            rates: RateCalculator::derive_rates(&volumes),
            volumes,
        })
    }
}

// ── SubscriberTransformer ─────────────────────────────────────────────────────

/// Builds [`ProcessedSubscriber`]s from subscriber export rows.
pub struct SubscriberTransformer {
    timezone: TimezoneHandler,
    reference: NaiveDateTime,
}

impl SubscriberTransformer {
    /// `reference` is the date lifetimes are measured against.
    pub fn new(timezone: TimezoneHandler, reference: NaiveDateTime) -> Self {
        Self {
            timezone,
            reference,
        }
    }

    pub fn transform(&self, rows: &[RawRow]) -> Vec<ProcessedSubscriber> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    fn optional_date(&self, row: &RawRow, columns: &[&str]) -> Option<NaiveDateTime> {
        let raw = row.get_any(columns)?;
        match self.timezone.parse_local(raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                debug!("Subscribers file: line {}: ignoring {}", row.line(), e);
                None
            }
        }
    }

    fn transform_row(&self, row: &RawRow) -> ProcessedSubscriber {
        // A profile without a readable creation date gets a zero lifetime.
        let raw_created = row.get_any(subscriber::PROFILE_CREATED).unwrap_or_default();
        let profile_created = match self.timezone.parse_local(raw_created) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(
                    "Subscribers file: line {}: {}; using reference date {}",
                    row.line(),
                    e,
                    self.reference
                );
                self.reference
            }
        };

        let total_clv = row.get_any(subscriber::TOTAL_CLV).map(NumberParser::parse).unwrap_or(0.0);
        let historic_orders = row
            .get_any(subscriber::HISTORIC_ORDERS)
            .map(NumberParser::parse_count)
            .unwrap_or(0);
        let consent = ConsentParser::parse(
            row.get(subscriber::CONSENT).unwrap_or_default(),
            &self.timezone,
        );
        let suppressions =
            SuppressionParser::parse(row.get_any(subscriber::SUPPRESSIONS).unwrap_or_default());

        ProcessedSubscriber {
            id: text(row, subscriber::ID),
            email: row.get(subscriber::EMAIL).unwrap_or_default().to_string(),
            first_name: text(row, subscriber::FIRST_NAME),
            last_name: text(row, subscriber::LAST_NAME),
            profile_created,
            first_active: self.optional_date(row, subscriber::FIRST_ACTIVE),
            last_active: self.optional_date(row, subscriber::LAST_ACTIVE),
            last_open: self.optional_date(row, subscriber::LAST_OPEN),
            last_click: self.optional_date(row, subscriber::LAST_CLICK),
            total_clv,
            predicted_clv: row
                .get_any(subscriber::PREDICTED_CLV)
                .map(NumberParser::parse)
                .unwrap_or(0.0),
            historic_orders,
            avg_order_value: row
                .get_any(subscriber::AVG_ORDER_VALUE)
                .map(NumberParser::parse)
                .unwrap_or(0.0),
            is_buyer: historic_orders > 0 || total_clv > 0.0,
            lifetime_in_days: (self.reference.date() - profile_created.date())
                .num_days()
                .max(0),
            email_consent: consent.granted,
            email_consent_timestamp: consent.granted_at,
            email_suppressions: suppressions.tokens,
            can_receive_email: suppressions.can_receive_email,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn campaign_row(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(2, pairs)
    }

    // ── CampaignTransformer ───────────────────────────────────────────────────

    #[test]
    fn test_campaign_reference_row_rates() {
        let row = campaign_row(&[
            ("Campaign ID", "C1"),
            ("Campaign Name", "Spring Sale"),
            ("Subject", "20% off"),
            ("Send Time", "2024-03-05 14:30:00"),
            ("Total Recipients", "10,000"),
            ("Unique Opens", "2,500"),
            ("Unique Clicks", "400"),
            ("Unique Placed Order", "50"),
            ("Revenue", "$5,000.00"),
            ("Unsubscribes", "10"),
            ("Spam Complaints", "2"),
            ("Bounces", "100"),
            // Stale source rate; the derived value must win.
            ("Open Rate", "99%"),
        ]);
        let campaigns = CampaignTransformer::new(TimezoneHandler::default()).transform(&[row]);
        assert_eq!(campaigns.len(), 1);
        let c = &campaigns[0];

        assert_eq!(c.id, "C1");
        assert_eq!(c.subject, "20% off");
        assert_eq!(c.day_of_week, 2); // Tuesday
        assert_eq!(c.hour_of_day, 14);
        assert_eq!(c.volumes.emails_sent, 10_000);
        assert!((c.rates.open_rate - 25.0).abs() < 1e-9);
        assert!((c.rates.click_rate - 4.0).abs() < 1e-9);
        assert!((c.rates.click_to_open_rate - 16.0).abs() < 1e-9);
        assert!((c.rates.conversion_rate - 12.5).abs() < 1e-9);
        assert!((c.rates.revenue_per_email - 0.5).abs() < 1e-9);
        assert!((c.rates.unsubscribe_rate - 0.1).abs() < 1e-9);
        assert!((c.rates.spam_rate - 0.02).abs() < 1e-9);
        assert!((c.rates.bounce_rate - 1.0).abs() < 1e-9);
        assert!((c.rates.avg_order_value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_campaign_counts_derived_from_rates() {
        let row = campaign_row(&[
            ("Send Time", "2024-03-05 09:00:00"),
            ("Total Recipients", "1000"),
            ("Unique Opens", "300"),
            ("Unique Clicks", "20"),
            ("Revenue", "0"),
            ("Unsubscribe Rate", "0.50%"),
            // Campaign rates are percentages, with or without the sign.
            ("Bounce Rate", "1.2"),
        ]);
        let c = &CampaignTransformer::new(TimezoneHandler::default()).transform(&[row])[0];
        assert_eq!(c.volumes.unsubscribes, 5);
        assert_eq!(c.volumes.bounces, 12);
        assert_eq!(c.volumes.spam_complaints, 0);
        assert_eq!(c.id, "campaign-2");
    }

    #[test]
    fn test_campaign_zero_recipients_has_finite_rates() {
        let row = campaign_row(&[
            ("Send Time", "2024-03-05 09:00:00"),
            ("Total Recipients", "0"),
            ("Unique Opens", "0"),
            ("Unique Clicks", "0"),
            ("Revenue", "0"),
        ]);
        let c = &CampaignTransformer::new(TimezoneHandler::default()).transform(&[row])[0];
        assert_eq!(c.rates.open_rate, 0.0);
        assert_eq!(c.rates.avg_order_value, 0.0);
    }

    #[test]
    fn test_campaign_unreadable_send_time_skipped() {
        let good = campaign_row(&[("Send Time", "2024-03-05 09:00:00"), ("Total Recipients", "1")]);
        let bad = campaign_row(&[("Send Time", "someday"), ("Total Recipients", "1")]);
        let campaigns = CampaignTransformer::new(TimezoneHandler::default()).transform(&[bad, good]);
        assert_eq!(campaigns.len(), 1);
    }

    #[test]
    fn test_campaign_offset_converted_to_account_timezone() {
        let row = campaign_row(&[
            ("Send Time", "2024-03-05T23:30:00Z"),
            ("Total Recipients", "1"),
        ]);
        let tz = TimezoneHandler::new("Asia/Tokyo");
        let c = &CampaignTransformer::new(tz).transform(&[row])[0];
        assert_eq!(c.sent_at, at(2024, 3, 6, 8) + chrono::Duration::minutes(30));
        assert_eq!(c.hour_of_day, 8);
        assert_eq!(c.day_of_week, 3); // Wednesday
    }

    #[test]
    fn test_campaigns_sorted_by_send_time() {
        let late = campaign_row(&[("Campaign ID", "B"), ("Send Time", "2024-03-09 09:00:00")]);
        let early = campaign_row(&[("Campaign ID", "A"), ("Send Time", "2024-03-01 09:00:00")]);
        let campaigns = CampaignTransformer::new(TimezoneHandler::default()).transform(&[late, early]);
        assert_eq!(campaigns[0].id, "A");
        assert_eq!(campaigns[1].id, "B");
    }

    // ── FlowTransformer ───────────────────────────────────────────────────────

    fn flow_row(day: &str, message_id: &str, delivered: &str, open_rate: &str) -> RawRow {
        RawRow::from_pairs(
            5,
            &[
                ("Day", day),
                ("Flow ID", "F1"),
                ("Flow Name", "Welcome"),
                ("Flow Message ID", message_id),
                ("Flow Message Name", "Step"),
                ("Status", "Live"),
                ("Delivered", delivered),
                ("Open Rate", open_rate),
                ("Click Rate", "0.0712"),
                ("Placed Order", "3"),
                ("Revenue", "120.50"),
            ],
        )
    }

    #[test]
    fn test_flow_counts_from_percent_and_decimal_rates() {
        let rows = vec![flow_row("2024-03-01", "M1", "1000", "27.5%")];
        let emails = FlowTransformer::new(TimezoneHandler::default()).transform(&rows);
        let e = &emails[0];

        assert_eq!(e.status, "live");
        assert!(e.is_live());
        assert_eq!(e.volumes.emails_sent, 1000);
        assert_eq!(e.volumes.unique_opens, 275);
        assert_eq!(e.volumes.unique_clicks, 71);
        assert_eq!(e.volumes.total_orders, 3);
        assert!((e.volumes.revenue - 120.5).abs() < 1e-9);
        assert!((e.rates.open_rate - 27.5).abs() < 1e-9);
        assert_eq!(e.sequence_position, 1);
    }

    #[test]
    fn test_flow_positions_stable_across_days() {
        let rows = vec![
            flow_row("2024-03-02", "M2", "80", "10%"),
            flow_row("2024-03-01", "M1", "100", "10%"),
            flow_row("2024-03-05", "M1", "90", "10%"),
            flow_row("2024-03-06", "M2", "70", "10%"),
        ];
        let emails = FlowTransformer::new(TimezoneHandler::default()).transform(&rows);
        for email in &emails {
            let expected = if email.message_id == "M1" { 1 } else { 2 };
            assert_eq!(email.sequence_position, expected);
        }
        assert_eq!(emails[0].sent_at, at(2024, 3, 1, 0));
    }

    #[test]
    fn test_flow_unreadable_day_skipped() {
        let rows = vec![
            flow_row("not a day", "M1", "100", "10%"),
            flow_row("2024-03-01", "M2", "100", "10%"),
        ];
        let emails = FlowTransformer::new(TimezoneHandler::default()).transform(&rows);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].message_id, "M2");
        assert_eq!(emails[0].sequence_position, 1);
    }

    // ── SubscriberTransformer ─────────────────────────────────────────────────

    fn subscriber_row(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(3, pairs)
    }

    #[test]
    fn test_subscriber_fields() {
        let row = subscriber_row(&[
            ("Email", "ada@example.com"),
            ("Klaviyo ID", "K1"),
            ("First Name", "Ada"),
            ("Email Marketing Consent", "2023-01-10 08:00:00"),
            ("Email Suppressions", "[]"),
            ("Profile Created On", "2023-01-01 00:00:00"),
            ("Last Open", "2024-02-01 10:00:00"),
            ("Last Click", "garbage"),
            ("Total Customer Lifetime Value", "$250.00"),
            ("Historic Number Of Orders", "0"),
        ]);
        let reference = at(2024, 1, 1, 12);
        let subs = SubscriberTransformer::new(TimezoneHandler::default(), reference).transform(&[row]);
        let s = &subs[0];

        assert_eq!(s.id, "K1");
        assert_eq!(s.first_name, "Ada");
        assert!(s.email_consent);
        assert!(s.email_consent_timestamp.is_some());
        assert!(s.can_receive_email);
        assert!(s.is_buyer);
        assert_eq!(s.lifetime_in_days, 365);
        assert!(s.last_open.is_some());
        assert!(s.last_click.is_none());
        assert!(s.first_active.is_none());
    }

    #[test]
    fn test_subscriber_suppressed_and_not_buyer() {
        let row = subscriber_row(&[
            ("Email", "bob@example.com"),
            ("Profile ID", "P9"),
            ("Email Marketing Consent", "NEVER_SUBSCRIBED"),
            ("Email Suppressions", r#"["UNSUBSCRIBE"]"#),
            ("Profile Created On", "2024-06-01"),
        ]);
        let reference = at(2024, 1, 1, 0);
        let s = &SubscriberTransformer::new(TimezoneHandler::default(), reference).transform(&[row])[0];

        assert_eq!(s.id, "P9");
        assert!(!s.email_consent);
        assert!(!s.can_receive_email);
        assert_eq!(s.email_suppressions, vec!["UNSUBSCRIBE"]);
        assert!(!s.is_buyer);
        // Created after the reference date: floored at zero.
        assert_eq!(s.lifetime_in_days, 0);
    }

    #[test]
    fn test_subscriber_unreadable_created_uses_reference() {
        let row = subscriber_row(&[
            ("Email", "cy@example.com"),
            ("Klaviyo ID", "K3"),
            ("Email Marketing Consent", "TRUE"),
        ]);
        let reference = at(2024, 5, 5, 0);
        let s = &SubscriberTransformer::new(TimezoneHandler::default(), reference).transform(&[row])[0];
        assert_eq!(s.profile_created, reference);
        assert_eq!(s.lifetime_in_days, 0);
        assert!(!s.can_receive_email);
    }
}
