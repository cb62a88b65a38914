//! Dataset construction.
//!
//! Turns the parsed export files of one load into the typed collections and
//! the date anchor every aggregation is measured against.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use pulse_core::models::{ProcessedCampaign, ProcessedFlowEmail, ProcessedSubscriber, RecordKind};
use pulse_core::periods::DateAnchor;
use pulse_core::time_utils::TimezoneHandler;
use serde::Serialize;
use tracing::{debug, info};

use crate::reader::{ParsedFile, RawRow};
use crate::transform::{CampaignTransformer, FlowTransformer, SubscriberTransformer};

// ── Public types ──────────────────────────────────────────────────────────────

/// The typed collections of one load.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub campaigns: Vec<ProcessedCampaign>,
    pub flow_emails: Vec<ProcessedFlowEmail>,
    pub subscribers: Vec<ProcessedSubscriber>,
    /// Span of campaign and flow send dates; `None` without any sends.
    pub anchor: Option<DateAnchor>,
    pub metadata: DatasetMetadata,
}

/// Counts describing how a [`Dataset`] was built.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    /// ISO-8601 timestamp when the dataset was built.
    pub generated_at: String,
    pub campaign_rows: usize,
    pub flow_rows: usize,
    pub subscriber_rows: usize,
    /// Rows dropped during parsing, across all files.
    pub rows_dropped: usize,
    /// Rows skipped for belonging to a non-email channel.
    pub rows_skipped_channel: usize,
    /// Date subscriber lifetimes are measured against.
    pub reference_date: Option<NaiveDateTime>,
}

impl Dataset {
    /// The most recent campaign or flow send date.
    pub fn last_email_date(&self) -> Option<NaiveDate> {
        self.anchor.map(|a| a.latest)
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty() && self.flow_emails.is_empty() && self.subscribers.is_empty()
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Build a [`Dataset`] from the parsed files of one load.
///
/// 1. Transform campaign and flow rows.
/// 2. Anchor the dataset on their send dates.
/// 3. Transform subscribers, measuring lifetimes against the last send
///    (or the current time when there are no sends).
pub fn build_dataset(files: &[ParsedFile], timezone: TimezoneHandler) -> Dataset {
    let rows_of = |kind: RecordKind| -> Vec<RawRow> {
        files
            .iter()
            .filter(|f| f.kind == kind)
            .flat_map(|f| f.rows.iter().cloned())
            .collect()
    };
    let campaign_rows = rows_of(RecordKind::Campaigns);
    let flow_rows = rows_of(RecordKind::Flows);
    let subscriber_rows = rows_of(RecordKind::Subscribers);

    // ── Step 1: Emails ────────────────────────────────────────────────────────
    let campaigns = CampaignTransformer::new(timezone).transform(&campaign_rows);
    let flow_emails = FlowTransformer::new(timezone).transform(&flow_rows);

    // ── Step 2: Anchor ────────────────────────────────────────────────────────
    let anchor = DateAnchor::from_dates(
        campaigns
            .iter()
            .map(|c| c.sent_at.date())
            .chain(flow_emails.iter().map(|e| e.sent_at.date())),
    );
    let last_send = campaigns
        .iter()
        .map(|c| c.sent_at)
        .chain(flow_emails.iter().map(|e| e.sent_at))
        .max();

    // ── Step 3: Subscribers ───────────────────────────────────────────────────
    let reference = last_send.unwrap_or_else(|| {
        debug!("No email sends loaded; measuring subscriber lifetimes from now");
        timezone.now_local()
    });
    let subscribers = SubscriberTransformer::new(timezone, reference).transform(&subscriber_rows);

    let metadata = DatasetMetadata {
        generated_at: Utc::now().to_rfc3339(),
        campaign_rows: campaign_rows.len(),
        flow_rows: flow_rows.len(),
        subscriber_rows: subscriber_rows.len(),
        rows_dropped: files.iter().map(|f| f.warnings.len()).sum(),
        rows_skipped_channel: files.iter().map(|f| f.skipped_channel).sum(),
        reference_date: (!subscribers.is_empty()).then_some(reference),
    };

    info!(
        "Dataset built: {} campaigns, {} flow emails, {} subscribers",
        campaigns.len(),
        flow_emails.len(),
        subscribers.len()
    );

    Dataset {
        campaigns,
        flow_emails,
        subscribers,
        anchor,
        metadata,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
