use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three export categories the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Campaigns,
    Flows,
    Subscribers,
}

impl RecordKind {
    /// Human-readable label used as the prefix of file-level error messages.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Campaigns => "Campaigns file",
            RecordKind::Flows => "Flows file",
            RecordKind::Subscribers => "Subscribers file",
        }
    }

    /// All kinds, in load order.
    pub fn all() -> [RecordKind; 3] {
        [
            RecordKind::Campaigns,
            RecordKind::Flows,
            RecordKind::Subscribers,
        ]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Campaigns => "campaigns",
            RecordKind::Flows => "flows",
            RecordKind::Subscribers => "subscribers",
        };
        f.write_str(name)
    }
}

/// Raw volume counts shared by campaigns and flow emails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVolumes {
    /// Recipients (campaigns) or deliveries (flows).
    pub emails_sent: u64,
    pub unique_opens: u64,
    pub unique_clicks: u64,
    pub total_orders: u64,
    /// Attributed revenue in the account currency.
    pub revenue: f64,
    pub unsubscribes: u64,
    pub spam_complaints: u64,
    pub bounces: u64,
}

/// Rates derived from [`EmailVolumes`]. Never read from the source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRates {
    pub open_rate: f64,
    pub click_rate: f64,
    pub click_to_open_rate: f64,
    pub conversion_rate: f64,
    pub unsubscribe_rate: f64,
    pub spam_rate: f64,
    pub bounce_rate: f64,
    pub revenue_per_email: f64,
    pub avg_order_value: f64,
}

/// One sent broadcast campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedCampaign {
    pub id: String,
    pub name: String,
    pub subject: String,
    /// Wall-clock send time in the account timezone.
    pub sent_at: NaiveDateTime,
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    /// 0–23, local to the account timezone.
    pub hour_of_day: u8,
    #[serde(flatten)]
    pub volumes: EmailVolumes,
    #[serde(flatten)]
    pub rates: EmailRates,
}

/// One (flow, message, send-day) snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFlowEmail {
    pub flow_id: String,
    pub flow_name: String,
    pub message_id: String,
    pub message_name: String,
    /// 1-based step number, pinned to the message's earliest send date.
    pub sequence_position: u32,
    pub sent_at: NaiveDateTime,
    /// Lowercased flow status (`live`, `manual`, `draft`, …).
    pub status: String,
    #[serde(flatten)]
    pub volumes: EmailVolumes,
    #[serde(flatten)]
    pub rates: EmailRates,
}

impl ProcessedFlowEmail {
    /// Only live flows carry analytically meaningful numbers.
    pub fn is_live(&self) -> bool {
        self.status == "live"
    }
}

/// One contact from the subscriber export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSubscriber {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_created: NaiveDateTime,
    pub first_active: Option<NaiveDateTime>,
    pub last_active: Option<NaiveDateTime>,
    pub last_open: Option<NaiveDateTime>,
    pub last_click: Option<NaiveDateTime>,
    pub total_clv: f64,
    pub predicted_clv: f64,
    pub historic_orders: u64,
    pub avg_order_value: f64,
    pub is_buyer: bool,
    pub lifetime_in_days: i64,
    pub email_consent: bool,
    /// When consent was granted, if the export carried a timestamp.
    pub email_consent_timestamp: Option<DateTime<Utc>>,
    /// Uppercased suppression reasons.
    pub email_suppressions: Vec<String>,
    pub can_receive_email: bool,
}

/// Display-oriented view of one flow's step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSequenceInfo {
    pub flow_id: String,
    pub flow_name: String,
    /// Message ids ordered by sequence position.
    pub message_ids: Vec<String>,
    /// Display names, parallel to `message_ids`; latest observed name wins.
    pub email_names: Vec<String>,
    pub sequence_length: usize,
    /// Two or more steps share a display name (A/B pairs, copy-paste steps).
    pub has_duplicate_names: bool,
}

// ── MetricKey ─────────────────────────────────────────────────────────────────

/// Every metric the aggregation layer can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    Revenue,
    AvgOrderValue,
    RevenuePerEmail,
    OpenRate,
    ClickRate,
    ClickToOpenRate,
    ConversionRate,
    UnsubscribeRate,
    SpamRate,
    BounceRate,
    EmailsSent,
    UniqueOpens,
    UniqueClicks,
    TotalOrders,
    Unsubscribes,
    SpamComplaints,
    Bounces,
}

impl MetricKey {
    /// `true` for metrics aggregated as Σnumerator / Σdenominator.
    pub fn is_ratio(&self) -> bool {
        matches!(
            self,
            MetricKey::AvgOrderValue
                | MetricKey::RevenuePerEmail
                | MetricKey::OpenRate
                | MetricKey::ClickRate
                | MetricKey::ClickToOpenRate
                | MetricKey::ConversionRate
                | MetricKey::UnsubscribeRate
                | MetricKey::SpamRate
                | MetricKey::BounceRate
        )
    }

    /// `true` when a decrease is the good direction.
    pub fn is_negative_framed(&self) -> bool {
        matches!(
            self,
            MetricKey::UnsubscribeRate | MetricKey::SpamRate | MetricKey::BounceRate
        )
    }

    /// `true` for metrics expressed in currency units.
    pub fn is_currency(&self) -> bool {
        matches!(
            self,
            MetricKey::Revenue | MetricKey::AvgOrderValue | MetricKey::RevenuePerEmail
        )
    }

    /// `true` for metrics expressed as a percentage.
    pub fn is_percentage(&self) -> bool {
        self.is_ratio() && !self.is_currency()
    }

    /// Short display label.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::Revenue => "Revenue",
            MetricKey::AvgOrderValue => "Avg Order Value",
            MetricKey::RevenuePerEmail => "Revenue per Email",
            MetricKey::OpenRate => "Open Rate",
            MetricKey::ClickRate => "Click Rate",
            MetricKey::ClickToOpenRate => "Click-to-Open Rate",
            MetricKey::ConversionRate => "Conversion Rate",
            MetricKey::UnsubscribeRate => "Unsubscribe Rate",
            MetricKey::SpamRate => "Spam Rate",
            MetricKey::BounceRate => "Bounce Rate",
            MetricKey::EmailsSent => "Emails Sent",
            MetricKey::UniqueOpens => "Unique Opens",
            MetricKey::UniqueClicks => "Unique Clicks",
            MetricKey::TotalOrders => "Total Orders",
            MetricKey::Unsubscribes => "Unsubscribes",
            MetricKey::SpamComplaints => "Spam Complaints",
            MetricKey::Bounces => "Bounces",
        }
    }

    /// Metrics shown on the overview cards, in display order.
    pub fn overview() -> &'static [MetricKey] {
        &[
            MetricKey::Revenue,
            MetricKey::AvgOrderValue,
            MetricKey::RevenuePerEmail,
            MetricKey::OpenRate,
            MetricKey::ClickRate,
            MetricKey::ClickToOpenRate,
            MetricKey::ConversionRate,
            MetricKey::UnsubscribeRate,
            MetricKey::SpamRate,
            MetricKey::BounceRate,
            MetricKey::EmailsSent,
            MetricKey::TotalOrders,
        ]
    }
}

impl FromStr for MetricKey {
    type Err = String;

    /// Accepts kebab-case, snake_case or camelCase spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        let metric = match key.as_str() {
            "revenue" => MetricKey::Revenue,
            "avgordervalue" | "aov" => MetricKey::AvgOrderValue,
            "revenueperemail" => MetricKey::RevenuePerEmail,
            "openrate" => MetricKey::OpenRate,
            "clickrate" => MetricKey::ClickRate,
            "clicktoopenrate" | "ctor" => MetricKey::ClickToOpenRate,
            "conversionrate" => MetricKey::ConversionRate,
            "unsubscriberate" => MetricKey::UnsubscribeRate,
            "spamrate" => MetricKey::SpamRate,
            "bouncerate" => MetricKey::BounceRate,
            "emailssent" => MetricKey::EmailsSent,
            "uniqueopens" => MetricKey::UniqueOpens,
            "uniqueclicks" => MetricKey::UniqueClicks,
            "totalorders" => MetricKey::TotalOrders,
            "unsubscribes" => MetricKey::Unsubscribes,
            "spamcomplaints" => MetricKey::SpamComplaints,
            "bounces" => MetricKey::Bounces,
            _ => return Err(format!("unknown metric: {}", s)),
        };
        Ok(metric)
    }
}

/// Which record collection an aggregate reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Campaigns,
    Flows,
    All,
}

impl FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "campaigns" => Ok(Segment::Campaigns),
            "flows" => Ok(Segment::Flows),
            "all" => Ok(Segment::All),
            other => Err(format!("unknown segment: {}", other)),
        }
    }
}

/// A single point of a bucketed time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// First calendar day of the bucket.
    pub date: NaiveDate,
    pub value: f64,
}
