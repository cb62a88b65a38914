use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{
    EmailRates, EmailVolumes, MetricKey, ProcessedCampaign, ProcessedFlowEmail,
};

/// Interface for any dated record that carries email volume counts.
pub trait EmailMetrics {
    /// Wall-clock send time.
    fn sent_at(&self) -> NaiveDateTime;
    /// Raw volume counts.
    fn volumes(&self) -> &EmailVolumes;

    /// Calendar day of the send.
    fn sent_date(&self) -> NaiveDate {
        self.sent_at().date()
    }
}

impl EmailMetrics for ProcessedCampaign {
    fn sent_at(&self) -> NaiveDateTime {
        self.sent_at
    }

    fn volumes(&self) -> &EmailVolumes {
        &self.volumes
    }
}

impl EmailMetrics for ProcessedFlowEmail {
    fn sent_at(&self) -> NaiveDateTime {
        self.sent_at
    }

    fn volumes(&self) -> &EmailVolumes {
        &self.volumes
    }
}

/// `numerator / denominator`, or `0.0` when the result would not be finite.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// `numerator / denominator × 100`, `0.0` on a zero denominator.
pub fn safe_percent(numerator: f64, denominator: f64) -> f64 {
    safe_divide(numerator, denominator) * 100.0
}

// ── RateCalculator ────────────────────────────────────────────────────────────

/// Stateless rate derivation from volume counts.
pub struct RateCalculator;

impl RateCalculator {
    /// Recompute every rate field from `volumes`.
    pub fn derive_rates(volumes: &EmailVolumes) -> EmailRates {
        let sent = volumes.emails_sent as f64;
        let opens = volumes.unique_opens as f64;
        let clicks = volumes.unique_clicks as f64;
        let orders = volumes.total_orders as f64;

        EmailRates {
            open_rate: safe_percent(opens, sent),
            click_rate: safe_percent(clicks, sent),
            click_to_open_rate: safe_percent(clicks, opens),
            conversion_rate: safe_percent(orders, clicks),
            unsubscribe_rate: safe_percent(volumes.unsubscribes as f64, sent),
            spam_rate: safe_percent(volumes.spam_complaints as f64, sent),
            bounce_rate: safe_percent(volumes.bounces as f64, sent),
            revenue_per_email: safe_divide(volumes.revenue, sent),
            avg_order_value: safe_divide(volumes.revenue, orders),
        }
    }

    /// Rebuild a count from a volume and a rate fraction (`0.25` = 25 %).
    pub fn count_from_rate(volume: u64, rate_fraction: f64) -> u64 {
        let count = (volume as f64 * rate_fraction).round();
        if count.is_finite() && count > 0.0 {
            count as u64
        } else {
            0
        }
    }

    /// Percentage decline from `previous` to `current`.
    ///
    /// Returns `0.0` when `previous` is zero.
    pub fn drop_off_rate(previous: u64, current: u64) -> f64 {
        if previous == 0 {
            return 0.0;
        }
        safe_percent(previous as f64 - current as f64, previous as f64)
    }
}

// ── MetricTotals ──────────────────────────────────────────────────────────────

/// Volume sums accumulated across many records.
///
/// Ratio metrics are derived from the summed volumes, so every aggregate is
/// volume-weighted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTotals {
    #[serde(flatten)]
    pub volumes: EmailVolumes,
    pub record_count: u32,
}

impl MetricTotals {
    /// Sum the volumes of every record in `records`.
    pub fn from_records<'a, R, I>(records: I) -> Self
    where
        R: EmailMetrics + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut totals = Self::default();
        for record in records {
            totals.add(record.volumes());
        }
        totals
    }

    /// Add one record's counts to the running totals.
    pub fn add(&mut self, volumes: &EmailVolumes) {
        self.volumes.emails_sent += volumes.emails_sent;
        self.volumes.unique_opens += volumes.unique_opens;
        self.volumes.unique_clicks += volumes.unique_clicks;
        self.volumes.total_orders += volumes.total_orders;
        self.volumes.revenue += volumes.revenue;
        self.volumes.unsubscribes += volumes.unsubscribes;
        self.volumes.spam_complaints += volumes.spam_complaints;
        self.volumes.bounces += volumes.bounces;
        self.record_count += 1;
    }

    /// Derived rates over the summed volumes.
    pub fn rates(&self) -> EmailRates {
        RateCalculator::derive_rates(&self.volumes)
    }

    /// The value of `metric` over these totals.
    pub fn value(&self, metric: MetricKey) -> f64 {
        let v = &self.volumes;
        match metric {
            MetricKey::Revenue => v.revenue,
            MetricKey::EmailsSent => v.emails_sent as f64,
            MetricKey::UniqueOpens => v.unique_opens as f64,
            MetricKey::UniqueClicks => v.unique_clicks as f64,
            MetricKey::TotalOrders => v.total_orders as f64,
            MetricKey::Unsubscribes => v.unsubscribes as f64,
            MetricKey::SpamComplaints => v.spam_complaints as f64,
            MetricKey::Bounces => v.bounces as f64,
            MetricKey::AvgOrderValue => safe_divide(v.revenue, v.total_orders as f64),
            MetricKey::RevenuePerEmail => safe_divide(v.revenue, v.emails_sent as f64),
            MetricKey::OpenRate => safe_percent(v.unique_opens as f64, v.emails_sent as f64),
            MetricKey::ClickRate => safe_percent(v.unique_clicks as f64, v.emails_sent as f64),
            MetricKey::ClickToOpenRate => {
                safe_percent(v.unique_clicks as f64, v.unique_opens as f64)
            }
            MetricKey::ConversionRate => {
                safe_percent(v.total_orders as f64, v.unique_clicks as f64)
            }
            MetricKey::UnsubscribeRate => {
                safe_percent(v.unsubscribes as f64, v.emails_sent as f64)
            }
            MetricKey::SpamRate => safe_percent(v.spam_complaints as f64, v.emails_sent as f64),
            MetricKey::BounceRate => safe_percent(v.bounces as f64, v.emails_sent as f64),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
