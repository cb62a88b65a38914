//! Subscriber list summaries.

use pulse_core::calculations::{safe_divide, safe_percent};
use pulse_core::models::ProcessedSubscriber;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceOverview {
    pub total_subscribers: usize,
    pub buyer_count: usize,
    pub buyer_percent: f64,
    pub consented_count: usize,
    pub consented_percent: f64,
    pub can_receive_count: usize,
    pub can_receive_percent: f64,
    /// Mean total CLV across all subscribers.
    pub avg_clv: f64,
    /// Mean total CLV across buyers only.
    pub avg_buyer_clv: f64,
    pub avg_lifetime_days: f64,
}

/// Headline counts and averages of the subscriber list.
pub fn audience_overview(subscribers: &[ProcessedSubscriber]) -> AudienceOverview {
    let total = subscribers.len();
    let mut buyers = 0usize;
    let mut consented = 0usize;
    let mut can_receive = 0usize;
    let mut clv_sum = 0.0;
    let mut buyer_clv_sum = 0.0;
    let mut lifetime_sum = 0i64;

    for sub in subscribers {
        if sub.is_buyer {
            buyers += 1;
            buyer_clv_sum += sub.total_clv;
        }
        if sub.email_consent {
            consented += 1;
        }
        if sub.can_receive_email {
            can_receive += 1;
        }
        clv_sum += sub.total_clv;
        lifetime_sum += sub.lifetime_in_days;
    }

    let n = total as f64;
    AudienceOverview {
        total_subscribers: total,
        buyer_count: buyers,
        buyer_percent: safe_percent(buyers as f64, n),
        consented_count: consented,
        consented_percent: safe_percent(consented as f64, n),
        can_receive_count: can_receive,
        can_receive_percent: safe_percent(can_receive as f64, n),
        avg_clv: safe_divide(clv_sum, n),
        avg_buyer_clv: safe_divide(buyer_clv_sum, buyers as f64),
        avg_lifetime_days: safe_divide(lifetime_sum as f64, n),
    }
}

// ── Lifetime distribution ─────────────────────────────────────────────────────

/// `(label, upper bound in days, exclusive)`; the last bucket is open.
const LIFETIME_BUCKETS: &[(&str, Option<i64>)] = &[
    ("0-3 months", Some(90)),
    ("3-6 months", Some(180)),
    ("6-12 months", Some(365)),
    ("1-2 years", Some(730)),
    ("2+ years", None),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeBucket {
    pub label: String,
    pub min_days: i64,
    pub max_days: Option<i64>,
    pub count: usize,
    pub percent: f64,
}

/// Subscribers grouped by profile age; always five buckets.
pub fn lifetime_distribution(subscribers: &[ProcessedSubscriber]) -> Vec<LifetimeBucket> {
    let mut counts = [0usize; 5];
    for sub in subscribers {
        let index = LIFETIME_BUCKETS
            .iter()
            .position(|(_, max)| max.map_or(true, |max| sub.lifetime_in_days < max))
            .unwrap_or(LIFETIME_BUCKETS.len() - 1);
        counts[index] += 1;
    }

    let total = subscribers.len() as f64;
    let mut min_days = 0;
    LIFETIME_BUCKETS
        .iter()
        .zip(counts)
        .map(|(&(label, max_days), count)| {
            let bucket = LifetimeBucket {
                label: label.to_string(),
                min_days,
                max_days,
                count,
                percent: safe_percent(count as f64, total),
            };
            min_days = max_days.unwrap_or(min_days);
            bucket
        })
        .collect()
}
