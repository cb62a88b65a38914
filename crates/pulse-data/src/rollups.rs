//! Send-time rollups and per-step flow metrics.

use std::cmp::Ordering;

use pulse_core::calculations::{safe_percent, MetricTotals, RateCalculator};
use pulse_core::models::{
    EmailRates, EmailVolumes, MetricKey, ProcessedCampaign, ProcessedFlowEmail, SeriesPoint,
};
use pulse_core::periods::{DateWindow, Granularity};
use pulse_core::time_utils::{day_name, hour_label};
use serde::Serialize;

use crate::aggregator::time_series_from;
use crate::sequence::{flow_sequence_info, resolve_flow_id};

// ── Day of week ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOfWeekPerformance {
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    pub day_name: String,
    pub value: f64,
    pub campaign_count: u32,
}

/// `metric` per weekday over campaigns sent in `window`; always seven rows.
pub fn performance_by_day_of_week(
    campaigns: &[ProcessedCampaign],
    metric: MetricKey,
    window: Option<&DateWindow>,
) -> Vec<DayOfWeekPerformance> {
    let mut buckets: [MetricTotals; 7] = Default::default();
    for campaign in in_window(campaigns, window) {
        buckets[usize::from(campaign.day_of_week % 7)].add(&campaign.volumes);
    }

    buckets
        .iter()
        .enumerate()
        .map(|(index, totals)| DayOfWeekPerformance {
            day_of_week: index as u8,
            day_name: day_name(index as u8).to_string(),
            value: totals.value(metric),
            campaign_count: totals.record_count,
        })
        .collect()
}

// ── Hour of day ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourOfDayPerformance {
    pub hour: u8,
    pub hour_label: String,
    pub value: f64,
    pub campaign_count: u32,
    /// Share of the window's campaigns sent in this hour.
    pub percentage_of_campaigns: f64,
}

/// `metric` per send hour, for hours with at least one campaign.
///
/// Sorted by value descending, then hour ascending.
pub fn performance_by_hour_of_day(
    campaigns: &[ProcessedCampaign],
    metric: MetricKey,
    window: Option<&DateWindow>,
) -> Vec<HourOfDayPerformance> {
    let mut buckets: [MetricTotals; 24] = Default::default();
    let mut total_campaigns = 0u32;
    for campaign in in_window(campaigns, window) {
        buckets[usize::from(campaign.hour_of_day % 24)].add(&campaign.volumes);
        total_campaigns += 1;
    }

    let mut rows: Vec<HourOfDayPerformance> = buckets
        .iter()
        .enumerate()
        .filter(|(_, totals)| totals.record_count > 0)
        .map(|(hour, totals)| HourOfDayPerformance {
            hour: hour as u8,
            hour_label: hour_label(hour as u8),
            value: totals.value(metric),
            campaign_count: totals.record_count,
            percentage_of_campaigns: safe_percent(
                f64::from(totals.record_count),
                f64::from(total_campaigns),
            ),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.hour.cmp(&b.hour))
    });
    rows
}

fn in_window<'a>(
    campaigns: &'a [ProcessedCampaign],
    window: Option<&'a DateWindow>,
) -> impl Iterator<Item = &'a ProcessedCampaign> {
    campaigns
        .iter()
        .filter(move |c| window.map_or(true, |w| w.contains(c.sent_at.date())))
}

// ── Flow steps ────────────────────────────────────────────────────────────────

/// Totals of one flow step within a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStepMetrics {
    pub sequence_position: u32,
    pub message_id: String,
    pub email_name: String,
    #[serde(flatten)]
    pub volumes: EmailVolumes,
    #[serde(flatten)]
    pub rates: EmailRates,
    /// Decline in sends from the previous step; 0 for the first step.
    pub drop_off_rate: f64,
}

fn live_steps<'a>(
    flow_emails: &'a [ProcessedFlowEmail],
    flow_id: &'a str,
    window: &'a DateWindow,
) -> impl Iterator<Item = &'a ProcessedFlowEmail> {
    flow_emails.iter().filter(move |e| {
        e.is_live() && e.flow_id == flow_id && window.contains(e.sent_at.date())
    })
}

/// One row per step of `flow` (an id or a name), in sequence order, over
/// live sends in `window`. Steps without sends in the window are reported
/// with zeros.
pub fn flow_step_metrics(
    flow_emails: &[ProcessedFlowEmail],
    flow: &str,
    window: &DateWindow,
) -> Vec<FlowStepMetrics> {
    let Some(info) = flow_sequence_info(flow_emails, flow) else {
        return Vec::new();
    };

    let mut totals = vec![MetricTotals::default(); info.sequence_length];
    for email in live_steps(flow_emails, &info.flow_id, window) {
        if let Some(index) = info.message_ids.iter().position(|id| *id == email.message_id) {
            totals[index].add(&email.volumes);
        }
    }

    let mut previous_sent: Option<u64> = None;
    info.message_ids
        .iter()
        .zip(info.email_names.iter())
        .zip(totals)
        .enumerate()
        .map(|(index, ((message_id, email_name), step))| {
            let sent = step.volumes.emails_sent;
            let drop_off_rate = previous_sent
                .map(|prev| RateCalculator::drop_off_rate(prev, sent))
                .unwrap_or(0.0);
            previous_sent = Some(sent);

            FlowStepMetrics {
                sequence_position: index as u32 + 1,
                message_id: message_id.clone(),
                email_name: email_name.clone(),
                rates: step.rates(),
                volumes: step.volumes,
                drop_off_rate,
            }
        })
        .collect()
}

/// Series of `metric` for the step at `position` of `flow` (an id or a
/// name). An unknown flow yields an all-zero series.
pub fn flow_step_time_series(
    flow_emails: &[ProcessedFlowEmail],
    flow: &str,
    position: u32,
    metric: MetricKey,
    window: &DateWindow,
    granularity: Granularity,
) -> Vec<SeriesPoint> {
    let Some(flow_id) = resolve_flow_id(flow_emails, flow) else {
        return time_series_from(std::iter::empty(), metric, window, granularity);
    };
    let step = live_steps(flow_emails, flow_id, window)
        .filter(|e| e.sequence_position == position)
        .map(|e| (e.sent_at.date(), &e.volumes));
    time_series_from(step, metric, window, granularity)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
