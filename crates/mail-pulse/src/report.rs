//! Report views printed by the CLI.
//!
//! Each view is computed into a serializable struct, then rendered either as
//! pretty JSON or as aligned plain text.

use std::fmt::Write;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use pulse_core::error::PulseError;
use pulse_core::formatting::{
    format_change, format_currency, format_metric_value, format_number, format_percent,
};
use pulse_core::models::{FlowSequenceInfo, MetricKey, Segment, SeriesPoint};
use pulse_core::periods::{ComparisonMode, DateRange, DateWindow, Granularity};
use pulse_core::settings::Settings;
use pulse_data::audience::{AudienceOverview, LifetimeBucket};
use pulse_data::comparison::PeriodChange;
use pulse_data::rollups::{DayOfWeekPerformance, FlowStepMetrics, HourOfDayPerformance};
use pulse_runtime::data_store::DataStore;
use serde::Serialize;

// ── Query ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Overview,
    Series,
    DayOfWeek,
    HourOfDay,
    Flow,
    Audience,
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(View::Overview),
            "series" => Ok(View::Series),
            "day-of-week" => Ok(View::DayOfWeek),
            "hour-of-day" => Ok(View::HourOfDay),
            "flow" => Ok(View::Flow),
            "audience" => Ok(View::Audience),
            other => Err(format!("unknown view: {}", other)),
        }
    }
}

/// Everything a view needs from the command line, already validated.
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub view: View,
    pub range: DateRange,
    pub granularity: Option<Granularity>,
    pub metric: MetricKey,
    pub compare: ComparisonMode,
    pub segment: Segment,
    pub flow: Option<String>,
}

impl ReportQuery {
    pub fn from_settings(settings: &Settings) -> Result<Self, PulseError> {
        Ok(Self {
            view: settings.view.parse().map_err(PulseError::Config)?,
            range: settings.date_range()?,
            granularity: settings.granularity_override()?,
            metric: settings.metric_key()?,
            compare: settings.comparison_mode()?,
            segment: settings.segment_kind()?,
            flow: settings.flow.clone(),
        })
    }
}

// ── View data ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OverviewReport {
    range: String,
    segment: Segment,
    window: Option<DateWindow>,
    last_email_date: Option<NaiveDate>,
    campaign_count: usize,
    flow_email_count: usize,
    metrics: Vec<MetricCard>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricCard {
    metric: MetricKey,
    label: &'static str,
    value: f64,
    change: Option<PeriodChange>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeriesReport {
    metric: MetricKey,
    segment: Segment,
    granularity: Granularity,
    window: Option<DateWindow>,
    points: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DayOfWeekReport {
    metric: MetricKey,
    window: Option<DateWindow>,
    days: Vec<DayOfWeekPerformance>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HourOfDayReport {
    metric: MetricKey,
    window: Option<DateWindow>,
    hours: Vec<HourOfDayPerformance>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowListReport {
    flows: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowReport {
    sequence: FlowSequenceInfo,
    window: Option<DateWindow>,
    steps: Vec<FlowStepMetrics>,
    metric: MetricKey,
    step_series: Vec<StepSeries>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepSeries {
    sequence_position: u32,
    points: Vec<SeriesPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudienceReport {
    overview: AudienceOverview,
    lifetime: Vec<LifetimeBucket>,
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Compute `query.view` against `store` and render it.
pub fn render(store: &DataStore, query: &ReportQuery, json: bool) -> Result<String> {
    match query.view {
        View::Overview => emit(&overview(store, query), json, overview_text),
        View::Series => emit(&series(store, query), json, series_text),
        View::DayOfWeek => emit(&day_of_week(store, query), json, day_of_week_text),
        View::HourOfDay => emit(&hour_of_day(store, query), json, hour_of_day_text),
        View::Audience => emit(&audience(store), json, audience_text),
        View::Flow => match &query.flow {
            None => emit(
                &FlowListReport {
                    flows: store.flow_names(),
                },
                json,
                flow_list_text,
            ),
            Some(name) => {
                let Some(report) = flow(store, query, name) else {
                    bail!("no flow named '{}' in the loaded data", name);
                };
                emit(&report, json, flow_text)
            }
        },
    }
}

fn emit<T: Serialize>(
    report: &T,
    json: bool,
    text: fn(&T, &mut String) -> std::fmt::Result,
) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = String::new();
    text(report, &mut out)?;
    Ok(out.trim_end().to_string())
}

fn overview(store: &DataStore, query: &ReportQuery) -> OverviewReport {
    let totals = store.metric_totals(query.range, query.segment);
    let metrics = MetricKey::overview()
        .iter()
        .map(|&metric| MetricCard {
            metric,
            label: metric.label(),
            value: totals.value(metric),
            change: store.period_change(metric, query.range, query.compare, query.segment),
        })
        .collect();

    OverviewReport {
        range: query.range.to_string(),
        segment: query.segment,
        window: store.resolve_window(query.range),
        last_email_date: store.last_email_date(),
        campaign_count: store.campaigns().len(),
        flow_email_count: store.flow_emails().len(),
        metrics,
    }
}

fn overview_text(report: &OverviewReport, out: &mut String) -> std::fmt::Result {
    writeln!(out, "Overview ({}, {})", window_label(report.window), report.range)?;
    if let Some(date) = report.last_email_date {
        writeln!(out, "Last email sent {}", date)?;
    }
    writeln!(
        out,
        "{} campaigns, {} flow email rows loaded",
        format_number(report.campaign_count as f64, 0),
        format_number(report.flow_email_count as f64, 0)
    )?;
    writeln!(out)?;
    for card in &report.metrics {
        let change = card.change.as_ref().and_then(|c| c.change_percent);
        writeln!(
            out,
            "{:<22} {:>16} {:>10}",
            card.label,
            format_metric_value(card.metric, card.value),
            format_change(change)
        )?;
    }
    Ok(())
}

fn series(store: &DataStore, query: &ReportQuery) -> SeriesReport {
    SeriesReport {
        metric: query.metric,
        segment: query.segment,
        granularity: query
            .granularity
            .unwrap_or_else(|| store.granularity_for_date_range(query.range)),
        window: store.resolve_window(query.range),
        points: store.time_series(query.metric, query.range, query.granularity, query.segment),
    }
}

fn series_text(report: &SeriesReport, out: &mut String) -> std::fmt::Result {
    writeln!(
        out,
        "{} by {} ({})",
        report.metric.label(),
        report.granularity,
        window_label(report.window)
    )?;
    for point in &report.points {
        writeln!(
            out,
            "{}  {:>16}",
            point.date,
            format_metric_value(report.metric, point.value)
        )?;
    }
    Ok(())
}

fn day_of_week(store: &DataStore, query: &ReportQuery) -> DayOfWeekReport {
    DayOfWeekReport {
        metric: query.metric,
        window: store.resolve_window(query.range),
        days: store.campaign_performance_by_day_of_week(query.metric, query.range),
    }
}

fn day_of_week_text(report: &DayOfWeekReport, out: &mut String) -> std::fmt::Result {
    writeln!(
        out,
        "Campaign {} by day of week ({})",
        report.metric.label(),
        window_label(report.window)
    )?;
    for day in &report.days {
        writeln!(
            out,
            "{:<10} {:>16} {:>6} campaigns",
            day.day_name,
            format_metric_value(report.metric, day.value),
            day.campaign_count
        )?;
    }
    Ok(())
}

fn hour_of_day(store: &DataStore, query: &ReportQuery) -> HourOfDayReport {
    HourOfDayReport {
        metric: query.metric,
        window: store.resolve_window(query.range),
        hours: store.campaign_performance_by_hour_of_day(query.metric, query.range),
    }
}

fn hour_of_day_text(report: &HourOfDayReport, out: &mut String) -> std::fmt::Result {
    writeln!(
        out,
        "Campaign {} by send hour ({})",
        report.metric.label(),
        window_label(report.window)
    )?;
    if report.hours.is_empty() {
        writeln!(out, "No campaigns in range")?;
    }
    for hour in &report.hours {
        writeln!(
            out,
            "{:<6} {:>16} {:>6} campaigns {:>8}",
            hour.hour_label,
            format_metric_value(report.metric, hour.value),
            hour.campaign_count,
            format_percent(hour.percentage_of_campaigns, 1)
        )?;
    }
    Ok(())
}

fn flow_list_text(report: &FlowListReport, out: &mut String) -> std::fmt::Result {
    if report.flows.is_empty() {
        return writeln!(out, "No live flows loaded");
    }
    writeln!(out, "Live flows (pick one with --flow):")?;
    for name in &report.flows {
        writeln!(out, "  {}", name)?;
    }
    Ok(())
}

fn flow(store: &DataStore, query: &ReportQuery, flow: &str) -> Option<FlowReport> {
    let sequence = store.flow_sequence_info(flow)?;
    let flow_id = sequence.flow_id.as_str();
    let steps = store.flow_step_metrics(flow_id, query.range);
    let step_series = steps
        .iter()
        .map(|step| StepSeries {
            sequence_position: step.sequence_position,
            points: store.flow_step_time_series(
                flow_id,
                step.sequence_position,
                query.metric,
                query.range,
                query.granularity,
            ),
        })
        .collect();

    Some(FlowReport {
        sequence,
        window: store.resolve_window(query.range),
        steps,
        metric: query.metric,
        step_series,
    })
}

fn flow_text(report: &FlowReport, out: &mut String) -> std::fmt::Result {
    writeln!(
        out,
        "{} ({} steps, {})",
        report.sequence.flow_name,
        report.sequence.sequence_length,
        window_label(report.window)
    )?;
    if report.sequence.has_duplicate_names {
        writeln!(out, "Note: several steps share the same email name")?;
    }
    writeln!(
        out,
        "{:<4} {:<28} {:>10} {:>9} {:>9} {:>14} {:>9}",
        "#", "Email", "Sent", "Open", "Click", "Revenue", "Drop-off"
    )?;
    for step in &report.steps {
        writeln!(
            out,
            "{:<4} {:<28} {:>10} {:>9} {:>9} {:>14} {:>9}",
            step.sequence_position,
            truncate(&step.email_name, 28),
            format_number(step.volumes.emails_sent as f64, 0),
            format_percent(step.rates.open_rate, 1),
            format_percent(step.rates.click_rate, 1),
            format_currency(step.volumes.revenue),
            format_percent(step.drop_off_rate, 1)
        )?;
    }
    Ok(())
}

fn audience(store: &DataStore) -> AudienceReport {
    AudienceReport {
        overview: store.audience_overview(),
        lifetime: store.lifetime_distribution(),
    }
}

fn audience_text(report: &AudienceReport, out: &mut String) -> std::fmt::Result {
    let o = &report.overview;
    writeln!(out, "Subscribers      {:>12}", format_number(o.total_subscribers as f64, 0))?;
    writeln!(
        out,
        "Buyers           {:>12} {:>8}",
        format_number(o.buyer_count as f64, 0),
        format_percent(o.buyer_percent, 1)
    )?;
    writeln!(
        out,
        "Consented        {:>12} {:>8}",
        format_number(o.consented_count as f64, 0),
        format_percent(o.consented_percent, 1)
    )?;
    writeln!(
        out,
        "Can receive      {:>12} {:>8}",
        format_number(o.can_receive_count as f64, 0),
        format_percent(o.can_receive_percent, 1)
    )?;
    writeln!(out, "Avg CLV          {:>12}", format_currency(o.avg_clv))?;
    writeln!(out, "Avg buyer CLV    {:>12}", format_currency(o.avg_buyer_clv))?;
    writeln!(out, "Avg lifetime     {:>12} days", format_number(o.avg_lifetime_days, 0))?;
    writeln!(out)?;
    writeln!(out, "Profile age")?;
    for bucket in &report.lifetime {
        writeln!(
            out,
            "  {:<12} {:>10} {:>8}",
            bucket.label,
            format_number(bucket.count as f64, 0),
            format_percent(bucket.percent, 1)
        )?;
    }
    Ok(())
}

fn window_label(window: Option<DateWindow>) -> String {
    match window {
        Some(w) => format!("{} to {}", w.start, w.end),
        None => "no data".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

// ── Tests ──────────────────────────────────────────────────────────────────────
