//! Time-bucketed aggregation over dated email records.
//!
//! Every aggregate sums raw volumes first and derives ratio metrics from the
//! sums, so rates are weighted by send volume.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use pulse_core::calculations::{EmailMetrics, MetricTotals};
use pulse_core::models::{EmailVolumes, MetricKey, SeriesPoint};
use pulse_core::periods::{DateWindow, Granularity};
use pulse_core::time_utils::{month_start, next_month_start, week_start};

/// The send date and volumes of one record.
pub type Observation<'a> = (NaiveDate, &'a EmailVolumes);

/// View records as [`Observation`]s, so campaigns and flow emails can be
/// chained into one stream.
pub fn observations<R: EmailMetrics>(
    records: &[R],
) -> impl Iterator<Item = Observation<'_>> + Clone {
    records.iter().map(|r| (r.sent_date(), r.volumes()))
}

// ── Buckets ───────────────────────────────────────────────────────────────────

/// The key of the bucket `date` falls into: the day itself, the Monday of its
/// week, or the first of its month.
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => week_start(date),
        Granularity::Monthly => month_start(date),
    }
}

/// Every bucket key overlapping `window`, ascending.
pub fn bucket_dates(window: &DateWindow, granularity: Granularity) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut cursor = bucket_start(window.start, granularity);
    while cursor <= window.end {
        dates.push(cursor);
        cursor = match granularity {
            Granularity::Daily => cursor + Duration::days(1),
            Granularity::Weekly => cursor + Duration::days(7),
            Granularity::Monthly => next_month_start(cursor),
        };
    }
    dates
}

// ── Totals ────────────────────────────────────────────────────────────────────

/// Sum observations, optionally restricted to `window`.
pub fn totals_from<'a, I>(observations: I, window: Option<&DateWindow>) -> MetricTotals
where
    I: IntoIterator<Item = Observation<'a>>,
{
    let mut totals = MetricTotals::default();
    for (date, volumes) in observations {
        if window.map_or(true, |w| w.contains(date)) {
            totals.add(volumes);
        }
    }
    totals
}

/// Summed volumes (and derived rates) of `records`, optionally windowed.
pub fn metric_totals<R: EmailMetrics>(records: &[R], window: Option<&DateWindow>) -> MetricTotals {
    totals_from(observations(records), window)
}

// ── Time series ───────────────────────────────────────────────────────────────

/// Bucket observations into a zero-seeded series covering `window`.
///
/// The number of points depends only on `window` and `granularity`.
pub fn time_series_from<'a, I>(
    observations: I,
    metric: MetricKey,
    window: &DateWindow,
    granularity: Granularity,
) -> Vec<SeriesPoint>
where
    I: IntoIterator<Item = Observation<'a>>,
{
    let mut buckets: BTreeMap<NaiveDate, MetricTotals> = bucket_dates(window, granularity)
        .into_iter()
        .map(|date| (date, MetricTotals::default()))
        .collect();

    for (date, volumes) in observations {
        if !window.contains(date) {
            continue;
        }
        if let Some(bucket) = buckets.get_mut(&bucket_start(date, granularity)) {
            bucket.add(volumes);
        }
    }

    buckets
        .into_iter()
        .map(|(date, totals)| SeriesPoint {
            date,
            value: totals.value(metric),
        })
        .collect()
}

/// [`time_series_from`] over a slice of records.
pub fn time_series<R: EmailMetrics>(
    records: &[R],
    metric: MetricKey,
    window: &DateWindow,
    granularity: Granularity,
) -> Vec<SeriesPoint> {
    time_series_from(observations(records), metric, window, granularity)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
