//! Period-over-period comparison.

use pulse_core::calculations::MetricTotals;
use pulse_core::models::MetricKey;
use pulse_core::periods::{ComparisonMode, DateAnchor, DateRange, DateWindow};
use serde::Serialize;

use crate::aggregator::Observation;

/// A metric's value in the selected window against its baseline window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodChange {
    pub metric: MetricKey,
    pub current: f64,
    /// `None` when a year-over-year baseline has nothing to compare against.
    pub previous: Option<f64>,
    pub change_percent: Option<f64>,
    /// Whether the change points in the good direction for this metric.
    pub is_positive: bool,
    pub current_window: DateWindow,
    pub previous_window: DateWindow,
}

/// Percentage change from `previous` to `current`.
///
/// From a zero baseline any increase counts as +100 % and no change as 0 %.
pub fn change_percent(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    let change = (current - previous) / previous.abs() * 100.0;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

/// Compare `metric` between the window `range` resolves to and its baseline.
///
/// Returns `None` for [`DateRange::All`] and when the range cannot be
/// resolved (no data). Year-over-year comparisons without any prior-year
/// records, or with a zero prior-year value, report no baseline.
pub fn period_change<'a, I>(
    observations: I,
    metric: MetricKey,
    range: DateRange,
    anchor: Option<&DateAnchor>,
    mode: ComparisonMode,
) -> Option<PeriodChange>
where
    I: IntoIterator<Item = Observation<'a>>,
{
    if range == DateRange::All {
        return None;
    }
    let current_window = range.resolve(anchor)?;
    let previous_window = mode.baseline(&current_window);

    let mut current_totals = MetricTotals::default();
    let mut previous_totals = MetricTotals::default();
    for (date, volumes) in observations {
        if current_window.contains(date) {
            current_totals.add(volumes);
        } else if previous_window.contains(date) {
            previous_totals.add(volumes);
        }
    }

    let current = current_totals.value(metric);
    let previous_value = previous_totals.value(metric);

    let (previous, change) = match mode {
        ComparisonMode::YearOverYear
            if previous_totals.record_count == 0 || previous_value == 0.0 =>
        {
            (None, None)
        }
        _ => (
            Some(previous_value),
            Some(change_percent(current, previous_value)),
        ),
    };

    let is_positive = match change {
        Some(change) if metric.is_negative_framed() => change <= 0.0,
        Some(change) => change >= 0.0,
        None => true,
    };

    Some(PeriodChange {
        metric,
        current,
        previous,
        change_percent: change,
        is_positive,
        current_window,
        previous_window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pulse_core::models::EmailVolumes;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn volumes(sent: u64, bounces: u64, revenue: f64) -> EmailVolumes {
        EmailVolumes {
            emails_sent: sent,
            bounces,
            revenue,
            ..Default::default()
        }
    }

    fn anchor() -> DateAnchor {
        DateAnchor {
            earliest: date(2023, 1, 1),
            latest: date(2024, 6, 30),
        }
    }

    #[test]
    fn test_change_percent_rules() {
        assert_eq!(change_percent(0.0, 0.0), 0.0);
        assert_eq!(change_percent(50.0, 0.0), 100.0);
        assert!((change_percent(150.0, 100.0) - 50.0).abs() < 1e-9);
        assert!((change_percent(75.0, 100.0) + 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_previous_period_revenue_growth() {
        let cur = volumes(100, 0, 150.0);
        let prev = volumes(100, 0, 100.0);
        // Last30 → 2024-06-01..2024-06-30; baseline 2024-05-02..2024-05-31.
        let obs = vec![(date(2024, 6, 10), &cur), (date(2024, 5, 10), &prev)];

        let change = period_change(
            obs,
            MetricKey::Revenue,
            DateRange::Last30,
            Some(&anchor()),
            ComparisonMode::PreviousPeriod,
        )
        .unwrap();

        assert_eq!(change.current, 150.0);
        assert_eq!(change.previous, Some(100.0));
        assert!((change.change_percent.unwrap() - 50.0).abs() < 1e-9);
        assert!(change.is_positive);
        assert_eq!(change.previous_window.end, date(2024, 5, 31));
    }

    #[test]
    fn test_previous_period_from_zero() {
        let cur = volumes(100, 0, 10.0);
        let obs = vec![(date(2024, 6, 10), &cur)];
        let change = period_change(
            obs,
            MetricKey::Revenue,
            DateRange::Last30,
            Some(&anchor()),
            ComparisonMode::PreviousPeriod,
        )
        .unwrap();
        assert_eq!(change.previous, Some(0.0));
        assert_eq!(change.change_percent, Some(100.0));

        let change = period_change(
            Vec::new(),
            MetricKey::Revenue,
            DateRange::Last30,
            Some(&anchor()),
            ComparisonMode::PreviousPeriod,
        )
        .unwrap();
        assert_eq!(change.change_percent, Some(0.0));
    }

    #[test]
    fn test_year_over_year_without_prior_records() {
        let cur = volumes(100, 0, 10.0);
        let obs = vec![(date(2024, 6, 10), &cur)];
        let change = period_change(
            obs,
            MetricKey::Revenue,
            DateRange::Last30,
            Some(&anchor()),
            ComparisonMode::YearOverYear,
        )
        .unwrap();
        assert_eq!(change.previous, None);
        assert_eq!(change.change_percent, None);
        assert_eq!(change.previous_window.start, date(2023, 6, 1));
    }

    #[test]
    fn test_year_over_year_with_prior_records() {
        let cur = volumes(100, 0, 120.0);
        let prev = volumes(100, 0, 100.0);
        let obs = vec![(date(2024, 6, 10), &cur), (date(2023, 6, 10), &prev)];
        let change = period_change(
            obs,
            MetricKey::Revenue,
            DateRange::Last30,
            Some(&anchor()),
            ComparisonMode::YearOverYear,
        )
        .unwrap();
        assert_eq!(change.previous, Some(100.0));
        assert!((change.change_percent.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_year_over_year_across_leap_day() {
        let cur = volumes(100, 0, 300.0);
        let leap = volumes(100, 0, 50.0);
        let prev = volumes(100, 0, 200.0);
        let obs = vec![
            (date(2024, 2, 29), &cur),
            (date(2024, 2, 29), &leap),
            (date(2023, 2, 28), &prev),
            (date(2023, 3, 1), &prev),
        ];
        let range = DateRange::Custom {
            start: date(2024, 2, 1),
            end: date(2024, 2, 29),
        };
        let change = period_change(
            obs,
            MetricKey::Revenue,
            range,
            Some(&anchor()),
            ComparisonMode::YearOverYear,
        )
        .unwrap();

        assert_eq!(change.previous_window.start, date(2023, 2, 1));
        assert_eq!(change.previous_window.end, date(2023, 2, 28));
        assert_eq!(change.current, 350.0);
        assert_eq!(change.previous, Some(200.0));
        assert!((change.change_percent.unwrap() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_year_over_year_long_custom_range_keeps_full_baseline() {
        let cur = volumes(100, 0, 100.0);
        let prev = volumes(100, 0, 40.0);
        // A plain one-year shift would end the baseline on 2023-03-31,
        // overlapping the current window.
        let obs = vec![
            (date(2023, 2, 1), &cur),
            (date(2023, 6, 1), &cur),
            (date(2022, 6, 1), &prev),
            (date(2022, 12, 31), &prev),
        ];
        let range = DateRange::Custom {
            start: date(2023, 1, 1),
            end: date(2024, 3, 31),
        };
        let change = period_change(
            obs,
            MetricKey::Revenue,
            range,
            Some(&anchor()),
            ComparisonMode::YearOverYear,
        )
        .unwrap();

        assert_eq!(change.previous_window.end, date(2022, 12, 31));
        assert!(change.previous_window.end < change.current_window.start);
        assert_eq!(change.current, 200.0);
        assert_eq!(change.previous, Some(80.0));
    }

    #[test]
    fn test_negative_framed_metric_flips_direction() {
        let cur = volumes(1000, 5, 0.0);
        let prev = volumes(1000, 10, 0.0);
        let obs = vec![(date(2024, 6, 10), &cur), (date(2024, 5, 10), &prev)];
        let change = period_change(
            obs,
            MetricKey::BounceRate,
            DateRange::Last30,
            Some(&anchor()),
            ComparisonMode::PreviousPeriod,
        )
        .unwrap();
        assert!((change.change_percent.unwrap() + 50.0).abs() < 1e-9);
        assert!(change.is_positive);
    }

    #[test]
    fn test_all_range_and_missing_anchor() {
        let none = period_change(
            Vec::new(),
            MetricKey::Revenue,
            DateRange::All,
            Some(&anchor()),
            ComparisonMode::PreviousPeriod,
        );
        assert!(none.is_none());

        let none = period_change(
            Vec::new(),
            MetricKey::Revenue,
            DateRange::Last30,
            None,
            ComparisonMode::PreviousPeriod,
        );
        assert!(none.is_none());
    }
}
