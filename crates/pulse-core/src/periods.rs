//! Date-range selection, windows and bucket granularity.
//!
//! Preset ranges are anchored to the latest send date in the loaded data,
//! never to the wall clock, so historical exports resolve the same way on
//! every run.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PulseError;
use crate::time_utils::{days_inclusive, shift_back_one_year};

/// Windows of at most this many days are bucketed daily.
pub const DAILY_MAX_DAYS: i64 = 60;
/// Windows of at most this many days are bucketed weekly; longer is monthly.
pub const WEEKLY_MAX_DAYS: i64 = 365;

// ── Granularity ───────────────────────────────────────────────────────────────

/// Width of one time-series bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// The single rule used wherever granularity is inferred.
    pub fn for_days(days: i64) -> Self {
        if days <= DAILY_MAX_DAYS {
            Granularity::Daily
        } else if days <= WEEKLY_MAX_DAYS {
            Granularity::Weekly
        } else {
            Granularity::Monthly
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            "monthly" | "month" => Ok(Granularity::Monthly),
            other => Err(format!("unknown granularity: {}", other)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

// ── DateAnchor / DateWindow ───────────────────────────────────────────────────

/// The first and last send dates of the loaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateAnchor {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

impl DateAnchor {
    /// Span the given dates. `None` when the iterator is empty.
    pub fn from_dates<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Option<Self> {
        let mut iter = dates.into_iter();
        let first = iter.next()?;
        let (earliest, latest) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self { earliest, latest })
    }
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Build a window, swapping the bounds when given in reverse.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered.
    pub fn days(&self) -> i64 {
        days_inclusive(self.start, self.end)
    }

    /// Auto-selected granularity for this window's length.
    pub fn granularity(&self) -> Granularity {
        Granularity::for_days(self.days())
    }

    /// The equal-length window immediately before this one.
    pub fn previous_contiguous(&self) -> Self {
        let end = self.start - Duration::days(1);
        let start = end - Duration::days(self.days() - 1);
        Self { start, end }
    }

    /// The same calendar window one year earlier.
    ///
    /// Windows longer than a year are cut to end the day before this one
    /// starts, so the two never overlap.
    pub fn previous_year(&self) -> Self {
        let end = shift_back_one_year(self.end).min(self.start - Duration::days(1));
        Self::new(shift_back_one_year(self.start), end)
    }
}

// ── DateRange ─────────────────────────────────────────────────────────────────

/// A user-facing range selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateRange {
    Last30,
    Last60,
    Last90,
    Last120,
    Last180,
    Last365,
    All,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl DateRange {
    /// A custom range. Fails when `start` is after `end`.
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self, PulseError> {
        if start > end {
            return Err(PulseError::InvalidDateRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(DateRange::Custom { start, end })
    }

    /// Length in days of a preset, `None` for `All` and custom ranges.
    pub fn preset_days(&self) -> Option<i64> {
        match self {
            DateRange::Last30 => Some(30),
            DateRange::Last60 => Some(60),
            DateRange::Last90 => Some(90),
            DateRange::Last120 => Some(120),
            DateRange::Last180 => Some(180),
            DateRange::Last365 => Some(365),
            DateRange::All | DateRange::Custom { .. } => None,
        }
    }

    /// Resolve into concrete days.
    ///
    /// Presets end on `anchor.latest` and span exactly N days. Returns `None`
    /// when a data-relative range is asked for without any data.
    pub fn resolve(&self, anchor: Option<&DateAnchor>) -> Option<DateWindow> {
        match self {
            DateRange::Custom { start, end } => Some(DateWindow::new(*start, *end)),
            DateRange::All => anchor.map(|a| DateWindow::new(a.earliest, a.latest)),
            preset => {
                let anchor = anchor?;
                let days = preset.preset_days()?;
                let start = anchor.latest - Duration::days(days - 1);
                Some(DateWindow::new(start, anchor.latest))
            }
        }
    }

    /// Granularity for this range; presets do not need the data to decide.
    pub fn granularity(&self, anchor: Option<&DateAnchor>) -> Granularity {
        match self.preset_days() {
            Some(days) => Granularity::for_days(days),
            None => self
                .resolve(anchor)
                .map(|w| w.granularity())
                .unwrap_or(Granularity::Daily),
        }
    }
}

impl FromStr for DateRange {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "30d" => Ok(DateRange::Last30),
            "60d" => Ok(DateRange::Last60),
            "90d" => Ok(DateRange::Last90),
            "120d" => Ok(DateRange::Last120),
            "180d" => Ok(DateRange::Last180),
            "365d" => Ok(DateRange::Last365),
            "all" => Ok(DateRange::All),
            other => Err(PulseError::InvalidDateRange(other.to_string())),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRange::All => f.write_str("all"),
            DateRange::Custom { start, end } => write!(f, "{}..{}", start, end),
            preset => write!(f, "{}d", preset.preset_days().unwrap_or_default()),
        }
    }
}

// ── ComparisonMode ────────────────────────────────────────────────────────────

/// How the baseline window of a period-over-period comparison is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    /// The equal-length window immediately before the selected one.
    PreviousPeriod,
    /// The same calendar window one year earlier.
    YearOverYear,
}

impl ComparisonMode {
    /// The baseline window for `current`.
    pub fn baseline(&self, current: &DateWindow) -> DateWindow {
        match self {
            ComparisonMode::PreviousPeriod => current.previous_contiguous(),
            ComparisonMode::YearOverYear => current.previous_year(),
        }
    }
}

impl FromStr for ComparisonMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "previous" | "previous-period" => Ok(ComparisonMode::PreviousPeriod),
            "year" | "yoy" | "year-over-year" => Ok(ComparisonMode::YearOverYear),
            other => Err(format!("unknown comparison mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn anchor() -> DateAnchor {
        DateAnchor {
            earliest: date(2023, 1, 1),
            latest: date(2024, 6, 30),
        }
    }

    #[test]
    fn test_granularity_thresholds() {
        assert_eq!(Granularity::for_days(1), Granularity::Daily);
        assert_eq!(Granularity::for_days(60), Granularity::Daily);
        assert_eq!(Granularity::for_days(61), Granularity::Weekly);
        assert_eq!(Granularity::for_days(365), Granularity::Weekly);
        assert_eq!(Granularity::for_days(366), Granularity::Monthly);
    }

    #[test]
    fn test_preset_granularity_matches_window() {
        let a = anchor();
        for range in [
            DateRange::Last30,
            DateRange::Last60,
            DateRange::Last90,
            DateRange::Last365,
        ] {
            let window = range.resolve(Some(&a)).unwrap();
            assert_eq!(range.granularity(Some(&a)), window.granularity());
        }
        assert_eq!(DateRange::All.granularity(Some(&a)), Granularity::Monthly);
    }

    #[test]
    fn test_preset_resolves_to_exact_day_count() {
        let window = DateRange::Last30.resolve(Some(&anchor())).unwrap();
        assert_eq!(window.end, date(2024, 6, 30));
        assert_eq!(window.start, date(2024, 6, 1));
        assert_eq!(window.days(), 30);
    }

    #[test]
    fn test_all_spans_anchor() {
        let window = DateRange::All.resolve(Some(&anchor())).unwrap();
        assert_eq!(window.start, date(2023, 1, 1));
        assert_eq!(window.end, date(2024, 6, 30));
    }

    #[test]
    fn test_resolve_without_anchor() {
        assert!(DateRange::Last90.resolve(None).is_none());
        assert!(DateRange::All.resolve(None).is_none());
        let custom = DateRange::custom(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert_eq!(custom.resolve(None).unwrap().days(), 31);
    }

    #[test]
    fn test_custom_rejects_inverted_bounds() {
        assert!(DateRange::custom(date(2024, 2, 1), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_previous_contiguous_window() {
        let window = DateWindow::new(date(2024, 6, 1), date(2024, 6, 30));
        let prev = window.previous_contiguous();
        assert_eq!(prev.end, date(2024, 5, 31));
        assert_eq!(prev.start, date(2024, 5, 2));
        assert_eq!(prev.days(), window.days());
    }

    #[test]
    fn test_previous_year_window_clamps_leap_day() {
        let window = DateWindow::new(date(2024, 2, 1), date(2024, 2, 29));
        let prev = window.previous_year();
        assert_eq!(prev.start, date(2023, 2, 1));
        assert_eq!(prev.end, date(2023, 2, 28));
    }

    #[test]
    fn test_previous_year_never_overlaps_long_window() {
        let window = DateWindow::new(date(2023, 1, 1), date(2024, 2, 4));
        let prev = window.previous_year();
        assert_eq!(prev.start, date(2022, 1, 1));
        assert_eq!(prev.end, date(2022, 12, 31));
        assert!(!prev.contains(window.start));

        // Exactly a year long still shifts both ends.
        let window = DateWindow::new(date(2023, 3, 1), date(2024, 2, 29));
        let prev = window.previous_year();
        assert_eq!(prev.start, date(2022, 3, 1));
        assert_eq!(prev.end, date(2023, 2, 28));
    }

    #[test]
    fn test_anchor_from_dates() {
        let a = DateAnchor::from_dates(vec![date(2024, 3, 1), date(2023, 5, 2), date(2024, 1, 1)])
            .unwrap();
        assert_eq!(a.earliest, date(2023, 5, 2));
        assert_eq!(a.latest, date(2024, 3, 1));
        assert!(DateAnchor::from_dates(Vec::new()).is_none());
    }

    #[test]
    fn test_date_range_parse_and_display() {
        assert_eq!("90d".parse::<DateRange>().unwrap(), DateRange::Last90);
        assert_eq!("ALL".parse::<DateRange>().unwrap(), DateRange::All);
        assert!("45d".parse::<DateRange>().is_err());
        assert_eq!(DateRange::Last180.to_string(), "180d");
    }

    #[test]
    fn test_comparison_mode_parse() {
        assert_eq!(
            "yoy".parse::<ComparisonMode>().unwrap(),
            ComparisonMode::YearOverYear
        );
        assert_eq!(
            "previous".parse::<ComparisonMode>().unwrap(),
            ComparisonMode::PreviousPeriod
        );
    }
}
