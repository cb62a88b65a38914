use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── ParseWarning ──────────────────────────────────────────────────────────────

/// Why a timestamp cell could not be turned into a date.
///
/// Callers decide whether to drop the row or substitute a sentinel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    #[error("timestamp is empty")]
    Empty,
    #[error("unrecognised timestamp \"{0}\"")]
    Unrecognised(String),
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d-%b-%Y"];

/// Parses export timestamps into wall-clock time of the account timezone.
///
/// Timestamps that carry an offset are converted into the handler's zone;
/// naive timestamps are assumed to already be local to it.
#[derive(Debug, Clone, Copy)]
pub struct TimezoneHandler {
    default_tz: Tz,
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self { default_tz: Tz::UTC }
    }
}

impl TimezoneHandler {
    /// Create a handler with the given IANA timezone name.
    ///
    /// Unknown names fall back to UTC with a logged warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { default_tz: tz }
    }

    /// Expose the configured timezone.
    pub fn default_tz(&self) -> Tz {
        self.default_tz
    }

    /// Current wall-clock time in the configured timezone.
    pub fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.default_tz).naive_local()
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.now_local().date()
    }

    /// Parse a timestamp cell into local wall-clock time.
    pub fn parse_local(&self, raw: &str) -> Result<NaiveDateTime, ParseWarning> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(ParseWarning::Empty);
        }

        let normalised = match s.strip_suffix('Z') {
            Some(stripped) => format!("{}+00:00", stripped),
            None => s.to_string(),
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Ok(dt.with_timezone(&self.default_tz).naive_local());
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(dt.with_timezone(&self.default_tz).naive_local());
            }
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Ok(dt.with_timezone(&self.default_tz).naive_local());
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(naive);
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(start_of_day(date));
            }
        }

        Err(ParseWarning::Unrecognised(s.to_string()))
    }

    /// Parse a timestamp cell into an absolute UTC instant.
    pub fn parse_utc(&self, raw: &str) -> Result<DateTime<Utc>, ParseWarning> {
        let local = self.parse_local(raw)?;
        match self.default_tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => Ok(Utc.from_utc_datetime(&local)),
        }
    }
}

// ── Calendar helpers ──────────────────────────────────────────────────────────

/// Midnight at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

/// The Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(offset)
}

/// The first day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The first day of the month after the one containing `date`.
pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// The same calendar day one year earlier; Feb 29 clamps to Feb 28.
pub fn shift_back_one_year(date: NaiveDate) -> NaiveDate {
    let year = date.year() - 1;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), date.day() - 1))
        .unwrap_or(date)
}

/// Number of calendar days in `[start, end]`, both inclusive. Zero if inverted.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = (end - start).num_days() + 1;
    days.max(0)
}

/// Day-of-week index with Sunday = 0 … Saturday = 6.
pub fn day_of_week_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// English day name for a Sunday-based index.
pub fn day_name(index: u8) -> &'static str {
    const NAMES: [&str; 7] = [
        "Sunday",
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
    ];
    NAMES.get(index as usize).copied().unwrap_or("Unknown")
}

/// 12-hour label for an hour of the day, e.g. `"12 AM"`, `"3 PM"`.
pub fn hour_label(hour: u8) -> String {
    match hour {
        0 => "12 AM".to_string(),
        1..=11 => format!("{} AM", hour),
        12 => "12 PM".to_string(),
        _ => format!("{} PM", hour - 12),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
