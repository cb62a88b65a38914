use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::error::{PulseError, Result};
use crate::models::{MetricKey, Segment};
use crate::periods::{ComparisonMode, DateRange, Granularity};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Email marketing analytics over platform CSV exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mail-pulse",
    about = "Email marketing analytics over platform CSV exports",
    version
)]
pub struct Settings {
    /// Campaigns export (CSV)
    #[arg(long)]
    pub campaigns: Option<PathBuf>,

    /// Flows export (CSV)
    #[arg(long)]
    pub flows: Option<PathBuf>,

    /// Subscribers export (CSV)
    #[arg(long)]
    pub subscribers: Option<PathBuf>,

    /// Directory to scan for exports; file kinds are detected from headers
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Report view
    #[arg(long, default_value = "overview", value_parser = ["overview", "series", "day-of-week", "hour-of-day", "flow", "audience"])]
    pub view: String,

    /// Date range preset (30d, 60d, 90d, 120d, 180d, 365d, all)
    #[arg(long, default_value = "90d")]
    pub range: String,

    /// Custom range start (YYYY-MM-DD); requires --end
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Custom range end (YYYY-MM-DD); requires --start
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,

    /// Time-series bucket width
    #[arg(long, default_value = "auto", value_parser = ["auto", "daily", "weekly", "monthly"])]
    pub granularity: String,

    /// Metric for series, rollup and flow views
    #[arg(long, default_value = "revenue")]
    pub metric: String,

    /// Comparison baseline
    #[arg(long, default_value = "previous", value_parser = ["previous", "year"])]
    pub compare: String,

    /// Record collection to aggregate
    #[arg(long, default_value = "all", value_parser = ["campaigns", "flows", "all"])]
    pub segment: String,

    /// Flow id or name for the flow view (defaults to the first live flow)
    #[arg(long)]
    pub flow: Option<String>,

    /// Account timezone (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse the process arguments and resolve `"auto"` values.
    pub fn load() -> Self {
        Self::resolve_auto_values(Settings::parse())
    }

    /// Same as [`load`](Self::load) with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve_auto_values(Settings::parse_from(args))
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }

        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    /// The selected date range; `--start/--end` win over `--range`.
    pub fn date_range(&self) -> Result<DateRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => DateRange::custom(start, end),
            _ => self.range.parse(),
        }
    }

    /// Explicit granularity, or `None` for `auto`.
    pub fn granularity_override(&self) -> Result<Option<Granularity>> {
        if self.granularity == "auto" {
            return Ok(None);
        }
        self.granularity.parse().map(Some).map_err(PulseError::Config)
    }

    pub fn metric_key(&self) -> Result<MetricKey> {
        self.metric.parse().map_err(PulseError::Config)
    }

    pub fn comparison_mode(&self) -> Result<ComparisonMode> {
        self.compare.parse().map_err(PulseError::Config)
    }

    pub fn segment_kind(&self) -> Result<Segment> {
        self.segment.parse().map_err(PulseError::Config)
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }

    /// `true` when at least one input was supplied.
    pub fn has_inputs(&self) -> bool {
        self.campaigns.is_some()
            || self.flows.is_some()
            || self.subscribers.is_some()
            || self.dir.is_some()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["mail-pulse"]);

        assert!(settings.campaigns.is_none());
        assert!(settings.dir.is_none());
        assert_eq!(settings.view, "overview");
        assert_eq!(settings.range, "90d");
        assert_eq!(settings.granularity, "auto");
        assert_eq!(settings.metric, "revenue");
        assert_eq!(settings.compare, "previous");
        assert_eq!(settings.segment, "all");
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.format, "text");
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.has_inputs());
    }

    #[test]
    fn test_settings_cli_file_paths() {
        let settings = Settings::parse_from([
            "mail-pulse",
            "--campaigns",
            "/tmp/campaigns.csv",
            "--flows",
            "/tmp/flows.csv",
        ]);
        assert_eq!(settings.campaigns, Some(PathBuf::from("/tmp/campaigns.csv")));
        assert_eq!(settings.flows, Some(PathBuf::from("/tmp/flows.csv")));
        assert!(settings.has_inputs());
    }

    #[test]
    fn test_custom_range_wins_over_preset() {
        let settings = Settings::parse_from([
            "mail-pulse",
            "--range",
            "30d",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-31",
        ]);
        let range = settings.date_range().unwrap();
        assert_eq!(
            range,
            DateRange::Custom {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            }
        );
    }

    #[test]
    fn test_inverted_custom_range_is_error() {
        let settings = Settings::parse_from([
            "mail-pulse",
            "--start",
            "2024-02-01",
            "--end",
            "2024-01-01",
        ]);
        assert!(settings.date_range().is_err());
    }

    #[test]
    fn test_start_without_end_is_rejected() {
        let result = Settings::try_parse_from(["mail-pulse", "--start", "2024-01-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_typed_accessors() {
        let settings = Settings::parse_from([
            "mail-pulse",
            "--metric",
            "open-rate",
            "--compare",
            "year",
            "--segment",
            "flows",
            "--granularity",
            "weekly",
        ]);
        assert_eq!(settings.metric_key().unwrap(), MetricKey::OpenRate);
        assert_eq!(settings.comparison_mode().unwrap(), ComparisonMode::YearOverYear);
        assert_eq!(settings.segment_kind().unwrap(), Segment::Flows);
        assert_eq!(
            settings.granularity_override().unwrap(),
            Some(Granularity::Weekly)
        );
    }

    #[test]
    fn test_unknown_metric_is_config_error() {
        let settings = Settings::parse_from(["mail-pulse", "--metric", "vibes"]);
        assert!(matches!(settings.metric_key(), Err(PulseError::Config(_))));
    }

    #[test]
    fn test_load_resolves_auto_and_debug() {
        let settings = Settings::load_from_args(["mail-pulse", "--debug"]);
        assert_ne!(settings.timezone, "auto");
        assert_eq!(settings.log_level, "DEBUG");
        assert_eq!(settings.granularity_override().unwrap(), None);
    }

    #[test]
    fn test_explicit_timezone_kept() {
        let settings = Settings::load_from_args(["mail-pulse", "--timezone", "Europe/Berlin"]);
        assert_eq!(settings.timezone, "Europe/Berlin");
    }
}
