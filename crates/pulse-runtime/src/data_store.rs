//! In-memory store of the loaded exports.
//!
//! [`DataStore`] owns an immutable [`Dataset`] snapshot and serves every
//! read-side query against it. A load builds a complete new dataset before
//! swapping it in, so readers holding a [`DataStore::snapshot`] never see a
//! partially loaded state.

use std::sync::Arc;

use chrono::NaiveDate;
use pulse_core::calculations::MetricTotals;
use pulse_core::models::{
    FlowSequenceInfo, MetricKey, ProcessedCampaign, ProcessedFlowEmail, ProcessedSubscriber,
    Segment, SeriesPoint,
};
use pulse_core::periods::{ComparisonMode, DateAnchor, DateRange, DateWindow, Granularity};
use pulse_core::time_utils::TimezoneHandler;
use pulse_data::aggregator::{self, Observation};
use pulse_data::analysis::{build_dataset, Dataset};
use pulse_data::audience::{self, AudienceOverview, LifetimeBucket};
use pulse_data::comparison::{self, PeriodChange};
use pulse_data::rollups::{self, DayOfWeekPerformance, FlowStepMetrics, HourOfDayPerformance};
use pulse_data::sequence;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::loader::{read_and_parse, InputFile, LoadProgress, LoadReport};

// ── DataStore ─────────────────────────────────────────────────────────────────

/// Holder of the current dataset and its read API.
///
/// # Example
/// ```no_run
/// use pulse_core::models::{MetricKey, RecordKind, Segment};
/// use pulse_core::periods::DateRange;
/// use pulse_core::time_utils::TimezoneHandler;
/// use pulse_runtime::data_store::DataStore;
/// use pulse_runtime::loader::InputFile;
///
/// # async fn run() {
/// let mut store = DataStore::new(TimezoneHandler::default());
/// let files = vec![InputFile::new(RecordKind::Campaigns, "campaigns.csv")];
/// let report = store.load_files(&files, |_| {}).await;
/// if report.success {
///     let totals = store.metric_totals(DateRange::Last30, Segment::Campaigns);
///     println!("revenue: {}", totals.value(MetricKey::Revenue));
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DataStore {
    dataset: Arc<Dataset>,
    timezone: TimezoneHandler,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(TimezoneHandler::default())
    }
}

impl DataStore {
    /// An empty store interpreting timestamps in `timezone`.
    pub fn new(timezone: TimezoneHandler) -> Self {
        Self {
            dataset: Arc::new(Dataset::default()),
            timezone,
        }
    }

    /// A store over an already built dataset.
    pub fn from_dataset(dataset: Dataset, timezone: TimezoneHandler) -> Self {
        Self {
            dataset: Arc::new(dataset),
            timezone,
        }
    }

    /// The current snapshot; unaffected by later loads.
    pub fn snapshot(&self) -> Arc<Dataset> {
        Arc::clone(&self.dataset)
    }

    // ── Loading ───────────────────────────────────────────────────────────

    /// Load `files`, replacing the current dataset.
    ///
    /// A file that fails leaves its collection empty in the new dataset; the
    /// other files load normally.
    pub async fn load_files<F>(&mut self, files: &[InputFile], on_progress: F) -> LoadReport
    where
        F: FnMut(LoadProgress),
    {
        self.load_files_with_cancel(files, on_progress, CancellationToken::new())
            .await
    }

    /// [`load_files`](Self::load_files) that stops when `cancel` fires.
    ///
    /// A cancelled load keeps the previous dataset.
    pub async fn load_files_with_cancel<F>(
        &mut self,
        files: &[InputFile],
        on_progress: F,
        cancel: CancellationToken,
    ) -> LoadReport
    where
        F: FnMut(LoadProgress),
    {
        let (parsed, report) = read_and_parse(files, on_progress, &cancel).await;
        if report.cancelled {
            info!("Load cancelled; keeping previous dataset");
            return report;
        }

        let dataset = build_dataset(&parsed, self.timezone);
        self.dataset = Arc::new(dataset);

        info!(
            "Load finished: {} loaded, {} failed, {} with dropped rows",
            report.loaded.len(),
            report.errors.len(),
            report.warnings.len()
        );
        report
    }

    // ── Collections ───────────────────────────────────────────────────────

    pub fn campaigns(&self) -> &[ProcessedCampaign] {
        &self.dataset.campaigns
    }

    pub fn flow_emails(&self) -> &[ProcessedFlowEmail] {
        &self.dataset.flow_emails
    }

    pub fn subscribers(&self) -> &[ProcessedSubscriber] {
        &self.dataset.subscribers
    }

    pub fn anchor(&self) -> Option<DateAnchor> {
        self.dataset.anchor
    }

    pub fn last_email_date(&self) -> Option<NaiveDate> {
        self.dataset.last_email_date()
    }

    /// Sorted names of live flows.
    pub fn flow_names(&self) -> Vec<String> {
        sequence::flow_names(&self.dataset.flow_emails)
    }

    // ── Ranges ────────────────────────────────────────────────────────────

    /// The span ranges resolve against: the loaded send dates, or today in
    /// the configured timezone when nothing has been sent.
    fn reference_anchor(&self) -> DateAnchor {
        self.dataset.anchor.unwrap_or_else(|| {
            let today = self.timezone.today();
            DateAnchor {
                earliest: today,
                latest: today,
            }
        })
    }

    /// Concrete days of `range` for the loaded data.
    pub fn resolve_window(&self, range: DateRange) -> Option<DateWindow> {
        range.resolve(Some(&self.reference_anchor()))
    }

    pub fn granularity_for_date_range(&self, range: DateRange) -> Granularity {
        range.granularity(Some(&self.reference_anchor()))
    }

    // ── Aggregates ────────────────────────────────────────────────────────

    /// Campaign and live flow sends of `segment`.
    fn segment_observations(&self, segment: Segment) -> Vec<Observation<'_>> {
        let campaigns = aggregator::observations(&self.dataset.campaigns);
        let flows = self
            .dataset
            .flow_emails
            .iter()
            .filter(|e| e.is_live())
            .map(|e| (e.sent_at.date(), &e.volumes));

        match segment {
            Segment::Campaigns => campaigns.collect(),
            Segment::Flows => flows.collect(),
            Segment::All => campaigns.chain(flows).collect(),
        }
    }

    /// Summed volumes and rates of `segment` within `range`.
    pub fn metric_totals(&self, range: DateRange, segment: Segment) -> MetricTotals {
        match self.resolve_window(range) {
            Some(window) => aggregator::totals_from(self.segment_observations(segment), Some(&window)),
            None => MetricTotals::default(),
        }
    }

    /// Bucketed series of `metric`; `granularity` defaults to the range's.
    pub fn time_series(
        &self,
        metric: MetricKey,
        range: DateRange,
        granularity: Option<Granularity>,
        segment: Segment,
    ) -> Vec<SeriesPoint> {
        let Some(window) = self.resolve_window(range) else {
            return Vec::new();
        };
        let granularity = granularity.unwrap_or_else(|| self.granularity_for_date_range(range));
        aggregator::time_series_from(self.segment_observations(segment), metric, &window, granularity)
    }

    pub fn period_change(
        &self,
        metric: MetricKey,
        range: DateRange,
        mode: ComparisonMode,
        segment: Segment,
    ) -> Option<PeriodChange> {
        comparison::period_change(
            self.segment_observations(segment),
            metric,
            range,
            Some(&self.reference_anchor()),
            mode,
        )
    }

    // ── Rollups ───────────────────────────────────────────────────────────

    pub fn campaign_performance_by_day_of_week(
        &self,
        metric: MetricKey,
        range: DateRange,
    ) -> Vec<DayOfWeekPerformance> {
        let window = self.resolve_window(range);
        rollups::performance_by_day_of_week(&self.dataset.campaigns, metric, window.as_ref())
    }

    pub fn campaign_performance_by_hour_of_day(
        &self,
        metric: MetricKey,
        range: DateRange,
    ) -> Vec<HourOfDayPerformance> {
        let Some(window) = self.resolve_window(range) else {
            return Vec::new();
        };
        rollups::performance_by_hour_of_day(&self.dataset.campaigns, metric, Some(&window))
    }

    // ── Flows ─────────────────────────────────────────────────────────────

    /// `flow` is a flow id, or a name resolved to the flow last sent under it.
    pub fn flow_sequence_info(&self, flow: &str) -> Option<FlowSequenceInfo> {
        sequence::flow_sequence_info(&self.dataset.flow_emails, flow)
    }

    pub fn flow_step_metrics(&self, flow: &str, range: DateRange) -> Vec<FlowStepMetrics> {
        match self.resolve_window(range) {
            Some(window) => rollups::flow_step_metrics(&self.dataset.flow_emails, flow, &window),
            None => Vec::new(),
        }
    }

    pub fn flow_step_time_series(
        &self,
        flow: &str,
        position: u32,
        metric: MetricKey,
        range: DateRange,
        granularity: Option<Granularity>,
    ) -> Vec<SeriesPoint> {
        let Some(window) = self.resolve_window(range) else {
            return Vec::new();
        };
        let granularity = granularity.unwrap_or_else(|| self.granularity_for_date_range(range));
        rollups::flow_step_time_series(
            &self.dataset.flow_emails,
            flow,
            position,
            metric,
            &window,
            granularity,
        )
    }

    // ── Audience ──────────────────────────────────────────────────────────

    pub fn audience_overview(&self) -> AudienceOverview {
        audience::audience_overview(&self.dataset.subscribers)
    }

    pub fn lifetime_distribution(&self) -> Vec<LifetimeBucket> {
        audience::lifetime_distribution(&self.dataset.subscribers)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
