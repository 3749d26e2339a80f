use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::diagnostics::{self, ChannelStability, QuadrantMap, StabilitySummary};
use crate::error::{Error, Result};
use crate::query::period::Period;
use crate::query::range::DateRange;
use crate::records::RecordStore;
use crate::views::{self, ChannelMonthly, ChannelRoi, DailyKpi, KpiMetric};

/// The three views served to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewName {
    DailyKpi,
    ChannelMonthly,
    ChannelRoi,
}

impl ViewName {
    pub const ALL: [ViewName; 3] = [
        ViewName::DailyKpi,
        ViewName::ChannelMonthly,
        ViewName::ChannelRoi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViewName::DailyKpi => "daily_kpi",
            ViewName::ChannelMonthly => "channel_monthly",
            ViewName::ChannelRoi => "channel_roi",
        }
    }

    /// Name of the materialized table in the warehouse.
    pub fn table_name(self) -> &'static str {
        match self {
            ViewName::DailyKpi => "vw_marketing_kpi",
            ViewName::ChannelMonthly => "vw_campaign_monthly",
            ViewName::ChannelRoi => "vw_campaign_roi_map",
        }
    }
}

impl FromStr for ViewName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "daily_kpi" | "vw_marketing_kpi" => Ok(ViewName::DailyKpi),
            "channel_monthly" | "vw_campaign_monthly" => Ok(ViewName::ChannelMonthly),
            "channel_roi" | "vw_campaign_roi_map" => Ok(ViewName::ChannelRoi),
            other => Err(Error::InvalidViewName(other.to_string())),
        }
    }
}

impl std::fmt::Display for ViewName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows of one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewRows {
    DailyKpi(Vec<DailyKpi>),
    ChannelMonthly(Vec<ChannelMonthly>),
    ChannelRoi(Vec<ChannelRoi>),
}

impl ViewRows {
    pub fn name(&self) -> ViewName {
        match self {
            ViewRows::DailyKpi(_) => ViewName::DailyKpi,
            ViewRows::ChannelMonthly(_) => ViewName::ChannelMonthly,
            ViewRows::ChannelRoi(_) => ViewName::ChannelRoi,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ViewRows::DailyKpi(rows) => rows.len(),
            ViewRows::ChannelMonthly(rows) => rows.len(),
            ViewRows::ChannelRoi(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Explicit query context: the immutable record store, the optional
/// stability feed, and lazily built full views.
///
/// Views are built at most once per context and filtered per call. A context
/// is `Send + Sync`, so sessions can share one behind an `Arc` or build their
/// own from the same store.
#[derive(Debug, Default)]
pub struct QueryContext {
    store: RecordStore,
    stability: Arc<[StabilitySummary]>,
    daily: OnceLock<Vec<DailyKpi>>,
    monthly: OnceLock<Vec<ChannelMonthly>>,
    roi: OnceLock<Vec<ChannelRoi>>,
}

impl QueryContext {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Attach the external stability feed.
    pub fn with_stability(mut self, rows: Vec<StabilitySummary>) -> Self {
        self.stability = rows.into();
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn stability_rows(&self) -> &[StabilitySummary] {
        &self.stability
    }

    pub fn has_stability(&self) -> bool {
        !self.stability.is_empty()
    }

    /// Serve a view by name over an inclusive date range.
    ///
    /// `channel_roi` has no date column and always covers all time. An
    /// inverted range yields an empty result for every view.
    pub fn get_view(&self, name: &str, range: DateRange) -> Result<ViewRows> {
        let name: ViewName = name.parse()?;
        Ok(self.view(name, range))
    }

    pub fn view(&self, name: ViewName, range: DateRange) -> ViewRows {
        log::debug!("serving view {name} for {range}");
        match name {
            ViewName::DailyKpi => ViewRows::DailyKpi(self.daily_kpi(range)),
            ViewName::ChannelMonthly => ViewRows::ChannelMonthly(self.channel_monthly(range)),
            ViewName::ChannelRoi => {
                if range.is_empty() {
                    ViewRows::ChannelRoi(Vec::new())
                } else {
                    ViewRows::ChannelRoi(self.channel_roi().to_vec())
                }
            }
        }
    }

    pub fn daily_kpi(&self, range: DateRange) -> Vec<DailyKpi> {
        self.all_daily_kpi()
            .iter()
            .filter(|k| range.contains(k.dt))
            .cloned()
            .collect()
    }

    pub fn channel_monthly(&self, range: DateRange) -> Vec<ChannelMonthly> {
        self.all_channel_monthly()
            .iter()
            .filter(|m| range.contains(m.month_id))
            .cloned()
            .collect()
    }

    /// The all-time channel ROI map.
    pub fn channel_roi(&self) -> &[ChannelRoi] {
        self.roi
            .get_or_init(|| views::build_channel_roi(self.store.records()))
    }

    pub fn all_daily_kpi(&self) -> &[DailyKpi] {
        self.daily
            .get_or_init(|| views::build_daily_kpi(self.store.records()))
    }

    pub fn all_channel_monthly(&self) -> &[ChannelMonthly] {
        self.monthly
            .get_or_init(|| views::build_channel_monthly(self.store.records()))
    }

    /// First to last observed date, if there is any data.
    pub fn observed_range(&self) -> Option<DateRange> {
        self.store
            .date_bounds()
            .map(|(start, end)| DateRange::new(start, end))
    }

    /// The initial dashboard selection: the two months up to the last
    /// observed date.
    pub fn default_range(&self) -> Option<DateRange> {
        let observed = self.observed_range()?;
        let trailing = Period::TrailingMonths(2).date_range(observed.end);
        Some(DateRange::new(trailing.start.max(observed.start), observed.end))
    }

    /// Resolve a period, anchoring trailing periods on the last observed
    /// date (today when there is no data).
    pub fn resolve_period(&self, period: &Period) -> DateRange {
        let anchor = self
            .observed_range()
            .map(|r| r.end)
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        period.date_range(anchor)
    }

    /// Daily values of `metric` within `range`, one entry per observed date;
    /// `None` where the metric is undefined on that date.
    pub fn kpi_series(&self, metric: KpiMetric, range: DateRange) -> Vec<Option<f64>> {
        self.all_daily_kpi()
            .iter()
            .filter(|k| range.contains(k.dt))
            .map(|k| k.metric(metric))
            .collect()
    }

    /// Period-over-period delta of a daily KPI column, split by position over
    /// every date in range.
    pub fn kpi_delta(&self, metric: KpiMetric, range: DateRange) -> f64 {
        diagnostics::period_delta_sparse(&self.kpi_series(metric, range))
    }

    pub fn quadrants(&self) -> QuadrantMap {
        diagnostics::classify_quadrant(self.channel_roi())
    }

    pub fn stability_ranking(&self, range: DateRange) -> Vec<ChannelStability> {
        diagnostics::rank_stability(&self.stability, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PerformanceRecord;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn context() -> QueryContext {
        let records = vec![
            PerformanceRecord::new(d(2021, 1, 1), "Email", 10.0, 5, 100, 1.0),
            PerformanceRecord::new(d(2021, 1, 15), "Google Ads", 20.0, 10, 100, 2.0),
            PerformanceRecord::new(d(2021, 2, 1), "Email", 30.0, 15, 100, 3.0),
            PerformanceRecord::new(d(2021, 3, 10), "YouTube", 40.0, 20, 100, 4.0),
        ];
        QueryContext::new(RecordStore::new(records))
    }

    #[test]
    fn test_unknown_view_name() {
        let ctx = context();
        let err = ctx.get_view("vw_nope", DateRange::all()).unwrap_err();
        assert!(matches!(err, Error::InvalidViewName(ref n) if n == "vw_nope"));
    }

    #[test]
    fn test_external_names_are_aliases() {
        assert_eq!("vw_marketing_kpi".parse::<ViewName>().unwrap(), ViewName::DailyKpi);
        assert_eq!("vw_campaign_monthly".parse::<ViewName>().unwrap(), ViewName::ChannelMonthly);
        assert_eq!("vw_campaign_roi_map".parse::<ViewName>().unwrap(), ViewName::ChannelRoi);
        for name in ViewName::ALL {
            assert_eq!(name.as_str().parse::<ViewName>().unwrap(), name);
            assert_eq!(name.table_name().parse::<ViewName>().unwrap(), name);
        }
    }

    #[test]
    fn test_range_filter_inclusive() {
        let ctx = context();
        let rows = ctx.daily_kpi(DateRange::new(d(2021, 1, 15), d(2021, 2, 1)));
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.dt).collect();
        assert_eq!(dates, vec![d(2021, 1, 15), d(2021, 2, 1)]);
    }

    #[test]
    fn test_monthly_filters_on_month_id() {
        let ctx = context();
        // month_id is the first of the month, so a mid-January start drops January
        let rows = ctx.channel_monthly(DateRange::new(d(2021, 1, 15), d(2021, 3, 31)));
        let months: Vec<NaiveDate> = rows.iter().map(|r| r.month_id).collect();
        assert_eq!(months, vec![d(2021, 2, 1), d(2021, 3, 1)]);
    }

    #[test]
    fn test_inverted_range_empty_for_every_view() {
        let ctx = context();
        let inverted = DateRange::new(d(2021, 3, 1), d(2021, 1, 1));
        for name in ViewName::ALL {
            let rows = ctx.get_view(name.as_str(), inverted).unwrap();
            assert!(rows.is_empty(), "{name} should be empty");
            assert_eq!(rows.name(), name);
        }
    }

    #[test]
    fn test_channel_roi_ignores_range() {
        let ctx = context();
        let narrow = DateRange::new(d(2021, 1, 1), d(2021, 1, 1));
        let rows = ctx.get_view("channel_roi", narrow).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_full_observed_range_roundtrip() {
        let ctx = context();
        let observed = ctx.observed_range().unwrap();
        let filtered = ctx.get_view("daily_kpi", observed).unwrap();
        assert_eq!(filtered, ViewRows::DailyKpi(ctx.all_daily_kpi().to_vec()));
    }

    #[test]
    fn test_empty_store_yields_empty_views() {
        let ctx = QueryContext::new(RecordStore::default());
        for name in ViewName::ALL {
            assert!(ctx.view(name, DateRange::all()).is_empty());
        }
        assert_eq!(ctx.observed_range(), None);
        assert_eq!(ctx.default_range(), None);
        assert!(ctx.quadrants().is_empty());
        assert!(ctx.stability_ranking(DateRange::all()).is_empty());
    }

    #[test]
    fn test_default_range_is_two_trailing_months() {
        let ctx = context();
        assert_eq!(
            ctx.default_range(),
            Some(DateRange::new(d(2021, 1, 10), d(2021, 3, 10)))
        );
    }

    #[test]
    fn test_resolve_period_anchors_on_last_date() {
        let ctx = context();
        assert_eq!(
            ctx.resolve_period(&Period::TrailingDays(10)),
            DateRange::new(d(2021, 3, 1), d(2021, 3, 10))
        );
    }

    #[test]
    fn test_kpi_delta() {
        let ctx = context();
        // spend by day: 10, 20, 30, 40 -> (35 - 15) / 15
        let delta = ctx.kpi_delta(KpiMetric::Spend, DateRange::all());
        assert!((delta - 20.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_kpi_delta_keeps_undefined_days_in_split() {
        // Daily CTR: [-, 0.1, 0.2, 0.3]; halves are [-, 0.1] and [0.2, 0.3]
        let ctx = QueryContext::new(RecordStore::new(vec![
            PerformanceRecord::new(d(2021, 1, 1), "Email", 10.0, 0, 0, 1.0),
            PerformanceRecord::new(d(2021, 1, 2), "Email", 10.0, 10, 100, 1.0),
            PerformanceRecord::new(d(2021, 1, 3), "Email", 10.0, 20, 100, 1.0),
            PerformanceRecord::new(d(2021, 1, 4), "Email", 10.0, 30, 100, 1.0),
        ]));
        let series = ctx.kpi_series(KpiMetric::Ctr, DateRange::all());
        assert_eq!(series.len(), 4);
        assert_eq!(series[0], None);

        let delta = ctx.kpi_delta(KpiMetric::Ctr, DateRange::all());
        assert!((delta - 1.5).abs() < 1e-12, "delta = {delta}");
    }

    #[test]
    fn test_memoized_views_are_stable() {
        let ctx = context();
        let first = ctx.all_daily_kpi().as_ptr();
        let _ = ctx.get_view("daily_kpi", DateRange::all()).unwrap();
        assert_eq!(ctx.all_daily_kpi().as_ptr(), first);
    }

    #[test]
    fn test_context_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QueryContext>();
    }
}
