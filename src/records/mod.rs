//! The canonical flat performance dataset: one row per campaign-day.

mod report;

pub use report::{LoadReport, LoadStatus};

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

/// One campaign-day of performance data.
///
/// `ctr`, `cpc` and `cpm` are derived from `clicks`, `impressions` and `spend`
/// by [`PerformanceRecord::validated`]; they are `None` whenever their
/// denominator is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub campaign_id: i64,
    pub company: String,
    pub campaign_type: String,
    pub target_audience: String,
    pub duration: String,
    pub channel: String,
    pub conversion_rate: f64,
    pub spend: f64,
    pub roi: f64,
    pub location: String,
    pub language: String,
    pub clicks: u64,
    pub impressions: u64,
    pub engagement_score: i64,
    pub customer_segment: String,
    pub engagement_rate: f64,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub cpm: Option<f64>,
}

impl PerformanceRecord {
    /// Minimal record with the fields the engine aggregates; descriptive
    /// columns are left empty.
    pub fn new(
        date: NaiveDate,
        channel: &str,
        spend: f64,
        clicks: u64,
        impressions: u64,
        roi: f64,
    ) -> Self {
        Self {
            date,
            channel: channel.to_string(),
            spend,
            clicks,
            impressions,
            roi,
            ..Self::default()
        }
        .with_ratios()
    }

    /// Check the row invariants and fill in the derived ratios.
    pub fn validated(self) -> std::result::Result<Self, String> {
        if self.channel.trim().is_empty() {
            return Err("channel is empty".into());
        }
        if !self.spend.is_finite() || self.spend < 0.0 {
            return Err(format!("spend must be a non-negative number, got {}", self.spend));
        }
        for (name, value) in [
            ("roi", self.roi),
            ("conversion_rate", self.conversion_rate),
            ("engagement_rate", self.engagement_rate),
        ] {
            if !value.is_finite() {
                return Err(format!("{name} is not a finite number"));
            }
        }
        if self.clicks > self.impressions {
            return Err(format!(
                "clicks ({}) exceed impressions ({})",
                self.clicks, self.impressions
            ));
        }
        Ok(self.with_ratios())
    }

    fn with_ratios(mut self) -> Self {
        let clicks = self.clicks as f64;
        let impressions = self.impressions as f64;
        self.ctr = ratio(clicks, impressions);
        self.cpc = ratio(self.spend, clicks);
        self.cpm = ratio(self.spend, impressions).map(|v| v * 1000.0);
        self
    }
}

/// `num / den`, or `None` when the denominator is zero.
pub(crate) fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

/// Immutable, shareable set of validated records.
///
/// Records are kept in ascending date order (stable with respect to load
/// order). A store is never mutated after construction; reloading means
/// building a new one.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Arc<[PerformanceRecord]>,
}

impl RecordStore {
    pub fn new(mut records: Vec<PerformanceRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        Self {
            records: records.into(),
        }
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First and last observed dates, if any records exist.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.first()?.date;
        let last = self.records.last()?.date;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_ratios_derived() {
        let r = PerformanceRecord::new(d(2021, 1, 1), "Email", 50.0, 10, 1000, 2.0);
        assert_eq!(r.ctr, Some(0.01));
        assert_eq!(r.cpc, Some(5.0));
        assert_eq!(r.cpm, Some(50.0));
    }

    #[test]
    fn test_ratios_none_on_zero_denominator() {
        let r = PerformanceRecord::new(d(2021, 1, 1), "Email", 50.0, 0, 0, 2.0);
        assert_eq!(r.ctr, None);
        assert_eq!(r.cpc, None);
        assert_eq!(r.cpm, None);

        let r = PerformanceRecord::new(d(2021, 1, 1), "Email", 50.0, 0, 100, 2.0);
        assert_eq!(r.ctr, Some(0.0));
        assert_eq!(r.cpc, None);
        assert_eq!(r.cpm, Some(500.0));
    }

    #[test]
    fn test_validated_rejects_clicks_over_impressions() {
        let r = PerformanceRecord {
            channel: "Email".into(),
            clicks: 11,
            impressions: 10,
            ..Default::default()
        };
        let err = r.validated().unwrap_err();
        assert!(err.contains("exceed impressions"), "{err}");
    }

    #[test]
    fn test_validated_rejects_negative_or_nan_spend() {
        let base = PerformanceRecord {
            channel: "Email".into(),
            ..Default::default()
        };
        assert!(PerformanceRecord { spend: -1.0, ..base.clone() }.validated().is_err());
        assert!(PerformanceRecord { spend: f64::NAN, ..base.clone() }.validated().is_err());
        assert!(PerformanceRecord { roi: f64::INFINITY, ..base.clone() }.validated().is_err());
        assert!(PerformanceRecord { channel: " ".into(), ..base.clone() }.validated().is_err());
        assert!(base.validated().is_ok());
    }

    #[test]
    fn test_store_sorted_and_bounds() {
        let store = RecordStore::new(vec![
            PerformanceRecord::new(d(2021, 3, 2), "Email", 1.0, 1, 10, 1.0),
            PerformanceRecord::new(d(2021, 1, 5), "Google Ads", 1.0, 1, 10, 1.0),
            PerformanceRecord::new(d(2021, 2, 1), "Email", 1.0, 1, 10, 1.0),
        ]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.date_bounds(), Some((d(2021, 1, 5), d(2021, 3, 2))));
        assert_eq!(store.records()[1].channel, "Email");
    }

    #[test]
    fn test_empty_store() {
        let store = RecordStore::default();
        assert!(store.is_empty());
        assert_eq!(store.date_bounds(), None);
    }

    #[test]
    fn test_store_clones_share_records() {
        let store = RecordStore::new(vec![PerformanceRecord::new(
            d(2021, 1, 1),
            "Email",
            1.0,
            1,
            10,
            1.0,
        )]);
        let other = store.clone();
        assert!(std::ptr::eq(store.records(), other.records()));
    }
}
