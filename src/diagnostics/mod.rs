//! Derived diagnostics over the materialized views: period-over-period delta,
//! ROI/spend quadrants and channel stability ranking. All pure functions.

pub mod types;

pub use types::*;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::query::range::DateRange;
use crate::stats::{self, Mean};
use crate::views::ChannelRoi;

/// Relative change between the mean of the trailing half of `series` and the
/// mean of its leading half.
///
/// `half = max(n / 2, 1)`; the leading half is the first `half` values and the
/// trailing half the last `half`. For odd `n` the middle value falls in
/// neither half. Returns 0.0 for fewer than two values or when the leading
/// mean is zero.
pub fn period_delta(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let half = (n / 2).max(1);
    let previous = stats::mean(&series[..half]).unwrap_or(0.0);
    let current = stats::mean(&series[n - half..]).unwrap_or(0.0);
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous
}

/// [`period_delta`] over a series with gaps.
///
/// The halves are cut by position over every entry, defined or not; each
/// half's mean covers only its defined values. Returns 0.0 when either half
/// has no defined value.
pub fn period_delta_sparse(series: &[Option<f64>]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let half = (n / 2).max(1);
    let half_mean = |values: &[Option<f64>]| {
        let mut m = Mean::default();
        values.iter().for_each(|v| m.push_opt(*v));
        m.value()
    };
    let previous = half_mean(&series[..half]);
    let current = half_mean(&series[n - half..]);
    let (Some(previous), Some(current)) = (previous, current) else {
        return 0.0;
    };
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous
}

/// Place every channel in a quadrant by comparing its spend and average ROI
/// against the medians across all channels. Values equal to a median count
/// as "high".
pub fn classify_quadrant(rows: &[ChannelRoi]) -> QuadrantMap {
    let spends: Vec<f64> = rows.iter().map(|r| r.spend).collect();
    let rois: Vec<f64> = rows.iter().map(|r| r.roi_avg).collect();
    let (Some(median_spend), Some(median_roi)) = (stats::median(&spends), stats::median(&rois))
    else {
        return QuadrantMap::default();
    };

    let points = rows
        .iter()
        .map(|r| QuadrantPoint {
            channel: r.channel.clone(),
            spend: r.spend,
            roi_avg: r.roi_avg,
            n_rows: r.n_rows,
            quadrant: quadrant_for(r.spend, r.roi_avg, median_spend, median_roi),
        })
        .collect();

    QuadrantMap {
        median_spend: Some(median_spend),
        median_roi: Some(median_roi),
        points,
    }
}

fn quadrant_for(spend: f64, roi: f64, median_spend: f64, median_roi: f64) -> Quadrant {
    let high_scale = spend >= median_spend;
    let high_roi = roi >= median_roi;
    match (high_scale, high_roi) {
        (true, true) => Quadrant::HighScaleHighRoi,
        (true, false) => Quadrant::HighScaleLowRoi,
        (false, true) => Quadrant::LowScaleHighRoi,
        (false, false) => Quadrant::LowScaleLowRoi,
    }
}

/// Rank channels by ROI stability over `range` (inclusive on `month_id`).
///
/// Lowest mean `roi_cv` first; equally stable channels are ordered by higher
/// mean ROI, then by name.
pub fn rank_stability(rows: &[StabilitySummary], range: DateRange) -> Vec<ChannelStability> {
    #[derive(Default)]
    struct Acc {
        spend: f64,
        roi_mean: Mean,
        roi_cv: Mean,
        months: BTreeSet<NaiveDate>,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for row in rows.iter().filter(|r| range.contains(r.month_id)) {
        let acc = groups.entry(row.channel.as_str()).or_default();
        acc.spend += row.spend;
        acc.roi_mean.push(row.roi_mean);
        acc.roi_cv.push(row.roi_cv);
        acc.months.insert(row.month_id);
    }

    let mut ranked: Vec<ChannelStability> = groups
        .into_iter()
        .map(|(channel, acc)| ChannelStability {
            channel: channel.to_string(),
            total_spend: acc.spend,
            roi_mean: acc.roi_mean.value().unwrap_or(0.0),
            roi_cv: acc.roi_cv.value().unwrap_or(0.0),
            months: acc.months.len() as u64,
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.roi_cv
            .total_cmp(&b.roi_cv)
            .then_with(|| b.roi_mean.total_cmp(&a.roi_mean))
            .then_with(|| a.channel.cmp(&b.channel))
    });
    ranked
}
