//! View builder: derives the three analytical aggregates from the record set.
//!
//! Volume fields (spend, clicks, impressions) are summed. Rate fields (ctr,
//! cpc, cpm, roi, conversion rate) are the arithmetic mean of the per-row
//! values, not a ratio recomputed from the summed numerator and denominator.
//! Downstream numbers depend on this.

pub mod types;

pub use types::*;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::date_util::month_start;
use crate::records::PerformanceRecord;
use crate::stats::Mean;

/// Build the daily KPI series, ascending by date.
pub fn build_daily_kpi(records: &[PerformanceRecord]) -> Vec<DailyKpi> {
    let mut groups: BTreeMap<NaiveDate, Rollup> = BTreeMap::new();
    for r in records {
        groups.entry(r.date).or_default().add(r);
    }

    groups
        .into_iter()
        .map(|(dt, g)| DailyKpi {
            dt,
            spend: g.spend,
            impressions: g.impressions,
            clicks: g.clicks,
            ctr: g.ctr.value(),
            cpc_avg: g.cpc.value(),
            cpm_avg: g.cpm.value(),
            roi_avg: g.roi.value().unwrap_or(0.0),
            n_rows: g.n_rows,
        })
        .collect()
}

/// Build the channel × month rollup, ascending by (month, channel).
pub fn build_channel_monthly(records: &[PerformanceRecord]) -> Vec<ChannelMonthly> {
    let mut groups: BTreeMap<(NaiveDate, &str), Rollup> = BTreeMap::new();
    for r in records {
        groups
            .entry((month_start(r.date), r.channel.as_str()))
            .or_default()
            .add(r);
    }

    groups
        .into_iter()
        .map(|((month_id, channel), g)| ChannelMonthly {
            month_id,
            channel: channel.to_string(),
            spend: g.spend,
            impressions: g.impressions,
            clicks: g.clicks,
            ctr: g.ctr.value(),
            cpc_avg: g.cpc.value(),
            cpm_avg: g.cpm.value(),
            roi_avg: g.roi.value().unwrap_or(0.0),
            conversion_rate_avg: g.conversion_rate.value().unwrap_or(0.0),
            n_rows: g.n_rows,
        })
        .collect()
}

/// Build the all-time channel ROI map, descending by `roi_avg` with ties
/// broken by channel name.
pub fn build_channel_roi(records: &[PerformanceRecord]) -> Vec<ChannelRoi> {
    let mut groups: BTreeMap<&str, Rollup> = BTreeMap::new();
    for r in records {
        groups.entry(r.channel.as_str()).or_default().add(r);
    }

    let mut rows: Vec<ChannelRoi> = groups
        .into_iter()
        .map(|(channel, g)| ChannelRoi {
            channel: channel.to_string(),
            spend: g.spend,
            roi_avg: g.roi.value().unwrap_or(0.0),
            n_rows: g.n_rows,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.roi_avg
            .total_cmp(&a.roi_avg)
            .then_with(|| a.channel.cmp(&b.channel))
    });
    rows
}

/// Per-group accumulator shared by all three views.
#[derive(Debug, Default)]
struct Rollup {
    spend: f64,
    impressions: u64,
    clicks: u64,
    n_rows: u64,
    ctr: Mean,
    cpc: Mean,
    cpm: Mean,
    roi: Mean,
    conversion_rate: Mean,
}

impl Rollup {
    fn add(&mut self, r: &PerformanceRecord) {
        self.spend += r.spend;
        self.impressions += r.impressions;
        self.clicks += r.clicks;
        self.n_rows += 1;
        self.ctr.push_opt(r.ctr);
        self.cpc.push_opt(r.cpc);
        self.cpm.push_opt(r.cpm);
        self.roi.push(r.roi);
        self.conversion_rate.push(r.conversion_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(
        date: NaiveDate,
        channel: &str,
        spend: f64,
        clicks: u64,
        impressions: u64,
        roi: f64,
    ) -> PerformanceRecord {
        PerformanceRecord::new(date, channel, spend, clicks, impressions, roi)
    }

    fn sample() -> Vec<PerformanceRecord> {
        vec![
            rec(d(2021, 1, 2), "Email", 100.0, 10, 100, 2.0),
            rec(d(2021, 1, 1), "Google Ads", 300.0, 1, 1000, 4.0),
            rec(d(2021, 1, 2), "Google Ads", 200.0, 30, 1000, 6.0),
            rec(d(2021, 2, 3), "Email", 50.0, 0, 0, 1.0),
            rec(d(2021, 2, 9), "YouTube", 75.0, 5, 500, 4.0),
        ]
    }

    #[test]
    fn test_empty_inputs() {
        assert!(build_daily_kpi(&[]).is_empty());
        assert!(build_channel_monthly(&[]).is_empty());
        assert!(build_channel_roi(&[]).is_empty());
    }

    #[test]
    fn test_daily_kpi_ordering_and_sums() {
        let kpi = build_daily_kpi(&sample());
        let dates: Vec<NaiveDate> = kpi.iter().map(|k| k.dt).collect();
        assert_eq!(dates, vec![d(2021, 1, 1), d(2021, 1, 2), d(2021, 2, 3), d(2021, 2, 9)]);

        let jan2 = &kpi[1];
        assert_eq!(jan2.spend, 300.0);
        assert_eq!(jan2.clicks, 40);
        assert_eq!(jan2.impressions, 1100);
        assert_eq!(jan2.roi_avg, 4.0);
        assert_eq!(jan2.n_rows, 2);
    }

    #[test]
    fn test_daily_kpi_mean_of_ratios_not_ratio_of_sums() {
        let kpi = build_daily_kpi(&sample());
        let jan2 = &kpi[1];
        // Per-row ctr: 10/100 = 0.1 and 30/1000 = 0.03 -> mean 0.065.
        // Ratio of sums would be 40/1100.
        let ctr = jan2.ctr.unwrap();
        assert!((ctr - 0.065).abs() < 1e-12, "ctr = {ctr}");
        // cpc: 100/10 = 10, 200/30 = 6.666.. -> mean 8.333..
        let cpc = jan2.cpc_avg.unwrap();
        assert!((cpc - (10.0 + 200.0 / 30.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_daily_kpi_undefined_ratios_stay_none() {
        let kpi = build_daily_kpi(&sample());
        let feb3 = &kpi[2];
        assert_eq!(feb3.ctr, None);
        assert_eq!(feb3.cpc_avg, None);
        assert_eq!(feb3.cpm_avg, None);
        assert_eq!(feb3.roi_avg, 1.0);
    }

    #[test]
    fn test_spend_conserved() {
        let records = sample();
        let total: f64 = records.iter().map(|r| r.spend).sum();
        let daily: f64 = build_daily_kpi(&records).iter().map(|k| k.spend).sum();
        let monthly: f64 = build_channel_monthly(&records).iter().map(|m| m.spend).sum();
        let by_channel: f64 = build_channel_roi(&records).iter().map(|c| c.spend).sum();
        assert!((total - daily).abs() < 1e-9);
        assert!((total - monthly).abs() < 1e-9);
        assert!((total - by_channel).abs() < 1e-9);
    }

    #[test]
    fn test_channel_monthly_grouping_and_order() {
        let monthly = build_channel_monthly(&sample());
        let keys: Vec<(NaiveDate, &str)> = monthly
            .iter()
            .map(|m| (m.month_id, m.channel.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (d(2021, 1, 1), "Email"),
                (d(2021, 1, 1), "Google Ads"),
                (d(2021, 2, 1), "Email"),
                (d(2021, 2, 1), "YouTube"),
            ]
        );
        let jan_google = &monthly[1];
        assert_eq!(jan_google.spend, 500.0);
        assert_eq!(jan_google.roi_avg, 5.0);
        assert_eq!(jan_google.n_rows, 2);
    }

    #[test]
    fn test_channel_roi_one_row_per_channel() {
        let records = sample();
        let roi = build_channel_roi(&records);
        assert_eq!(roi.len(), 3);
        for row in &roi {
            let count = records.iter().filter(|r| r.channel == row.channel).count() as u64;
            assert_eq!(row.n_rows, count, "n_rows for {}", row.channel);
        }
    }

    #[test]
    fn test_channel_roi_sorted_desc_with_name_tiebreak() {
        let roi = build_channel_roi(&sample());
        let order: Vec<(&str, f64)> = roi.iter().map(|r| (r.channel.as_str(), r.roi_avg)).collect();
        // Google Ads 5.0, then YouTube 4.0 (single row), then Email 1.5
        assert_eq!(order, vec![("Google Ads", 5.0), ("YouTube", 4.0), ("Email", 1.5)]);

        let tied = build_channel_roi(&[
            rec(d(2021, 1, 1), "b", 1.0, 0, 0, 2.0),
            rec(d(2021, 1, 1), "a", 1.0, 0, 0, 2.0),
        ]);
        assert_eq!(tied[0].channel, "a");
        assert_eq!(tied[1].channel, "b");
    }
}
