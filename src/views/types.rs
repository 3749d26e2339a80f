use chrono::NaiveDate;
use serde::Serialize;

/// One row of the daily KPI series (`vw_marketing_kpi`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyKpi {
    pub dt: NaiveDate,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    /// Mean of the per-row click-through rates defined on this date.
    pub ctr: Option<f64>,
    pub cpc_avg: Option<f64>,
    pub cpm_avg: Option<f64>,
    pub roi_avg: f64,
    pub n_rows: u64,
}

/// One channel × month rollup row (`vw_campaign_monthly`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMonthly {
    /// First day of the month.
    pub month_id: NaiveDate,
    pub channel: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: Option<f64>,
    pub cpc_avg: Option<f64>,
    pub cpm_avg: Option<f64>,
    pub roi_avg: f64,
    pub conversion_rate_avg: f64,
    pub n_rows: u64,
}

/// All-time ROI summary for one channel (`vw_campaign_roi_map`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRoi {
    pub channel: String,
    pub spend: f64,
    pub roi_avg: f64,
    pub n_rows: u64,
}

/// A numeric column of the daily KPI series, used for trend diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiMetric {
    Spend,
    Impressions,
    Clicks,
    Ctr,
    Cpc,
    Cpm,
    Roi,
}

impl KpiMetric {
    pub const ALL: [KpiMetric; 7] = [
        KpiMetric::Spend,
        KpiMetric::Impressions,
        KpiMetric::Clicks,
        KpiMetric::Ctr,
        KpiMetric::Cpc,
        KpiMetric::Cpm,
        KpiMetric::Roi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KpiMetric::Spend => "spend",
            KpiMetric::Impressions => "impressions",
            KpiMetric::Clicks => "clicks",
            KpiMetric::Ctr => "ctr",
            KpiMetric::Cpc => "cpc",
            KpiMetric::Cpm => "cpm",
            KpiMetric::Roi => "roi",
        }
    }
}

impl std::str::FromStr for KpiMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spend" => Ok(KpiMetric::Spend),
            "impressions" => Ok(KpiMetric::Impressions),
            "clicks" => Ok(KpiMetric::Clicks),
            "ctr" => Ok(KpiMetric::Ctr),
            "cpc" | "cpc_avg" => Ok(KpiMetric::Cpc),
            "cpm" | "cpm_avg" => Ok(KpiMetric::Cpm),
            "roi" | "roi_avg" => Ok(KpiMetric::Roi),
            other => Err(format!(
                "unknown metric '{other}' (expected spend, impressions, clicks, ctr, cpc, cpm or roi)"
            )),
        }
    }
}

impl DailyKpi {
    /// Value of `metric` on this date; `None` when the rate is undefined.
    pub fn metric(&self, metric: KpiMetric) -> Option<f64> {
        match metric {
            KpiMetric::Spend => Some(self.spend),
            KpiMetric::Impressions => Some(self.impressions as f64),
            KpiMetric::Clicks => Some(self.clicks as f64),
            KpiMetric::Ctr => self.ctr,
            KpiMetric::Cpc => self.cpc_avg,
            KpiMetric::Cpm => self.cpm_avg,
            KpiMetric::Roi => Some(self.roi_avg),
        }
    }
}
