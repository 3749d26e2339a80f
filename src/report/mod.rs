//! The dashboard summary for one selected date range.

mod export;

pub use export::view_csv;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::{ChannelStability, QuadrantMap};
use crate::query::{DateRange, QueryContext};
use crate::stats;
use crate::views::{ChannelMonthly, DailyKpi, KpiMetric};

/// One headline KPI with its period-over-period delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiCard {
    pub label: &'static str,
    /// `None` when no day in range defines the value.
    pub value: Option<f64>,
    /// Fractional change, e.g. `0.12` for +12%.
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelShare {
    pub channel: String,
    pub spend: f64,
    /// Fraction of total spend in range; 0 when nothing was spent.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub range: DateRange,
    pub days: usize,
    pub cards: Vec<KpiCard>,
    /// Spend by channel over the range, largest first.
    pub spend_share: Vec<ChannelShare>,
    pub quadrants: QuadrantMap,
    pub stability: Vec<ChannelStability>,
    pub daily: Vec<DailyKpi>,
    /// Channel × month detail ordered by month, then channel.
    pub monthly: Vec<ChannelMonthly>,
}

impl DashboardReport {
    pub fn build(ctx: &QueryContext, range: DateRange) -> Self {
        let daily = ctx.daily_kpi(range);
        let monthly = ctx.channel_monthly(range);
        log::debug!(
            "building report for {range}: {} days, {} channel-months",
            daily.len(),
            monthly.len()
        );

        let cards = if daily.is_empty() {
            Vec::new()
        } else {
            kpi_cards(ctx, &daily, range)
        };

        Self {
            range,
            days: daily.len(),
            cards,
            spend_share: spend_share(&monthly),
            quadrants: ctx.quadrants(),
            stability: ctx.stability_ranking(range),
            daily,
            monthly,
        }
    }

    pub fn card(&self, label: &str) -> Option<&KpiCard> {
        self.cards.iter().find(|c| c.label == label)
    }
}

fn kpi_cards(ctx: &QueryContext, daily: &[DailyKpi], range: DateRange) -> Vec<KpiCard> {
    let card = |label, metric: KpiMetric| {
        let values: Vec<f64> = daily.iter().filter_map(|k| k.metric(metric)).collect();
        KpiCard {
            label,
            value: stats::mean(&values),
            delta: ctx.kpi_delta(metric, range),
        }
    };

    let spend: Vec<f64> = daily.iter().map(|k| k.spend).collect();
    vec![
        card("Avg ROI", KpiMetric::Roi),
        card("CTR", KpiMetric::Ctr),
        card("CPC (avg)", KpiMetric::Cpc),
        card("CPM (avg)", KpiMetric::Cpm),
        // Daily spend is shown without a trend
        KpiCard {
            label: "Avg Daily Spend",
            value: stats::mean(&spend),
            delta: 0.0,
        },
    ]
}

fn spend_share(monthly: &[ChannelMonthly]) -> Vec<ChannelShare> {
    let mut by_channel: BTreeMap<&str, f64> = BTreeMap::new();
    for m in monthly {
        *by_channel.entry(m.channel.as_str()).or_default() += m.spend;
    }
    let total: f64 = by_channel.values().sum();

    let mut shares: Vec<ChannelShare> = by_channel
        .into_iter()
        .map(|(channel, spend)| ChannelShare {
            channel: channel.to_string(),
            spend,
            share: if total > 0.0 { spend / total } else { 0.0 },
        })
        .collect();
    shares.sort_by(|a, b| b.spend.total_cmp(&a.spend).then_with(|| a.channel.cmp(&b.channel)));
    shares
}
