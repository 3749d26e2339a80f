use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// ROI/spend quadrant of a channel relative to the channel medians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Quadrant {
    #[serde(rename = "High Scale • High ROI")]
    HighScaleHighRoi,
    #[serde(rename = "High Scale • Low ROI")]
    HighScaleLowRoi,
    #[serde(rename = "Low Scale • High ROI")]
    LowScaleHighRoi,
    #[serde(rename = "Low Scale • Low ROI")]
    LowScaleLowRoi,
}

impl Quadrant {
    pub fn label(self) -> &'static str {
        match self {
            Quadrant::HighScaleHighRoi => "High Scale • High ROI",
            Quadrant::HighScaleLowRoi => "High Scale • Low ROI",
            Quadrant::LowScaleHighRoi => "Low Scale • High ROI",
            Quadrant::LowScaleLowRoi => "Low Scale • Low ROI",
        }
    }
}

impl std::fmt::Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A channel placed on the ROI vs spend plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadrantPoint {
    pub channel: String,
    pub spend: f64,
    pub roi_avg: f64,
    pub n_rows: u64,
    pub quadrant: Quadrant,
}

/// Result of quadrant classification.
///
/// The medians are `None` only when there were no channels to classify.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuadrantMap {
    pub median_spend: Option<f64>,
    pub median_roi: Option<f64>,
    /// Points in input order.
    pub points: Vec<QuadrantPoint>,
}

impl QuadrantMap {
    /// Channel to quadrant label mapping.
    pub fn labels(&self) -> BTreeMap<&str, Quadrant> {
        self.points
            .iter()
            .map(|p| (p.channel.as_str(), p.quadrant))
            .collect()
    }

    pub fn get(&self, channel: &str) -> Option<Quadrant> {
        self.points
            .iter()
            .find(|p| p.channel == channel)
            .map(|p| p.quadrant)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One row of the external per-channel monthly stability feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilitySummary {
    pub month_id: NaiveDate,
    pub channel: String,
    pub spend: f64,
    pub roi_mean: f64,
    /// Coefficient of variation of ROI within the channel-month.
    pub roi_cv: f64,
}

/// A channel's stability over the selected range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStability {
    pub channel: String,
    pub total_spend: f64,
    pub roi_mean: f64,
    pub roi_cv: f64,
    /// Distinct months contributing.
    pub months: u64,
}
