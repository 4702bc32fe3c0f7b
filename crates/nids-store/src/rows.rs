//! Row types returned by the store's read accessors.

use nids_common::{MetricVector, Severity};
use serde::{Deserialize, Serialize};

/// One `(src_ip, metric_name)` baseline row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostBaselineRow {
    pub src_ip: String,
    pub metric_name: String,
    pub mean: f64,
    pub std: f64,
    pub sample_count: u64,
    pub min: f64,
    pub max: f64,
    pub last_updated: f64,
    /// True while the host is still within its first LEARNING_WINDOW
    /// samples for this metric.
    pub is_learning: bool,
}

/// One stored statistical alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatAlertRow {
    pub timestamp: f64,
    pub src_ip: String,
    pub metric_name: String,
    pub current: f64,
    pub mean: f64,
    pub std: f64,
    pub z_score: f64,
    pub severity: Severity,
    pub description: String,
}

/// One stored ML alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlAlertRow {
    pub timestamp: f64,
    pub src_ip: String,
    pub ml_score: f64,
    pub stat_score: f64,
    pub combined_score: f64,
    pub severity: Severity,
    pub description: String,
    pub top_features: Vec<FeatureContribution>,
}

/// A single feature's contribution to a z-score / anomaly explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub current: f64,
    pub mean: f64,
    pub std: f64,
    pub z_score: f64,
}

/// One hybrid verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridVerdictRow {
    pub timestamp: f64,
    pub src_ip: String,
    pub sig_score: f64,
    pub stat_score: f64,
    pub ml_score: f64,
    pub combined_score: f64,
    pub severity: Severity,
    pub confidence: Confidence,
    pub details: VerdictDetails,
}

/// Confidence tier derived from the count of triggered layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::None => "none",
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Per-layer explanatory detail bundled into a verdict's details blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictDetails {
    pub signature_msgs: Vec<String>,
    pub stat_anomalies: Vec<FeatureContribution>,
    pub ml_top_features: Vec<FeatureContribution>,
}

/// One row of `(src_ip, window_start)` training data.
#[derive(Debug, Clone)]
pub struct TrainingSampleRow {
    pub src_ip: String,
    pub window_start: i64,
    pub metrics: MetricVector,
    pub is_normal: bool,
}
