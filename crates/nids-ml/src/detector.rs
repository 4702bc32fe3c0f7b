//! ML anomaly detector (C6): train an Isolation Forest over collected
//! window metric vectors and apply it per host each cycle.

use crate::forest::IsolationForest;
use crate::standardize::Standardizer;
use nids_common::{now_secs, NidsResult, Severity};
use nids_stat::math::sigmoid;
use nids_stat::{host_stat_score, top_feature_contributions};
use nids_store::{MlAlertRow, Store};

/// Minimum normal training samples required before a model can be fit.
pub const MIN_TRAIN: u64 = 50;
/// Trees per forest.
pub const N_ESTIMATORS: usize = 100;
/// Deterministic seed for reproducible training.
pub const TRAINING_SEED: u64 = 0x4e49_4453; // "NIDS"
/// Blend factor between stat_score and ml_score in the combined score.
pub const ALPHA: f64 = 0.4;
/// Combined-score floor at which an MLAlert is emitted.
pub const ALERT_THRESHOLD: f64 = 0.5;

/// Result of a training attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingOutcome {
    /// Fewer than [`MIN_TRAIN`] normal samples were available.
    InsufficientData { samples: u64 },
    /// A model was fit and persisted as the active artifact.
    Trained { samples: u64 },
}

/// Owns the currently active model, if any, and applies it to hosts.
pub struct MlDetector {
    model: Option<(Standardizer, IsolationForest)>,
}

impl MlDetector {
    pub fn new() -> Self {
        Self { model: None }
    }

    /// Whether a model is currently loaded.
    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Collect any windows not yet copied into the training table, then
    /// fit a fresh standardizer + Isolation Forest if enough normal
    /// samples are available. `force` re-trains even if a model is
    /// already active.
    pub fn train(&mut self, store: &Store, force: bool) -> NidsResult<TrainingOutcome> {
        store.collect_untrained_windows()?;
        let samples = store.training_sample_count()?;
        if samples < MIN_TRAIN {
            tracing::info!(samples, min_train = MIN_TRAIN, "training skipped: insufficient data");
            return Ok(TrainingOutcome::InsufficientData { samples });
        }
        if self.model.is_some() && !force {
            tracing::debug!(samples, "training skipped: model already active and force not set");
            return Ok(TrainingOutcome::Trained { samples });
        }

        let vectors = store.all_training_samples()?;
        let standardizer = Standardizer::fit(&vectors);
        let standardized: Vec<[f64; 5]> = vectors.iter().map(|v| standardizer.transform(v)).collect();
        let forest = IsolationForest::fit(&standardized, N_ESTIMATORS, TRAINING_SEED);
        self.model = Some((standardizer, forest));

        store.record_model_training(
            now_secs(),
            samples,
            5,
            0.05,
            if force { "forced retrain" } else { "scheduled auto-train" },
        )?;
        tracing::info!(samples, n_estimators = N_ESTIMATORS, force, "isolation forest trained");
        Ok(TrainingOutcome::Trained { samples })
    }

    /// Signed-to-unit-interval ML score for the host's current window.
    /// 0 when no model is trained yet or the host has no window. Exposed
    /// so the hybrid scorer (C7) can recompute it against the same live
    /// model without owning or re-deriving it.
    pub fn ml_score(&self, store: &Store, src_ip: &str) -> NidsResult<f64> {
        let Some((standardizer, forest)) = &self.model else {
            return Ok(0.0);
        };
        let Some((_, metrics)) = store.latest_window_metrics(src_ip)? else {
            return Ok(0.0);
        };
        let standardized = standardizer.transform(&metrics);
        let raw_score = forest.decision(&standardized);
        Ok(sigmoid(-5.0 * raw_score))
    }

    /// Apply the model (if trained) plus the baseline-derived stat score
    /// to a single host, persisting an MLAlert when the combined score
    /// crosses [`ALERT_THRESHOLD`]. Returns `true` iff an alert fired.
    pub fn apply_to_host(&self, store: &Store, src_ip: &str) -> NidsResult<bool> {
        let ml_score = self.ml_score(store, src_ip)?;
        let (_, stat_score) = host_stat_score(store, src_ip)?;

        let combined = if self.is_trained() {
            ALPHA * stat_score + (1.0 - ALPHA) * ml_score
        } else {
            stat_score
        };

        if combined < ALERT_THRESHOLD {
            return Ok(false);
        }

        let top_features = top_feature_contributions(store, src_ip)?;
        let severity = severity_for_combined(combined);
        let description = format!(
            "combined={combined:.3} (ml={ml_score:.3}, stat={stat_score:.3}, model_trained={})",
            self.is_trained()
        );
        tracing::info!(src_ip, combined, ?severity, "ml anomaly alert");

        store.insert_ml_alert(&MlAlertRow {
            timestamp: now_secs(),
            src_ip: src_ip.to_string(),
            ml_score,
            stat_score,
            combined_score: combined,
            severity,
            description,
            top_features,
        })?;
        Ok(true)
    }
}

impl Default for MlDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn severity_for_combined(combined: f64) -> Severity {
    if combined >= 0.9 {
        Severity::Critical
    } else if combined >= 0.75 {
        Severity::High
    } else if combined >= 0.6 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::MetricVector;

    fn seed_normal_traffic(store: &Store, n: u64) {
        for i in 0..n {
            store
                .write_window(
                    "1.1.1.1",
                    i as f64 * 60.0,
                    i as f64 * 60.0 + 60.0,
                    MetricVector {
                        connections_count: 10.0 + (i % 3) as f64,
                        unique_ports: 2.0,
                        unique_dst_ips: 1.0,
                        total_bytes: 1000.0,
                        avg_packet_size: 100.0,
                    },
                )
                .unwrap();
        }
    }

    #[test]
    fn training_reports_insufficient_data_below_min_train() {
        let store = Store::open_in_memory().unwrap();
        seed_normal_traffic(&store, 5);
        let mut detector = MlDetector::new();
        let outcome = detector.train(&store, false).unwrap();
        assert_eq!(outcome, TrainingOutcome::InsufficientData { samples: 5 });
        assert!(!detector.is_trained());
    }

    #[test]
    fn training_succeeds_once_min_train_reached() {
        let store = Store::open_in_memory().unwrap();
        seed_normal_traffic(&store, MIN_TRAIN);
        let mut detector = MlDetector::new();
        let outcome = detector.train(&store, false).unwrap();
        assert_eq!(outcome, TrainingOutcome::Trained { samples: MIN_TRAIN });
        assert!(detector.is_trained());
    }

    #[test]
    fn untrained_detector_uses_stat_score_only() {
        let store = Store::open_in_memory().unwrap();
        seed_normal_traffic(&store, 1);
        let detector = MlDetector::new();
        let fired = detector.apply_to_host(&store, "1.1.1.1").unwrap();
        // No baseline yet either, so combined stays below threshold.
        assert!(!fired);
    }
}
