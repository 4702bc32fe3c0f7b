//! ML anomaly detector (C6).
//!
//! Trains an Isolation Forest over per-window metric vectors and applies
//! it against each host's current window, combining its score with the
//! baseline-derived stat score from `nids-stat` into an MLAlert.

#![warn(missing_docs)]

pub mod detector;
pub mod forest;
pub mod standardize;

pub use detector::{MlDetector, TrainingOutcome, ALERT_THRESHOLD, ALPHA, MIN_TRAIN, N_ESTIMATORS};
pub use forest::IsolationForest;
pub use standardize::Standardizer;
