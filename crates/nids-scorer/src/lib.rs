//! Hybrid scorer (C7): fuses the signature, statistical and ML layer
//! outputs for a host into a single verdict with consensus boost.
//!
//! Each layer's score is recomputed from the store (and, for the ML
//! layer, the live in-process model) rather than threaded through as a
//! method call from C5/C6 -- the three detectors are peers, not owners
//! of one another.

#![warn(missing_docs)]

use nids_common::{now_secs, NidsResult, Severity};
use nids_ml::MlDetector;
use nids_stat::host_stat_score;
use nids_store::{Confidence, HybridVerdictRow, Store, VerdictDetails};

/// Lookback window for signature alerts feeding `sig_score`.
pub const SIG_WINDOW_SECS: f64 = 120.0;
/// Lookback window used to decide which hosts have a recent window at all.
pub const HOST_RECENCY_SECS: f64 = 300.0;
/// Floor below which a verdict is not persisted.
pub const VERDICT_FLOOR: f64 = 0.25;

const W_SIG: f64 = 0.40;
const W_STAT: f64 = 0.25;
const W_ML: f64 = 0.35;

fn severity_weight(s: Severity) -> f64 {
    match s {
        Severity::Critical => 1.0,
        Severity::High => 0.75,
        Severity::Medium => 0.5,
        Severity::Low => 0.25,
    }
}

fn sig_score(store: &Store, src_ip: &str, now: f64) -> NidsResult<f64> {
    let alerts = store.recent_signature_alerts(src_ip, now, SIG_WINDOW_SECS)?;
    if alerts.is_empty() {
        return Ok(0.0);
    }
    let max_weight = alerts
        .iter()
        .map(|(_, sev)| severity_weight(*sev))
        .fold(0.0, f64::max);
    let count_factor = (alerts.len() as f64 / 5.0).min(1.0);
    Ok((max_weight * (0.5 + 0.5 * count_factor)).min(1.0))
}

fn severity_for_combined(combined: f64) -> Severity {
    if combined >= 0.85 {
        Severity::Critical
    } else if combined >= 0.65 {
        Severity::High
    } else if combined >= 0.45 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Computes and persists hybrid verdicts.
pub struct HybridScorer;

impl HybridScorer {
    /// Score every host with a window observed in the last
    /// [`HOST_RECENCY_SECS`] seconds, persisting a verdict for each one
    /// whose combined score reaches [`VERDICT_FLOOR`]. Returns the number
    /// of verdicts persisted.
    pub fn run_cycle(store: &Store, ml: &MlDetector) -> NidsResult<usize> {
        let now = now_secs();
        let hosts = store.hosts_with_recent_window(now, HOST_RECENCY_SECS)?;
        let host_count = hosts.len();
        let mut persisted = 0;
        for host in hosts {
            if Self::score_host(store, ml, &host, now)?.is_some() {
                persisted += 1;
            }
        }
        tracing::debug!(host_count, persisted, "hybrid scoring cycle complete");
        Ok(persisted)
    }

    /// Score a single host and persist a verdict if warranted. Returns
    /// the verdict's combined score when one was persisted.
    pub fn score_host(
        store: &Store,
        ml: &MlDetector,
        src_ip: &str,
        now: f64,
    ) -> NidsResult<Option<f64>> {
        let sig = sig_score(store, src_ip, now)?;
        let (_, stat) = host_stat_score(store, src_ip)?;
        let ml_score = ml.ml_score(store, src_ip)?;

        let sig_active = sig > 0.0;
        let stat_active = stat > 0.0;
        let ml_active = ml.is_trained();

        let mut weight_sum = 0.0;
        if sig_active {
            weight_sum += W_SIG;
        }
        if stat_active {
            weight_sum += W_STAT;
        }
        if ml_active {
            weight_sum += W_ML;
        }

        let mut combined = if weight_sum > 0.0 {
            let mut acc = 0.0;
            if sig_active {
                acc += (W_SIG / weight_sum) * sig;
            }
            if stat_active {
                acc += (W_STAT / weight_sum) * stat;
            }
            if ml_active {
                acc += (W_ML / weight_sum) * ml_score;
            }
            acc
        } else {
            0.0
        };

        let sig_triggered = sig >= 0.25;
        let stat_triggered = stat >= 0.5;
        let ml_triggered = ml_score >= 0.5;
        let triggered_count = [sig_triggered, stat_triggered, ml_triggered]
            .iter()
            .filter(|t| **t)
            .count();

        if triggered_count >= 3 {
            combined *= 1.3;
        } else if triggered_count >= 2 {
            combined *= 1.15;
        }
        combined = combined.clamp(0.0, 1.0);

        if combined < VERDICT_FLOOR {
            return Ok(None);
        }

        let confidence = match triggered_count {
            3 => Confidence::High,
            2 => Confidence::Medium,
            1 => Confidence::Low,
            _ => Confidence::None,
        };

        let signature_msgs = store.recent_signature_messages(src_ip, now, SIG_WINDOW_SECS)?;
        let stat_anomalies = nids_stat::per_feature_z(store, src_ip)?
            .into_iter()
            .filter(|c| c.z_score >= nids_stat::Z_THRESHOLD)
            .collect();
        let ml_top_features = nids_stat::top_feature_contributions(store, src_ip)?;

        let severity = severity_for_combined(combined);
        tracing::info!(src_ip, combined, ?severity, ?confidence, "hybrid verdict persisted");

        store.insert_verdict(&HybridVerdictRow {
            timestamp: now,
            src_ip: src_ip.to_string(),
            sig_score: sig,
            stat_score: stat,
            ml_score,
            combined_score: combined,
            severity,
            confidence,
            details: VerdictDetails {
                signature_msgs,
                stat_anomalies,
                ml_top_features,
            },
        })?;

        Ok(Some(combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::Protocol;
    use nids_rules::SignatureAlert;

    fn alert(src_ip: &str, severity: Severity) -> SignatureAlert {
        SignatureAlert::new(now_secs(), 1000001, "alert matched".to_string(), severity)
            .with_source(src_ip.to_string(), None)
            .with_destination("127.0.0.1".to_string(), Some(22))
            .with_protocol(Protocol::Tcp.as_str().to_string())
    }

    #[test]
    fn cold_start_host_has_no_verdict() {
        let store = Store::open_in_memory().unwrap();
        let ml = MlDetector::new();
        let verdict = HybridScorer::score_host(&store, &ml, "10.0.0.1", now_secs()).unwrap();
        assert!(verdict.is_none());
    }

    #[test]
    fn signature_only_host_can_cross_floor() {
        let store = Store::open_in_memory().unwrap();
        let ml = MlDetector::new();
        for _ in 0..5 {
            store.insert_signature_alert(&alert("10.0.0.2", Severity::Critical)).unwrap();
        }
        let verdict = HybridScorer::score_host(&store, &ml, "10.0.0.2", now_secs()).unwrap();
        assert!(verdict.is_some());
    }
}
