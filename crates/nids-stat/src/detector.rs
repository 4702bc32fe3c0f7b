//! Stat Detector (C5): per-host baseline maintenance and z-score alerts.

use crate::math::{population_stats, z_score};
use nids_common::{now_secs, NidsResult, Severity, FEATURE_NAMES, MIN_STD};
use nids_store::{HostBaselineRow, Store};

/// Rolling history length used for the population statistic.
pub const HISTORY_N: usize = 50;
/// Minimum history before a metric is eligible for z-score alerting.
pub const MIN_HISTORY: usize = 3;
/// z-score at/above which a StatAlert is emitted.
pub const Z_THRESHOLD: f64 = 3.0;
/// Samples absorbed unconditionally before a host graduates learning mode.
pub const LEARNING_WINDOW: u64 = 100;
/// EWMA blend factor applied once a host has left learning mode.
pub const EWMA_ALPHA: f64 = 0.1;

/// Maintains per-host baselines and emits [`nids_store::StatAlertRow`]s.
pub struct StatDetector {
    z_threshold: f64,
}

impl StatDetector {
    pub fn new(z_threshold: f64) -> Self {
        Self { z_threshold }
    }

    /// Process every metric of the host's current window: emit z-score
    /// alerts, then refresh the host's baseline rows.
    ///
    /// `is_anomalous` signals that a same-window signature alert exists
    /// for this host; per the training-on-attacks guard, such a sample
    /// is excluded from baseline incorporation unless the host is still
    /// in learning mode.
    pub fn process_host(&self, store: &Store, src_ip: &str, is_anomalous: bool) -> NidsResult<usize> {
        let Some((_, current)) = store.latest_window_metrics(src_ip)? else {
            return Ok(0);
        };

        let mut alerts_emitted = 0;
        for &name in FEATURE_NAMES.iter() {
            let current_value = current.get(name).unwrap_or(0.0);
            let history = store.recent_metric_values(src_ip, name, HISTORY_N)?;

            if history.len() < MIN_HISTORY {
                // Still record the baseline row so later cycles see a
                // growing sample_count, but there's nothing to alert on.
                self.update_baseline(store, src_ip, name, &history, current_value, is_anomalous)?;
                continue;
            }

            let (mean, std) = population_stats(&history);
            let z = z_score(current_value, mean, std);
            if z >= self.z_threshold {
                let severity = severity_for_z(z);
                let description = format!(
                    "{name} z={z:.2} (current={current_value:.2}, mean={mean:.2}, std={std:.2})"
                );
                tracing::info!(src_ip, metric = name, z, ?severity, "statistical anomaly alert");
                store.insert_stat_alert(&nids_store::StatAlertRow {
                    timestamp: now_secs(),
                    src_ip: src_ip.to_string(),
                    metric_name: name.to_string(),
                    current: current_value,
                    mean,
                    std,
                    z_score: z,
                    severity,
                    description,
                })?;
                alerts_emitted += 1;
            }

            self.update_baseline(store, src_ip, name, &history, current_value, is_anomalous)?;
        }
        Ok(alerts_emitted)
    }

    fn update_baseline(
        &self,
        store: &Store,
        src_ip: &str,
        metric_name: &str,
        history: &[f64],
        current_value: f64,
        is_anomalous: bool,
    ) -> NidsResult<()> {
        let prev = store.get_baseline(src_ip, metric_name)?;
        let sample_count = prev.as_ref().map(|p| p.sample_count).unwrap_or(0);
        let is_learning = sample_count < LEARNING_WINDOW;

        if is_anomalous && !is_learning {
            // Guard: never incorporate an attack-flagged sample into an
            // already-graduated baseline.
            tracing::debug!(src_ip, metric = metric_name, "skipping baseline update: training-on-attack guard");
            return Ok(());
        }

        let (window_mean, window_std) = if history.is_empty() {
            (current_value, MIN_STD)
        } else {
            population_stats(history)
        };

        let (mean, std) = match &prev {
            Some(p) if !is_learning => (
                EWMA_ALPHA * window_mean + (1.0 - EWMA_ALPHA) * p.mean,
                (EWMA_ALPHA * window_std + (1.0 - EWMA_ALPHA) * p.std).max(MIN_STD),
            ),
            _ => (window_mean, window_std),
        };

        let min = prev.as_ref().map(|p| p.min.min(current_value)).unwrap_or(current_value);
        let max = prev.as_ref().map(|p| p.max.max(current_value)).unwrap_or(current_value);
        let new_sample_count = sample_count + 1;

        store.upsert_baseline(&HostBaselineRow {
            src_ip: src_ip.to_string(),
            metric_name: metric_name.to_string(),
            mean,
            std,
            sample_count: new_sample_count,
            min,
            max,
            last_updated: now_secs(),
            is_learning: new_sample_count < LEARNING_WINDOW,
        })?;
        Ok(())
    }
}

impl Default for StatDetector {
    fn default() -> Self {
        Self::new(Z_THRESHOLD)
    }
}

fn severity_for_z(z: f64) -> Severity {
    if z >= 5.0 {
        Severity::Critical
    } else if z >= 4.0 {
        Severity::High
    } else if z >= 3.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::MetricVector;

    fn push_window(store: &Store, src_ip: &str, start: f64, connections: f64) {
        store
            .write_window(
                src_ip,
                start,
                start + 60.0,
                MetricVector {
                    connections_count: connections,
                    unique_ports: 1.0,
                    unique_dst_ips: 1.0,
                    total_bytes: connections * 100.0,
                    avg_packet_size: 100.0,
                },
            )
            .unwrap();
    }

    #[test]
    fn insufficient_history_skips_alert() {
        let store = Store::open_in_memory().unwrap();
        push_window(&store, "1.1.1.1", 0.0, 10.0);
        let detector = StatDetector::default();
        let n = detector.process_host(&store, "1.1.1.1", false).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn large_deviation_triggers_critical_alert() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..10 {
            push_window(&store, "2.2.2.2", i as f64 * 60.0, 20.0);
        }
        push_window(&store, "2.2.2.2", 600.0, 1000.0);
        let detector = StatDetector::default();
        let n = detector.process_host(&store, "2.2.2.2", false).unwrap();
        assert!(n > 0);
    }

    #[test]
    fn learning_mode_absorbs_anomalous_samples() {
        let store = Store::open_in_memory().unwrap();
        push_window(&store, "3.3.3.3", 0.0, 10.0);
        let detector = StatDetector::default();
        detector.process_host(&store, "3.3.3.3", true).unwrap();
        let baseline = store.get_baseline("3.3.3.3", "connections_count").unwrap().unwrap();
        assert_eq!(baseline.sample_count, 1);
        assert!(baseline.is_learning);
    }

    #[test]
    fn guard_skips_graduated_baseline_on_anomalous_sample() {
        let store = Store::open_in_memory().unwrap();
        // Fast-forward a host past the learning window by seeding the
        // baseline row directly.
        store
            .upsert_baseline(&HostBaselineRow {
                src_ip: "4.4.4.4".into(),
                metric_name: "connections_count".into(),
                mean: 10.0,
                std: 2.0,
                sample_count: LEARNING_WINDOW,
                min: 5.0,
                max: 15.0,
                last_updated: 0.0,
                is_learning: false,
            })
            .unwrap();
        push_window(&store, "4.4.4.4", 0.0, 999.0);
        let detector = StatDetector::default();
        detector.process_host(&store, "4.4.4.4", true).unwrap();
        let baseline = store.get_baseline("4.4.4.4", "connections_count").unwrap().unwrap();
        // Unchanged: the guard must have skipped the upsert entirely.
        assert_eq!(baseline.sample_count, LEARNING_WINDOW);
        assert_eq!(baseline.mean, 10.0);
    }
}
