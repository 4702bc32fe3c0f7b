//! Baseline-derived scoring shared by the ML layer (C6, top features and
//! the stat half of its combined score) and the hybrid scorer (C7).

use crate::detector::Z_THRESHOLD;
use crate::math::{stat_score_from_max_z, z_score};
use nids_common::{NidsResult, FEATURE_NAMES};
use nids_store::{FeatureContribution, Store};

/// Per-feature `(name, current, mean, std, z)` against the host's stored
/// baseline. A feature with no baseline row yet contributes z=0.
pub fn per_feature_z(store: &Store, src_ip: &str) -> NidsResult<Vec<FeatureContribution>> {
    let Some((_, current)) = store.latest_window_metrics(src_ip)? else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(FEATURE_NAMES.len());
    for &name in FEATURE_NAMES.iter() {
        let current_value = current.get(name).unwrap_or(0.0);
        let (mean, std, z) = match store.get_baseline(src_ip, name)? {
            Some(baseline) => {
                let z = z_score(current_value, baseline.mean, baseline.std);
                (baseline.mean, baseline.std, z)
            }
            None => (0.0, 0.0, 0.0),
        };
        out.push(FeatureContribution {
            feature: name.to_string(),
            current: current_value,
            mean,
            std,
            z_score: z,
        });
    }
    Ok(out)
}

/// `(max_z, stat_score)` for a host: the maximum per-feature z against its
/// baseline, and the sigmoid-mapped score derived from it. Both are 0 when
/// the host has no recorded window or baseline yet.
pub fn host_stat_score(store: &Store, src_ip: &str) -> NidsResult<(f64, f64)> {
    let contributions = per_feature_z(store, src_ip)?;
    let max_z = contributions.iter().map(|c| c.z_score).fold(0.0, f64::max);
    let stat_score = if max_z > 0.0 {
        stat_score_from_max_z(max_z, Z_THRESHOLD)
    } else {
        0.0
    };
    Ok((max_z, stat_score))
}

/// The three highest-z feature contributions, for `MLAlert.top_features`.
pub fn top_feature_contributions(store: &Store, src_ip: &str) -> NidsResult<Vec<FeatureContribution>> {
    let mut contributions = per_feature_z(store, src_ip)?;
    contributions.sort_by(|a, b| b.z_score.partial_cmp(&a.z_score).unwrap());
    contributions.truncate(3);
    Ok(contributions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::MetricVector;
    use nids_store::HostBaselineRow;

    #[test]
    fn host_with_no_window_scores_zero() {
        let store = Store::open_in_memory().unwrap();
        let (max_z, stat_score) = host_stat_score(&store, "1.1.1.1").unwrap();
        assert_eq!(max_z, 0.0);
        assert_eq!(stat_score, 0.0);
    }

    #[test]
    fn top_features_are_sorted_descending_by_z() {
        let store = Store::open_in_memory().unwrap();
        store
            .write_window(
                "2.2.2.2",
                0.0,
                60.0,
                MetricVector {
                    connections_count: 500.0,
                    unique_ports: 10.0,
                    unique_dst_ips: 1.0,
                    total_bytes: 1000.0,
                    avg_packet_size: 100.0,
                },
            )
            .unwrap();
        store
            .upsert_baseline(&HostBaselineRow {
                src_ip: "2.2.2.2".into(),
                metric_name: "connections_count".into(),
                mean: 10.0,
                std: 2.0,
                sample_count: 100,
                min: 5.0,
                max: 15.0,
                last_updated: 0.0,
                is_learning: false,
            })
            .unwrap();
        let top = top_feature_contributions(&store, "2.2.2.2").unwrap();
        assert_eq!(top[0].feature, "connections_count");
        assert!(top[0].z_score >= top[1].z_score);
    }
}
