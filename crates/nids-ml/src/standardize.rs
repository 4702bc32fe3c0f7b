//! Per-feature standardization fit once at training time and reused at
//! inference, matching the order fixed by [`nids_common::FEATURE_NAMES`].

use nids_common::MetricVector;
use nids_stat::math::population_stats;
use serde::{Deserialize, Serialize};

/// Mean/std per feature, in `FEATURE_NAMES` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardizer {
    means: [f64; 5],
    stds: [f64; 5],
}

impl Standardizer {
    /// Fit mean/std per column from a batch of training vectors.
    pub fn fit(samples: &[MetricVector]) -> Self {
        let mut means = [0.0; 5];
        let mut stds = [0.0; 5];
        for col in 0..5 {
            let column: Vec<f64> = samples.iter().map(|s| s.as_array()[col]).collect();
            let (mean, std) = population_stats(&column);
            means[col] = mean;
            stds[col] = std;
        }
        Self { means, stds }
    }

    /// Map a raw metric vector onto standardized feature space.
    pub fn transform(&self, metrics: &MetricVector) -> [f64; 5] {
        let raw = metrics.as_array();
        let mut out = [0.0; 5];
        for i in 0..5 {
            out[i] = (raw[i] - self.means[i]) / self.stds[i];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_centers_training_data() {
        let samples = vec![
            MetricVector {
                connections_count: 10.0,
                unique_ports: 2.0,
                unique_dst_ips: 1.0,
                total_bytes: 1000.0,
                avg_packet_size: 100.0,
            },
            MetricVector {
                connections_count: 20.0,
                unique_ports: 4.0,
                unique_dst_ips: 3.0,
                total_bytes: 2000.0,
                avg_packet_size: 100.0,
            },
        ];
        let standardizer = Standardizer::fit(&samples);
        let z = standardizer.transform(&samples[0]);
        assert!(z[0] < 0.0);
    }
}
