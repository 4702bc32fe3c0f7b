//! Isolation Forest: unsupervised anomaly detector that isolates points by
//! random recursive partitioning. Points that isolate in fewer splits than
//! expected are scored as more anomalous.
//!
//! This is the standard algorithm (Liu, Ting & Zhou 2008), not a novel
//! variant: random feature, random split value in `[min, max]` of the
//! subsample along that feature, recurse until `max_depth` or a singleton.
//! The only departure from a textbook description is that randomness is
//! seeded deterministically so training is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const SUBSAMPLE_SIZE: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationNode {
    split_feature: usize,
    split_value: f64,
    left: Option<Box<IsolationNode>>,
    right: Option<Box<IsolationNode>>,
    /// Size of the subsample that reached this node, used to estimate the
    /// remaining path length when recursion bottoms out early.
    size: usize,
}

impl IsolationNode {
    fn build(data: &[[f64; 5]], depth: usize, max_depth: usize, rng: &mut StdRng) -> Self {
        if depth >= max_depth || data.len() <= 1 {
            return Self {
                split_feature: 0,
                split_value: 0.0,
                left: None,
                right: None,
                size: data.len(),
            };
        }

        let split_feature = rng.gen_range(0..5);
        let min_val = data.iter().map(|v| v[split_feature]).fold(f64::INFINITY, f64::min);
        let max_val = data
            .iter()
            .map(|v| v[split_feature])
            .fold(f64::NEG_INFINITY, f64::max);

        if (max_val - min_val).abs() < f64::EPSILON {
            return Self {
                split_feature,
                split_value: min_val,
                left: None,
                right: None,
                size: data.len(),
            };
        }

        let split_value = rng.gen_range(min_val..max_val);
        let (left_data, right_data): (Vec<[f64; 5]>, Vec<[f64; 5]>) =
            data.iter().partition(|v| v[split_feature] < split_value);

        let left = if left_data.is_empty() {
            None
        } else {
            Some(Box::new(IsolationNode::build(&left_data, depth + 1, max_depth, rng)))
        };
        let right = if right_data.is_empty() {
            None
        } else {
            Some(Box::new(IsolationNode::build(&right_data, depth + 1, max_depth, rng)))
        };

        Self {
            split_feature,
            split_value,
            left,
            right,
            size: data.len(),
        }
    }

    fn path_length(&self, x: &[f64; 5], depth: usize) -> f64 {
        match (&self.left, &self.right) {
            (None, None) => depth as f64 + average_path_length(self.size),
            (left, right) => {
                let go_left = x[self.split_feature] < self.split_value;
                match (go_left, left, right) {
                    (true, Some(l), _) => l.path_length(x, depth + 1),
                    (false, _, Some(r)) => r.path_length(x, depth + 1),
                    (true, None, Some(r)) => r.path_length(x, depth + 1),
                    (false, Some(l), None) => l.path_length(x, depth + 1),
                    (_, None, None) => depth as f64 + average_path_length(self.size),
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree
/// built from `n` points: `c(n)` from the Isolation Forest paper.
fn average_path_length(n: usize) -> f64 {
    let n = n as f64;
    if n <= 1.0 {
        0.0
    } else if n == 2.0 {
        1.0
    } else {
        2.0 * ((n - 1.0).ln() + 0.5772156649) - 2.0 * (n - 1.0) / n
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn fit(data: &[[f64; 5]], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: IsolationNode::build(data, 0, max_depth, rng),
        }
    }

    fn path_length(&self, x: &[f64; 5]) -> f64 {
        self.root.path_length(x, 0)
    }
}

/// A fitted Isolation Forest.
#[derive(Debug, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// `c(subsample_size)`, used to normalize average path length into a
    /// signed decision score.
    normalizer: f64,
}

impl IsolationForest {
    /// Fit `n_estimators` trees, each on an independent subsample (with
    /// replacement if the training set is smaller than the subsample
    /// size) drawn with the given deterministic seed.
    pub fn fit(data: &[[f64; 5]], n_estimators: usize, seed: u64) -> Self {
        if data.is_empty() {
            return Self {
                trees: Vec::new(),
                normalizer: 0.0,
            };
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let subsample_size = data.len().min(SUBSAMPLE_SIZE).max(1);
        let max_depth = (subsample_size as f64).log2().ceil() as usize;

        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let subsample: Vec<[f64; 5]> = (0..subsample_size)
                .map(|_| data[rng.gen_range(0..data.len())])
                .collect();
            trees.push(IsolationTree::fit(&subsample, max_depth, &mut rng));
        }

        Self {
            trees,
            normalizer: average_path_length(subsample_size),
        }
    }

    /// Signed decision score: positive means more normal, negative means
    /// more anomalous, matching the standard Isolation Forest convention
    /// (lower path length ⇒ easier to isolate ⇒ more anomalous).
    pub fn decision(&self, x: &[f64; 5]) -> f64 {
        if self.trees.is_empty() || self.normalizer <= 0.0 {
            return 0.0;
        }
        let avg_path: f64 =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        (avg_path / self.normalizer) - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(n: usize, center: f64) -> Vec<[f64; 5]> {
        (0..n)
            .map(|i| {
                let jitter = (i as f64 % 5.0) * 0.01;
                [center + jitter; 5]
            })
            .collect()
    }

    #[test]
    fn same_seed_yields_identical_forest_decisions() {
        let mut data = cluster(100, 0.0);
        data.extend(cluster(5, 50.0));
        let f1 = IsolationForest::fit(&data, 20, 42);
        let f2 = IsolationForest::fit(&data, 20, 42);
        assert_eq!(f1.decision(&[0.0; 5]), f2.decision(&[0.0; 5]));
    }

    #[test]
    fn outlier_scores_more_anomalous_than_cluster_member() {
        let mut data = cluster(200, 0.0);
        data.extend(cluster(10, 100.0));
        let forest = IsolationForest::fit(&data, 50, 7);
        let normal_score = forest.decision(&[0.0; 5]);
        let outlier_score = forest.decision(&[500.0; 5]);
        assert!(outlier_score < normal_score);
    }

    #[test]
    fn empty_forest_decision_is_zero() {
        let forest = IsolationForest::fit(&[], 10, 1);
        assert_eq!(forest.decision(&[1.0; 5]), 0.0);
    }
}
