//! Shared z-score statistics, used by both the stat detector and (via the
//! ML and hybrid layers) anyone that needs the same population formula.
//! The original source recomputed this independently in three places with
//! subtly inconsistent edge cases; this is the single normative version.

use nids_common::MIN_STD;

/// Population mean and standard deviation (divide by N, not N-1), with
/// the std floored at [`MIN_STD`] so z-scores never divide by (near-)zero.
pub fn population_stats(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if n == 0.0 {
        return (0.0, MIN_STD);
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt().max(MIN_STD))
}

/// Absolute z-score of `current` against `(mean, std)`.
pub fn z_score(current: f64, mean: f64, std: f64) -> f64 {
    if std <= 0.0 {
        return 0.0;
    }
    (current - mean).abs() / std
}

/// Logistic sigmoid.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `stat_score` as defined for both the ML layer's inference step and the
/// hybrid scorer: the logistic of `(max_z - threshold)`, clamped to 1.0.
pub fn stat_score_from_max_z(max_z: f64, threshold: f64) -> f64 {
    sigmoid(max_z - threshold).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std_never_below_floor() {
        let (_, std) = population_stats(&[5.0, 5.0, 5.0]);
        assert_eq!(std, MIN_STD);
    }

    #[test]
    fn z_score_zero_when_std_zero() {
        assert_eq!(z_score(10.0, 5.0, 0.0), 0.0);
    }

    #[test]
    fn empty_history_yields_zero_mean() {
        let (mean, _) = population_stats(&[]);
        assert_eq!(mean, 0.0);
    }
}
