//! Lighthouse consensus: weighted geometric mean of the five metrics.
//!
//! Any input at or below zero forces L = 0. A strong metric can never carry a
//! failed one.

use crate::types::MetricSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusAggregator {
    weights: [f64; 5],
}

impl Default for ConsensusAggregator {
    fn default() -> Self {
        Self { weights: [1.0; 5] }
    }
}

impl ConsensusAggregator {
    pub fn new(weights: [f64; 5]) -> Self {
        Self { weights }
    }

    /// L = (Π mᵢ^wᵢ)^(1/Σwᵢ), computed in log space
    pub fn intensity(&self, metrics: &MetricSnapshot) -> f64 {
        let values = metrics.as_array();
        if values.iter().any(|v| !(*v > 0.0) || !v.is_finite()) {
            return 0.0;
        }
        let total_weight: f64 = self.weights.iter().sum();
        if !(total_weight > 0.0) {
            return 0.0;
        }
        let log_sum: f64 = values
            .iter()
            .zip(self.weights.iter())
            .map(|(v, w)| w * v.min(1.0).ln())
            .sum();
        (log_sum / total_weight).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(values: [f64; 5]) -> MetricSnapshot {
        MetricSnapshot {
            linear_coherence: values[0],
            nonlinear_coherence: values[1],
            cross_scale_coherence: values[2],
            effective_gravity: values[3],
            anomaly_pointer: values[4],
        }
    }

    #[test]
    fn test_zero_dominates() {
        let agg = ConsensusAggregator::default();
        for i in 0..5 {
            let mut values = [1.0; 5];
            values[i] = 0.0;
            assert_eq!(agg.intensity(&snapshot(values)), 0.0);
        }
    }

    #[test]
    fn test_nan_input_is_zero() {
        let agg = ConsensusAggregator::default();
        assert_eq!(agg.intensity(&snapshot([1.0, f64::NAN, 1.0, 1.0, 1.0])), 0.0);
    }

    #[test]
    fn test_all_ones() {
        let agg = ConsensusAggregator::default();
        assert!((agg.intensity(&snapshot([1.0; 5])) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_geometric_mean_value() {
        let agg = ConsensusAggregator::default();
        let l = agg.intensity(&snapshot([0.5, 0.5, 0.5, 0.5, 0.5]));
        assert!((l - 0.5).abs() < 1e-12);

        let l = agg.intensity(&snapshot([1.0, 1.0, 1.0, 1.0, 0.03125]));
        // 0.03125 = 2^-5, fifth root is 0.5
        assert!((l - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weights_shift_influence() {
        let heavy_gravity = ConsensusAggregator::new([1.0, 1.0, 1.0, 4.0, 1.0]);
        let even = ConsensusAggregator::default();
        let metrics = snapshot([0.9, 0.9, 0.9, 0.2, 0.9]);
        assert!(heavy_gravity.intensity(&metrics) < even.intensity(&metrics));
    }

    #[test]
    fn test_strictly_increasing_in_each_input() {
        let agg = ConsensusAggregator::new([1.0, 2.0, 0.5, 1.0, 3.0]);
        let base = [0.3, 0.6, 0.45, 0.2, 0.8];
        let h = 1e-4;
        for i in 0..5 {
            let mut bumped = base;
            bumped[i] += h;
            let before = agg.intensity(&snapshot(base));
            let after = agg.intensity(&snapshot(bumped));
            assert!(after > before, "input {i}: {after} <= {before}");
        }
    }
}
