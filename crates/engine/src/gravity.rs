//! Effective gravity: how hard the price bends at a harmonically spaced instant

use crate::config::Rescale;
use crate::curvature::golden_ratio_score;
use crate::types::{CurvatureSample, PricePoint};
use crate::window::RollingNormalizer;

/// Half the absolute move between the two newest prices; 0 with fewer than two
pub fn local_contrast(series: &[PricePoint]) -> f64 {
    match series {
        [.., prev, last] => (last.price - prev.price).abs() / 2.0,
        _ => 0.0,
    }
}

/// Unbounded gravity score `α · |κ| · fibMatch · contrast`
pub fn raw_gravity(alpha: f64, sample: &CurvatureSample, tolerance: f64, contrast: f64) -> f64 {
    let fib_match = golden_ratio_score(sample.dt1, sample.dt2, tolerance);
    alpha * sample.kappa.abs() * fib_match * contrast
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityReading {
    pub raw: f64,
    pub normalized: f64,
}

/// Raw gravity plus its rolling rescale into [0, 1]
#[derive(Debug, Clone)]
pub struct GravityScorer {
    alpha: f64,
    tolerance: f64,
    normalizer: RollingNormalizer,
}

impl GravityScorer {
    pub fn new(alpha: f64, tolerance: f64, window: usize, rescale: Rescale) -> Self {
        Self {
            alpha,
            tolerance,
            normalizer: RollingNormalizer::new(window, rescale),
        }
    }

    pub fn score(&mut self, sample: &CurvatureSample, series: &[PricePoint]) -> GravityReading {
        let raw = raw_gravity(self.alpha, sample, self.tolerance, local_contrast(series));
        let normalized = self.normalizer.push(raw);
        GravityReading { raw, normalized }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curvature::PHI_INV;

    fn series(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(i as i64 * 1000, p, 1.0))
            .collect()
    }

    #[test]
    fn test_local_contrast() {
        assert_eq!(local_contrast(&series(&[])), 0.0);
        assert_eq!(local_contrast(&series(&[100.0])), 0.0);
        assert_eq!(local_contrast(&series(&[100.0, 130.0, 102.0])), 14.0);
    }

    #[test]
    fn test_raw_gravity_product() {
        let sample = CurvatureSample {
            kappa: -2.0,
            dt1: 1.0,
            dt2: PHI_INV,
        };
        assert!((raw_gravity(1.5, &sample, 0.05, 4.0) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_raw_gravity_zero_outside_tolerance() {
        let sample = CurvatureSample {
            kappa: 10.0,
            dt1: 1.0,
            dt2: 1.0,
        };
        assert_eq!(raw_gravity(1.0, &sample, 0.05, 4.0), 0.0);
    }

    #[test]
    fn test_scorer_normalizes_into_unit_interval() {
        let mut scorer = GravityScorer::new(1.0, 0.05, 200, Rescale::MinMax);
        let flat = CurvatureSample::default();
        let prices = series(&[100.0, 100.0, 100.0]);
        for _ in 0..5 {
            let reading = scorer.score(&flat, &prices);
            assert_eq!(reading.normalized, 0.0);
        }

        let bend = CurvatureSample {
            kappa: 3.0,
            dt1: 1.0,
            dt2: PHI_INV,
        };
        let reading = scorer.score(&bend, &series(&[100.0, 130.0, 102.0]));
        assert!(reading.raw > 0.0);
        assert_eq!(reading.normalized, 1.0);
    }
}
