//! Curvature estimation, golden-ratio interval validation and the FTCP gate

use tracing::debug;

use crate::types::{CurvatureSample, FtcpEvent, PricePoint};
use crate::window::RollingWindow;

pub const PHI: f64 = 1.618_033_988_749_895;
pub const PHI_INV: f64 = 0.618_033_988_749_895;

/// Curvature over (prev, curr, next). Zero-length intervals give κ = 0.
pub fn curvature(prev: &PricePoint, curr: &PricePoint, next: &PricePoint) -> CurvatureSample {
    let dt1 = (curr.timestamp - prev.timestamp) as f64 / 1000.0;
    let dt2 = (next.timestamp - curr.timestamp) as f64 / 1000.0;
    if dt1 == 0.0 || dt2 == 0.0 {
        return CurvatureSample { kappa: 0.0, dt1, dt2 };
    }
    let kappa = (next.price - 2.0 * curr.price + prev.price) / (dt1 * dt2);
    CurvatureSample { kappa, dt1, dt2 }
}

/// Curvature of the newest three points of a series; κ = 0 with fewer than three
pub fn curvature_of(series: &[PricePoint]) -> CurvatureSample {
    match series {
        [.., prev, curr, next] => curvature(prev, curr, next),
        _ => CurvatureSample::default(),
    }
}

/// Distance of the interval ratio dt2/dt1 from φ⁻¹
pub fn golden_ratio_deviation(dt1: f64, dt2: f64) -> Option<f64> {
    if !(dt1 > 0.0) || !(dt2 > 0.0) {
        return None;
    }
    Some((dt2 / dt1 - PHI_INV).abs())
}

/// True when dt2/dt1 lies within `tolerance` of φ⁻¹
pub fn golden_ratio_match(dt1: f64, dt2: f64, tolerance: f64) -> bool {
    golden_ratio_deviation(dt1, dt2).map_or(false, |dev| dev <= tolerance)
}

/// Linear falloff: 1 at an exact φ⁻¹ ratio, 0 at or beyond the tolerance
pub fn golden_ratio_score(dt1: f64, dt2: f64, tolerance: f64) -> f64 {
    match golden_ratio_deviation(dt1, dt2) {
        Some(dev) if tolerance > 0.0 => (1.0 - dev / tolerance).max(0.0),
        Some(dev) if dev == 0.0 => 1.0,
        _ => 0.0,
    }
}

/// Adaptive-threshold gate: a tick is an FTCP only when its interval ratio
/// matches φ⁻¹ AND |κ| beats the p-th percentile of recent |κ|.
#[derive(Debug, Clone)]
pub struct FtcpDetector {
    magnitudes: RollingWindow<f64>,
    percentile: f64,
    tolerance: f64,
    min_samples: usize,
}

impl FtcpDetector {
    pub fn new(window: usize, percentile: f64, tolerance: f64, min_samples: usize) -> Self {
        Self {
            magnitudes: RollingWindow::new(window),
            percentile,
            tolerance,
            min_samples,
        }
    }

    /// Current threshold over the stored |κ| history, if warmed up
    pub fn threshold(&self) -> Option<f64> {
        if self.magnitudes.len() < self.min_samples.max(1) {
            return None;
        }
        self.magnitudes.percentile(self.percentile)
    }

    /// Evaluate one curvature sample, then fold its |κ| into the history
    pub fn evaluate(&mut self, timestamp: i64, sample: &CurvatureSample) -> FtcpEvent {
        let golden_ratio_match = golden_ratio_match(sample.dt1, sample.dt2, self.tolerance);
        let threshold = self.threshold();
        let magnitude = sample.kappa.abs();

        let is_ftcp = match threshold {
            Some(theta) => golden_ratio_match && magnitude > theta,
            None => false,
        };

        self.magnitudes.push(magnitude);

        if is_ftcp {
            debug!(
                timestamp,
                kappa = sample.kappa,
                threshold = threshold.unwrap_or_default(),
                "FTCP detected"
            );
        }

        FtcpEvent {
            timestamp,
            kappa: sample.kappa,
            threshold: threshold.unwrap_or(f64::INFINITY),
            golden_ratio_match,
            is_ftcp,
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}
