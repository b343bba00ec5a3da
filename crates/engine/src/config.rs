//! Engine configuration
//!
//! Every threshold in the pipeline is a tunable default. Missing fields in a
//! JSON override fall back to `EngineConfig::default()`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, EngineResult};

/// How unbounded raw scores (gravity, anomaly) are squeezed into [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum Rescale {
    /// (x - min) / (max - min) over the rolling window, current value included
    MinMax,
    /// x / P(percentile) over the rolling window, clamped to 1
    PercentileClamp { percentile: f64 },
}

impl Default for Rescale {
    fn default() -> Self {
        Rescale::MinMax
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Spacing unit of the Fibonacci time lattice
    pub base_interval_minutes: i64,
    /// Rolling tick buffer per symbol
    pub price_buffer_capacity: usize,
    /// Number of |κ| values kept for the adaptive threshold
    pub curvature_window: usize,
    /// Fewer |κ| values than this means no FTCP can fire yet
    pub min_curvature_samples: usize,
    pub curvature_percentile: f64,
    pub golden_ratio_tolerance: f64,
    pub gravity_alpha: f64,
    pub coherence_window: usize,
    pub ema_fast_span: usize,
    pub ema_slow_span: usize,
    pub rescale: Rescale,
    /// Order: linear, nonlinear, cross-scale, gravity, anomaly
    pub consensus_weights: [f64; 5],
    pub lighthouse_history_capacity: usize,
    pub min_history_for_confirmation: usize,
    pub z_score_multiplier: f64,
    /// BUY/SELL need confidence strictly above this
    pub signal_confidence_floor: f64,
    pub tier1_floor: f64,
    pub tier2_floor: f64,
    /// Directional confidence boost from coherence trends, in points
    pub coherence_boost: f64,
    /// Ingestion coalescing period for bursty feeds
    pub coalesce_period_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_interval_minutes: 5,
            price_buffer_capacity: 500,
            curvature_window: 200,
            min_curvature_samples: 10,
            curvature_percentile: 90.0,
            golden_ratio_tolerance: 0.05,
            gravity_alpha: 1.0,
            coherence_window: 20,
            ema_fast_span: 12,
            ema_slow_span: 26,
            rescale: Rescale::MinMax,
            consensus_weights: [1.0; 5],
            lighthouse_history_capacity: 500,
            min_history_for_confirmation: 20,
            z_score_multiplier: 2.0,
            signal_confidence_floor: 60.0,
            tier1_floor: 80.0,
            tier2_floor: 60.0,
            coherence_boost: 5.0,
            coalesce_period_ms: 1000,
        }
    }
}

impl EngineConfig {
    /// Load overrides from a JSON file and validate them
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        fn fail(msg: impl Into<String>) -> EngineResult<()> {
            Err(EngineError::Config(msg.into()))
        }

        if self.base_interval_minutes <= 0 {
            return fail("base_interval_minutes must be positive");
        }
        if self.price_buffer_capacity < 3 {
            return fail("price_buffer_capacity must hold at least 3 ticks");
        }
        if self.coherence_window < 2 || self.coherence_window > self.price_buffer_capacity {
            return fail("coherence_window must be in [2, price_buffer_capacity]");
        }
        if self.curvature_window == 0 {
            return fail("curvature_window must be positive");
        }
        if !(self.curvature_percentile > 0.0 && self.curvature_percentile <= 100.0) {
            return fail("curvature_percentile must be in (0, 100]");
        }
        if let Rescale::PercentileClamp { percentile } = self.rescale {
            if !(percentile > 0.0 && percentile <= 100.0) {
                return fail("rescale percentile must be in (0, 100]");
            }
        }
        if !(self.golden_ratio_tolerance >= 0.0) {
            return fail("golden_ratio_tolerance must be non-negative");
        }
        if self.ema_fast_span == 0 || self.ema_fast_span >= self.ema_slow_span {
            return fail("ema spans must satisfy 0 < fast < slow");
        }
        if self.consensus_weights.iter().any(|w| !(*w > 0.0) || !w.is_finite()) {
            return fail("consensus weights must be positive and finite");
        }
        if self.min_history_for_confirmation == 0
            || self.lighthouse_history_capacity < self.min_history_for_confirmation
        {
            return fail("lighthouse_history_capacity must cover min_history_for_confirmation");
        }
        if !(self.z_score_multiplier >= 0.0) {
            return fail("z_score_multiplier must be non-negative");
        }
        if !(self.tier2_floor <= self.tier1_floor) {
            return fail("tier2_floor must not exceed tier1_floor");
        }
        if self.coalesce_period_ms <= 0 {
            return fail("coalesce_period_ms must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.curvature_percentile, 90.0);
        assert_eq!(config.consensus_weights, [1.0; 5]);
        assert_eq!(config.min_history_for_confirmation, 20);
    }

    #[test]
    fn test_rejects_zero_weight() {
        let config = EngineConfig {
            consensus_weights: [1.0, 1.0, 0.0, 1.0, 1.0],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_rejects_history_smaller_than_minimum() {
        let config = EngineConfig {
            lighthouse_history_capacity: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"z_score_multiplier": 3.0, "rescale": {{"method": "percentile_clamp", "percentile": 95.0}}}}"#
        )
        .unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.z_score_multiplier, 3.0);
        assert_eq!(config.rescale, Rescale::PercentileClamp { percentile: 95.0 });
        assert_eq!(config.coherence_window, 20);
    }
}
