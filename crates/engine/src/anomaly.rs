//! Anomaly pointer (Q): relative price jump weighted by the volume spike

use crate::config::Rescale;
use crate::types::PricePoint;
use crate::window::{mean, RollingNormalizer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyReading {
    pub price_change: f64,
    pub volume_spike: f64,
    pub raw: f64,
    pub normalized: f64,
}

/// Newest volume over the mean of up to `window - 1` volumes before it.
/// 1.0 when there is no usable average.
pub fn volume_spike(series: &[PricePoint], window: usize) -> f64 {
    let Some((last, earlier)) = series.split_last() else {
        return 1.0;
    };
    let lookback = window.saturating_sub(1);
    let start = earlier.len().saturating_sub(lookback);
    match mean(earlier[start..].iter().map(|p| p.volume)) {
        Some(avg) if avg > 0.0 => last.volume / avg,
        _ => 1.0,
    }
}

/// |p[-1] - p[-2]| / p[-2]; 0 with fewer than two samples
pub fn price_change(series: &[PricePoint]) -> f64 {
    match series {
        [.., prev, last] if prev.price > 0.0 => (last.price - prev.price).abs() / prev.price,
        _ => 0.0,
    }
}

#[derive(Debug, Clone)]
pub struct AnomalyPointer {
    window: usize,
    normalizer: RollingNormalizer,
}

impl AnomalyPointer {
    pub fn new(window: usize, normalizer_window: usize, rescale: Rescale) -> Self {
        Self {
            window,
            normalizer: RollingNormalizer::new(normalizer_window, rescale),
        }
    }

    pub fn score(&mut self, series: &[PricePoint]) -> AnomalyReading {
        let price_change = price_change(series);
        let volume_spike = if series.len() < 2 {
            1.0
        } else {
            volume_spike(series, self.window)
        };
        let raw = price_change * volume_spike;
        AnomalyReading {
            price_change,
            volume_spike,
            raw,
            normalized: self.normalizer.push(raw),
        }
    }
}
