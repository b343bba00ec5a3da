//! Coherence bank: three [0, 1] measures of how structured the recent price
//! series is.
//!
//! - linear: MACD-style trend strength from a fast/slow EMA pair
//! - nonlinear: stability, `1 / (1 + stddev/mean)` over the trailing window
//! - cross-scale: |Pearson| between the window read at unit stride and at
//!   stride φ, both walking backwards from the newest sample
//!
//! All three read 0 until the trailing window is full.

use ta::indicators::ExponentialMovingAverage;
use ta::Next;

use crate::curvature::PHI;
use crate::error::{EngineError, EngineResult};
use crate::window::{mean, std_dev};

/// Fewest φ-stride points needed for a cross-scale reading
pub const MIN_RESAMPLED_POINTS: usize = 10;

/// Trend strength saturates once |fast - slow| reaches this share of slow
const TREND_SATURATION: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoherenceReading {
    pub linear: f64,
    pub nonlinear: f64,
    pub cross_scale: f64,
    /// cross-scale coherence went up since the previous tick
    pub cross_scale_rising: bool,
    /// linear coherence went down since the previous tick
    pub linear_breakdown: bool,
}

#[derive(Debug, Clone)]
pub struct CoherenceBank {
    window: usize,
    ema_fast: ExponentialMovingAverage,
    ema_slow: ExponentialMovingAverage,
    previous: Option<CoherenceReading>,
}

impl CoherenceBank {
    pub fn new(window: usize, fast_span: usize, slow_span: usize) -> EngineResult<Self> {
        let ema = |span: usize| {
            ExponentialMovingAverage::new(span)
                .map_err(|e| EngineError::Config(format!("invalid EMA span {span}: {e:?}")))
        };
        Ok(Self {
            window,
            ema_fast: ema(fast_span)?,
            ema_slow: ema(slow_span)?,
            previous: None,
        })
    }

    /// Feed the newest price and read all three measures over `recent`, the
    /// trailing prices oldest first with the newest last. Must be called once
    /// per accepted tick, in order.
    pub fn update(&mut self, price: f64, recent: &[f64]) -> CoherenceReading {
        let fast = self.ema_fast.next(price);
        let slow = self.ema_slow.next(price);

        let mut reading = if recent.len() < self.window {
            CoherenceReading::default()
        } else {
            let recent = &recent[recent.len() - self.window..];
            CoherenceReading {
                linear: linear_coherence(fast, slow),
                nonlinear: nonlinear_coherence(recent),
                cross_scale: cross_scale_coherence(recent),
                ..Default::default()
            }
        };

        if let Some(prev) = self.previous {
            reading.cross_scale_rising = reading.cross_scale > prev.cross_scale;
            reading.linear_breakdown = reading.linear < prev.linear;
        }
        self.previous = Some(reading);
        reading
    }
}

pub fn linear_coherence(ema_fast: f64, ema_slow: f64) -> f64 {
    let scale = ema_slow * TREND_SATURATION;
    if !(scale > 0.0) {
        return 0.0;
    }
    ((ema_fast - ema_slow).abs() / scale).min(1.0)
}

pub fn nonlinear_coherence(prices: &[f64]) -> f64 {
    let mu = match mean(prices.iter().copied()) {
        Some(mu) if mu > 0.0 => mu,
        _ => return 0.0,
    };
    let sigma = std_dev(prices.iter().copied()).unwrap_or(0.0);
    1.0 / (1.0 + sigma / mu)
}

/// `prices` oldest first. Both series start at the newest sample: unit stride
/// `p[n-1-i]` against φ stride `p[n-1-floor(i·φ)]`. This departs from the
/// prefix form (`p[i]` against `p[floor(i·φ)]`), which never reads the newest
/// samples of the window and so cannot see a move at its head.
pub fn cross_scale_coherence(prices: &[f64]) -> f64 {
    let n = prices.len();
    let offsets: Vec<usize> = (0..)
        .map(|i| (i as f64 * PHI).floor() as usize)
        .take_while(|&offset| offset < n)
        .collect();
    if offsets.len() < MIN_RESAMPLED_POINTS {
        return 0.0;
    }

    let fine: Vec<f64> = (0..offsets.len()).map(|i| prices[n - 1 - i]).collect();
    let coarse: Vec<f64> = offsets.iter().map(|&o| prices[n - 1 - o]).collect();
    pearson(&fine, &coarse).map_or(0.0, f64::abs)
}

/// Pearson correlation; `None` if either side has zero variance
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x.iter().copied())?;
    let my = mean(y.iter().copied())?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}
