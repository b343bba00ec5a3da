//! Bounded rolling storage and the statistics computed over it

use std::collections::VecDeque;

use crate::config::Rescale;

/// Fixed-capacity FIFO; pushing past capacity evicts the oldest entry
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    capacity: usize,
    values: VecDeque<T>,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a value, returning the evicted one if the window was full
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.values.len() == self.capacity {
            self.values.pop_front()
        } else {
            None
        };
        self.values.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.values.back()
    }

    /// Element `n` positions back from the newest (0 = newest)
    pub fn back(&self, n: usize) -> Option<&T> {
        let len = self.values.len();
        if n >= len {
            return None;
        }
        self.values.get(len - 1 - n)
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.values.iter()
    }

    /// The newest `n` entries, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.values.len().saturating_sub(n);
        self.values.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl RollingWindow<f64> {
    pub fn mean(&self) -> Option<f64> {
        mean(self.values.iter().copied())
    }

    pub fn std_dev(&self) -> Option<f64> {
        std_dev(self.values.iter().copied())
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        let mut sorted: Vec<f64> = self.values.iter().copied().collect();
        percentile_of(&mut sorted, p)
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values.iter().copied().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Population standard deviation
pub fn std_dev(values: impl Iterator<Item = f64> + Clone) -> Option<f64> {
    let mu = mean(values.clone())?;
    let (sq, n) = values.fold((0.0, 0usize), |(s, n), v| (s + (v - mu).powi(2), n + 1));
    Some((sq / n as f64).sqrt())
}

/// p-th percentile (0..=100) with linear interpolation between closest ranks.
/// Sorts `values` in place.
pub fn percentile_of(values: &mut [f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

/// Keeps the recent history of an unbounded score and maps the newest value
/// into [0, 1]. Degenerate windows (flat or empty) map to 0.
#[derive(Debug, Clone)]
pub struct RollingNormalizer {
    window: RollingWindow<f64>,
    method: Rescale,
}

impl RollingNormalizer {
    pub fn new(capacity: usize, method: Rescale) -> Self {
        Self {
            window: RollingWindow::new(capacity),
            method,
        }
    }

    /// Record `raw` and return its normalized value against the window
    pub fn push(&mut self, raw: f64) -> f64 {
        let raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
        self.window.push(raw);

        let normalized = match self.method {
            Rescale::MinMax => match self.window.min_max() {
                Some((lo, hi)) if hi > lo => (raw - lo) / (hi - lo),
                _ => 0.0,
            },
            Rescale::PercentileClamp { percentile } => {
                match self.window.percentile(percentile) {
                    Some(p) if p > 0.0 => raw / p,
                    // every value at or below the percentile is zero
                    _ if raw > 0.0 => 1.0,
                    _ => 0.0,
                }
            }
        };
        normalized.clamp(0.0, 1.0)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
