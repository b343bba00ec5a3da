//! Fibonacci time lattice
//!
//! Knot `i` sits at `start + base_interval · F(i)` minutes with F(0)=0, F(1)=1.
//! Note F(1) = F(2), so knots 1 and 2 coincide.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeKnot {
    pub fibonacci_index: usize,
    pub timestamp: DateTime<Utc>,
}

impl TimeKnot {
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// First `count` Fibonacci numbers, or the index at which i64 overflows
pub fn fibonacci(count: usize) -> Result<Vec<i64>, usize> {
    let mut seq: Vec<i64> = Vec::with_capacity(count);
    for i in 0..count {
        let next = match i {
            0 => 0,
            1 => 1,
            _ => seq[i - 1].checked_add(seq[i - 2]).ok_or(i)?,
        };
        seq.push(next);
    }
    Ok(seq)
}

#[derive(Debug, Clone)]
pub struct TimeLattice {
    start: DateTime<Utc>,
    base_interval_minutes: i64,
}

impl TimeLattice {
    pub fn new(start: DateTime<Utc>, base_interval_minutes: i64) -> Self {
        Self {
            start,
            base_interval_minutes,
        }
    }

    /// Anchor a lattice at a unix-millisecond timestamp
    pub fn from_millis(start_ms: i64, base_interval_minutes: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(start_ms)
            .map(|start| Self::new(start, base_interval_minutes))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Generate the first `count` knots in order
    pub fn knots(&self, count: usize) -> EngineResult<Vec<TimeKnot>> {
        let fib = fibonacci(count).map_err(|index| EngineError::LatticeOverflow { index })?;
        fib.into_iter()
            .enumerate()
            .map(|(index, f)| {
                let offset = f
                    .checked_mul(self.base_interval_minutes)
                    .and_then(Duration::try_minutes)
                    .and_then(|d| self.start.checked_add_signed(d))
                    .ok_or(EngineError::LatticeOverflow { index })?;
                Ok(TimeKnot {
                    fibonacci_index: index,
                    timestamp: offset,
                })
            })
            .collect()
    }

    /// Nearest knot to `timestamp_ms` and the signed offset to it in ms.
    /// Returns `None` before the lattice start.
    pub fn nearest_knot(&self, timestamp_ms: i64) -> Option<(TimeKnot, i64)> {
        let start_ms = self.start.timestamp_millis();
        if timestamp_ms < start_ms || self.base_interval_minutes <= 0 {
            return None;
        }
        let step_ms = self.base_interval_minutes.checked_mul(60_000)?;

        let (mut prev, mut curr) = (0i64, 1i64);
        let mut best: Option<(usize, i64)> = None;
        for index in 0.. {
            let f = if index == 0 { 0 } else { curr };
            let knot_ms = match f.checked_mul(step_ms).and_then(|d| start_ms.checked_add(d)) {
                Some(ms) => ms,
                None => break,
            };
            let offset = timestamp_ms - knot_ms;
            if best.map_or(true, |(_, b)| offset.abs() < b.abs()) {
                best = Some((index, offset));
            }
            if knot_ms > timestamp_ms {
                break;
            }
            if index > 0 {
                let next = match prev.checked_add(curr) {
                    Some(n) => n,
                    None => break,
                };
                prev = curr;
                curr = next;
            }
        }

        let (index, offset) = best?;
        let knot_ms = timestamp_ms - offset;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(knot_ms)?;
        Some((
            TimeKnot {
                fibonacci_index: index,
                timestamp,
            },
            offset,
        ))
    }
}
