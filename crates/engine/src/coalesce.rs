//! Ingestion-side coalescing for feeds that tick faster than one evaluation
//! period. Within a period the latest price wins and volumes add up.
//!
//! Each raw tick is validated before it is folded in, so a malformed or
//! regressed tick is dropped on its own and the open bar keeps its state.

use tracing::warn;

use crate::error::TickRejection;
use crate::types::PricePoint;

#[derive(Debug, Clone)]
pub struct TickCoalescer {
    period_ms: i64,
    bucket: Option<i64>,
    pending: Option<PricePoint>,
    /// Newest raw timestamp accepted, kept across emitted bars and flushes
    last_timestamp: Option<i64>,
}

impl TickCoalescer {
    pub fn new(period_ms: i64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            bucket: None,
            pending: None,
            last_timestamp: None,
        }
    }

    fn bucket_of(&self, timestamp: i64) -> i64 {
        timestamp.div_euclid(self.period_ms)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    /// Fold a raw tick in. Returns the finished bar of the previous period
    /// once a tick from a later period arrives. Ticks that fail validation or
    /// do not advance past the newest accepted timestamp are rejected.
    pub fn push(&mut self, tick: PricePoint) -> Result<Option<PricePoint>, TickRejection> {
        if let Err(rejection) = tick.validate(self.last_timestamp) {
            warn!(timestamp = tick.timestamp, error = %rejection, "Dropping raw tick");
            return Err(rejection);
        }
        self.last_timestamp = Some(tick.timestamp);

        let bucket = self.bucket_of(tick.timestamp);
        if let (Some(open), Some(pending)) = (self.bucket, self.pending.as_mut()) {
            if bucket == open {
                pending.price = tick.price;
                pending.volume += tick.volume;
                pending.timestamp = tick.timestamp;
                return Ok(None);
            }
        }
        self.bucket = Some(bucket);
        Ok(self.pending.replace(tick))
    }

    /// Emit whatever is pending, e.g. at end of stream
    pub fn flush(&mut self) -> Option<PricePoint> {
        self.bucket = None;
        self.pending.take()
    }
}
