//! Error types for the signal engine

use thiserror::Error;

/// Why a tick was dropped at ingestion. Buffers are never touched on rejection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickRejection {
    #[error("non-finite {field}: {value}")]
    NonFiniteValue { field: &'static str, value: f64 },

    #[error("non-positive price: {0}")]
    NonPositivePrice(f64),

    #[error("negative volume: {0}")]
    NegativeVolume(f64),

    #[error("timestamp {got} does not advance past {last}")]
    NonMonotonicTimestamp { last: i64, got: i64 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fibonacci lattice overflows at knot {index}")]
    LatticeOverflow { index: usize },

    #[error("Feed error at line {line}: {message}")]
    Feed { line: usize, message: String },

    #[error("Pipeline for {symbol} is no longer running")]
    PipelineClosed { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
