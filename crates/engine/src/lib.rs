//! Lighthouse signal engine: FTCP detection and consensus-confirmed signals
//!
//! Turns a per-symbol stream of (timestamp, price, volume) ticks into rare,
//! tiered BUY/SELL/HOLD signals. Provides:
//! - Fibonacci time lattice and golden-ratio interval validation
//! - Curvature-based FTCP detection with an adaptive percentile threshold
//! - Coherence bank, effective gravity and anomaly pointer metrics
//! - Geometric-mean Lighthouse consensus with z-score event confirmation
//! - Per-symbol pipelines, multi-symbol runner and a Binance market-data client

pub mod anomaly;
pub mod api;
pub mod classifier;
pub mod coalesce;
pub mod coherence;
pub mod config;
pub mod confirm;
pub mod consensus;
pub mod curvature;
pub mod error;
pub mod feed;
pub mod gravity;
pub mod lattice;
pub mod pipeline;
pub mod runner;
pub mod types;
pub mod window;

// Re-exports for convenience
pub use api::{collect_ticks, BinanceClient, MarketDataSource};
pub use coalesce::TickCoalescer;
pub use config::{EngineConfig, Rescale};
pub use error::{EngineError, EngineResult, TickRejection};
pub use lattice::{TimeKnot, TimeLattice};
pub use pipeline::{Evaluation, SymbolPipeline};
pub use runner::{run_batch, PipelineRunner, PipelineStats, RunnerHandle, RunnerOptions};
pub use types::*;
