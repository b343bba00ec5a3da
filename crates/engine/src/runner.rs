//! Multi-symbol fan-out
//!
//! A dispatcher task receives tagged ticks and forwards each one to the queue
//! of its symbol's pipeline task, spawning the pipeline on first sight. The
//! dispatcher is the only producer for every per-symbol queue, so arrival
//! order is preserved per symbol while symbols evaluate in parallel.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::coalesce::TickCoalescer;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::pipeline::SymbolPipeline;
use crate::types::{PricePoint, Signal, TickMessage};

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Capacity of each per-symbol tick queue and of the signal channel
    pub queue_depth: usize,
    /// Merge ticks per `coalesce_period_ms` before evaluation
    pub coalesce: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            queue_depth: 1024,
            coalesce: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub symbol: String,
    pub accepted: usize,
    pub rejected: usize,
    pub signals: usize,
}

/// Cloneable entry point for submitting ticks
#[derive(Clone)]
pub struct RunnerHandle {
    tx: mpsc::Sender<TickMessage>,
}

impl RunnerHandle {
    pub async fn submit(&self, tick: TickMessage) -> EngineResult<()> {
        let symbol = tick.symbol.clone();
        self.tx
            .send(tick)
            .await
            .map_err(|_| EngineError::PipelineClosed { symbol })
    }
}

pub struct PipelineRunner {
    pub handle: RunnerHandle,
    pub signals: mpsc::Receiver<Signal>,
    /// Resolves with per-symbol stats once every handle is dropped
    pub finished: JoinHandle<Vec<PipelineStats>>,
}

impl PipelineRunner {
    pub fn spawn(config: EngineConfig, options: RunnerOptions) -> EngineResult<Self> {
        config.validate()?;
        let depth = options.queue_depth.max(1);
        let (tick_tx, tick_rx) = mpsc::channel(depth);
        let (signal_tx, signal_rx) = mpsc::channel(depth);

        let finished = tokio::spawn(dispatch(config, options, tick_rx, signal_tx));

        Ok(Self {
            handle: RunnerHandle { tx: tick_tx },
            signals: signal_rx,
            finished,
        })
    }
}

async fn dispatch(
    config: EngineConfig,
    options: RunnerOptions,
    mut ticks: mpsc::Receiver<TickMessage>,
    signals: mpsc::Sender<Signal>,
) -> Vec<PipelineStats> {
    let mut queues: HashMap<String, mpsc::Sender<PricePoint>> = HashMap::new();
    let mut tasks: Vec<JoinHandle<PipelineStats>> = Vec::new();

    while let Some(tick) = ticks.recv().await {
        if !queues.contains_key(&tick.symbol) {
            let pipeline = match SymbolPipeline::new(tick.symbol.clone(), config.clone()) {
                Ok(p) => p,
                Err(e) => {
                    error!(symbol = %tick.symbol, "Failed to start pipeline: {}", e);
                    continue;
                }
            };
            let (tx, rx) = mpsc::channel(options.queue_depth.max(1));
            let coalescer = options
                .coalesce
                .then(|| TickCoalescer::new(config.coalesce_period_ms));
            info!(symbol = %tick.symbol, "Starting symbol pipeline");
            tasks.push(tokio::spawn(run_symbol(pipeline, rx, signals.clone(), coalescer)));
            queues.insert(tick.symbol.clone(), tx);
        }

        let point = tick.point();
        if let Some(queue) = queues.get(&tick.symbol) {
            if queue.send(point).await.is_err() {
                error!(symbol = %tick.symbol, "Symbol pipeline stopped, dropping tick");
                queues.remove(&tick.symbol);
            }
        }
    }

    drop(queues);
    drop(signals);

    let mut stats = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(s) => stats.push(s),
            Err(e) => error!("Symbol pipeline task failed: {}", e),
        }
    }
    stats.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    stats
}

async fn run_symbol(
    mut pipeline: SymbolPipeline,
    mut rx: mpsc::Receiver<PricePoint>,
    signals: mpsc::Sender<Signal>,
    mut coalescer: Option<TickCoalescer>,
) -> PipelineStats {
    let mut stats = PipelineStats {
        symbol: pipeline.symbol().to_string(),
        ..Default::default()
    };

    while let Some(tick) = rx.recv().await {
        let ready = match coalescer.as_mut() {
            Some(c) => match c.push(tick) {
                Ok(bar) => bar,
                Err(_) => {
                    stats.rejected += 1;
                    continue;
                }
            },
            None => Some(tick),
        };
        if let Some(tick) = ready {
            evaluate(&mut pipeline, tick, &signals, &mut stats).await;
        }
    }
    if let Some(tick) = coalescer.as_mut().and_then(TickCoalescer::flush) {
        evaluate(&mut pipeline, tick, &signals, &mut stats).await;
    }

    debug!(
        symbol = %stats.symbol,
        accepted = stats.accepted,
        rejected = stats.rejected,
        signals = stats.signals,
        "Symbol pipeline finished"
    );
    stats
}

async fn evaluate(
    pipeline: &mut SymbolPipeline,
    tick: PricePoint,
    signals: &mpsc::Sender<Signal>,
    stats: &mut PipelineStats,
) {
    match pipeline.ingest(tick) {
        Ok(evaluation) => {
            stats.accepted += 1;
            if let Some(signal) = evaluation.signal {
                stats.signals += 1;
                if signals.send(signal).await.is_err() {
                    debug!(symbol = %stats.symbol, "Signal receiver dropped");
                }
            }
        }
        Err(_) => stats.rejected += 1,
    }
}

/// Run a finite batch of tagged ticks through a fresh runner and collect
/// every signal, ordered by (timestamp, symbol)
pub async fn run_batch(
    config: EngineConfig,
    ticks: Vec<TickMessage>,
) -> EngineResult<(Vec<Signal>, Vec<PipelineStats>)> {
    let PipelineRunner {
        handle,
        mut signals,
        finished,
    } = PipelineRunner::spawn(config, RunnerOptions::default())?;

    let producer = tokio::spawn(async move {
        for tick in ticks {
            handle.submit(tick).await?;
        }
        Ok::<_, EngineError>(())
    });

    let mut collected = Vec::new();
    while let Some(signal) = signals.recv().await {
        collected.push(signal);
    }

    match producer.await {
        Ok(result) => result?,
        Err(e) => error!("Tick producer task failed: {}", e),
    }
    let stats = finished.await.unwrap_or_else(|e| {
        error!("Dispatcher task failed: {}", e);
        Vec::new()
    });

    collected.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    Ok((collected, stats))
}
