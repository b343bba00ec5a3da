//! Lighthouse CLI and HTTP front end
//!
//! Usage:
//!   lighthouse replay --input ticks.jsonl  # Run recorded ticks, print signals
//!   lighthouse scan --symbols BTCUSDT,ETHUSDT  # Evaluate recent Binance klines
//!   lighthouse lattice --base-minutes 5 --count 12  # Print Fibonacci time knots
//!   lighthouse serve --port 3001  # Accept live ticks over HTTP

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use engine::{
    collect_ticks, run_batch, BinanceClient, EngineConfig, PipelineRunner, PipelineStats,
    RunnerHandle, RunnerOptions, Signal, TickMessage, TimeLattice,
};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));
const MAX_RECENT_SIGNALS: usize = 200;

#[derive(Parser)]
#[command(name = "lighthouse")]
#[command(about = "FTCP detection and consensus-confirmed trading signals", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config JSON (falls back to $LIGHTHOUSE_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines tick file through per-symbol pipelines
    Replay {
        /// Path to the tick file
        #[arg(long)]
        input: String,
    },
    /// Fetch recent Binance klines per symbol and evaluate them
    Scan {
        /// Symbols to scan (comma-separated)
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Kline interval
        #[arg(long, default_value = "5m")]
        interval: String,
        /// Number of klines per symbol
        #[arg(long, default_value_t = 500)]
        limit: u32,
    },
    /// Print the Fibonacci time lattice
    Lattice {
        /// Base interval in minutes (defaults to the config value)
        #[arg(long)]
        base_minutes: Option<i64>,
        /// Number of knots
        #[arg(long, default_value_t = 12)]
        count: usize,
        /// Lattice start (RFC 3339), defaults to now
        #[arg(long)]
        start: Option<String>,
    },
    /// Launch the tick ingestion web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
}

#[derive(Clone)]
struct AppState {
    config: Arc<EngineConfig>,
    runner: RunnerHandle,
    recent_signals: Arc<RwLock<VecDeque<Signal>>>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,lighthouse=debug")
    } else {
        EnvFilter::new("info,engine=info,lighthouse=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn load_config(path: Option<String>) -> anyhow::Result<EngineConfig> {
    let path = path.or_else(|| std::env::var("LIGHTHOUSE_CONFIG").ok());
    match path {
        Some(path) => {
            let config = EngineConfig::from_json_file(&path)
                .with_context(|| format!("Failed to load config from {path}"))?;
            info!("Loaded engine config from {}", path);
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Replay { input } => {
            cmd_replay(config, &input).await?;
        }
        Commands::Scan {
            symbols,
            interval,
            limit,
        } => {
            cmd_scan(config, symbols, &interval, limit).await?;
        }
        Commands::Lattice {
            base_minutes,
            count,
            start,
        } => {
            cmd_lattice(&config, base_minutes, count, start)?;
        }
        Commands::Serve { host, port } => {
            cmd_serve(config, &host, port).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Batch commands
// ============================================================================

fn print_signals(signals: &[Signal], stats: &[PipelineStats]) -> anyhow::Result<()> {
    for signal in signals {
        println!("{}", serde_json::to_string(signal)?);
    }

    eprintln!("\n=== Lighthouse v{} ===", APP_VERSION);
    eprintln!("{:<12} {:>9} {:>9} {:>8}", "symbol", "accepted", "rejected", "signals");
    for s in stats {
        eprintln!(
            "{:<12} {:>9} {:>9} {:>8}",
            s.symbol, s.accepted, s.rejected, s.signals
        );
    }
    let tradable = signals.iter().filter(|s| s.tier.is_tradable()).count();
    eprintln!("\n{} signals ({} tradable)", signals.len(), tradable);
    Ok(())
}

async fn cmd_replay(config: EngineConfig, input: &str) -> anyhow::Result<()> {
    let ticks = engine::feed::read_jsonl(input)
        .with_context(|| format!("Failed to read ticks from {input}"))?;
    info!(ticks = ticks.len(), "Replaying tick feed");

    let (signals, stats) = run_batch(config, ticks).await?;
    print_signals(&signals, &stats)
}

async fn cmd_scan(
    config: EngineConfig,
    symbols: Vec<String>,
    interval: &str,
    limit: u32,
) -> anyhow::Result<()> {
    let symbols = if symbols.is_empty() {
        vec![
            "BTCUSDT".to_string(),
            "ETHUSDT".to_string(),
            "SOLUSDT".to_string(),
            "XRPUSDT".to_string(),
        ]
    } else {
        symbols
    };
    info!(symbols = ?symbols, interval, limit, "Scanning Binance klines");

    let binance = BinanceClient::new()?;
    let ticks = collect_ticks(&binance, &symbols, interval, limit).await;
    if ticks.is_empty() {
        anyhow::bail!("No market data fetched for {}", symbols.join(", "));
    }

    let (signals, stats) = run_batch(config, ticks).await?;
    print_signals(&signals, &stats)
}

fn cmd_lattice(
    config: &EngineConfig,
    base_minutes: Option<i64>,
    count: usize,
    start: Option<String>,
) -> anyhow::Result<()> {
    let start = match start {
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .with_context(|| format!("Invalid start time {s}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let base = base_minutes.unwrap_or(config.base_interval_minutes);
    let knots = TimeLattice::new(start, base).knots(count)?;
    for knot in knots {
        println!(
            "#{:<3} {}  (+{} min)",
            knot.fibonacci_index,
            knot.timestamp.to_rfc3339(),
            (knot.timestamp - start).num_minutes()
        );
    }
    Ok(())
}

// ============================================================================
// Serve command: Axum web server
// ============================================================================

async fn cmd_serve(config: EngineConfig, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Lighthouse v{} starting...", APP_VERSION);

    let PipelineRunner {
        handle,
        mut signals,
        finished: _,
    } = PipelineRunner::spawn(
        config.clone(),
        RunnerOptions {
            coalesce: true,
            ..Default::default()
        },
    )?;

    let state = AppState {
        config: Arc::new(config),
        runner: handle,
        recent_signals: Arc::new(RwLock::new(VecDeque::with_capacity(MAX_RECENT_SIGNALS))),
    };

    let recent = state.recent_signals.clone();
    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            info!(
                symbol = %signal.symbol,
                signal = ?signal.signal_type,
                tier = signal.tier.number(),
                "{}",
                signal.reasoning
            );
            match recent.write() {
                Ok(mut buf) => {
                    buf.push_front(signal);
                    buf.truncate(MAX_RECENT_SIGNALS);
                }
                Err(e) => error!("Signal buffer poisoned: {}", e),
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/config", get(api_config))
        .route("/ticks", post(api_submit_tick))
        .route("/signals", get(api_signals))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Lighthouse v{} ===", APP_VERSION);
    println!("Signal Engine Server");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  GET  /api/config              - Active engine config");
    println!("  POST /api/ticks               - Ingest one tick");
    println!("  GET  /api/signals             - Most recent signals");
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": APP_VERSION,
    }))
}

/// GET /api/config: the engine thresholds in effect
async fn api_config(State(state): State<AppState>) -> Json<EngineConfig> {
    Json((*state.config).clone())
}

/// POST /api/ticks: queue one tick for its symbol's pipeline
async fn api_submit_tick(
    State(state): State<AppState>,
    Json(tick): Json<TickMessage>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let symbol = tick.symbol.clone();
    match state.runner.submit(tick).await {
        Ok(()) => Ok(Json(serde_json::json!({
            "success": true,
            "symbol": symbol,
        }))),
        Err(e) => {
            error!("Failed to queue tick: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[derive(Deserialize)]
struct SignalsQuery {
    limit: Option<usize>,
    symbol: Option<String>,
}

/// GET /api/signals: newest first, optionally filtered by symbol
async fn api_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let limit = params.limit.unwrap_or(20).min(MAX_RECENT_SIGNALS);
    let buf = state
        .recent_signals
        .read()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let data: Vec<&Signal> = buf
        .iter()
        .filter(|s| params.symbol.as_deref().map_or(true, |sym| s.symbol == sym))
        .take(limit)
        .collect();
    Ok(Json(serde_json::json!({
        "success": true,
        "data": data,
        "total": data.len(),
    })))
}
