//! Market-data collaborators that feed the pipelines

pub mod binance;

pub use binance::BinanceClient;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::types::{PricePoint, TickMessage};

/// Anything that can hand over an ordered tick history for a symbol
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_ticks(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<PricePoint>>;
}

/// Fetch every symbol and tag its ticks. Symbols that fail are logged and
/// skipped so one bad market does not sink the batch.
pub async fn collect_ticks(
    source: &dyn MarketDataSource,
    symbols: &[String],
    interval: &str,
    limit: u32,
) -> Vec<TickMessage> {
    let mut tagged = Vec::new();
    for symbol in symbols {
        match source.fetch_ticks(symbol, interval, limit).await {
            Ok(points) => tagged.extend(points.into_iter().map(|p| TickMessage {
                symbol: symbol.clone(),
                timestamp: p.timestamp,
                price: p.price,
                volume: p.volume,
            })),
            Err(e) => warn!(source = source.name(), symbol = %symbol, "Fetch failed: {:#}", e),
        }
    }
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource;

    #[async_trait]
    impl MarketDataSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_ticks(&self, symbol: &str, _interval: &str, limit: u32) -> Result<Vec<PricePoint>> {
            if symbol == "BROKEN" {
                anyhow::bail!("no such market");
            }
            Ok((0..limit as i64)
                .map(|i| PricePoint::new(i * 60_000, 100.0 + i as f64, 1.0))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_collect_tags_and_skips_failures() {
        let symbols = vec!["BTCUSDT".to_string(), "BROKEN".to_string(), "ETHUSDT".to_string()];
        let ticks = collect_ticks(&FixedSource, &symbols, "1m", 3).await;
        assert_eq!(ticks.len(), 6);
        assert!(ticks[..3].iter().all(|t| t.symbol == "BTCUSDT"));
        assert_eq!(ticks[5].symbol, "ETHUSDT");
        assert_eq!(ticks[5].price, 102.0);
    }
}
