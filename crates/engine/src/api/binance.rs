//! Binance public API client for market data (no authentication required)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use super::MarketDataSource;
use crate::types::{Kline, PricePoint};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Binance public market data client
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

/// Raw kline data from Binance API (array of arrays)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base
    String, // 10: Taker buy quote
    String, // 11: Ignore
);

impl RawKline {
    fn into_kline(self) -> Option<Kline> {
        Some(Kline {
            open_time: self.0,
            open: Decimal::from_str(&self.1).ok()?,
            high: Decimal::from_str(&self.2).ok()?,
            low: Decimal::from_str(&self.3).ok()?,
            close: Decimal::from_str(&self.4).ok()?,
            volume: Decimal::from_str(&self.5).ok()?,
            close_time: self.6,
        })
    }
}

impl BinanceClient {
    /// Create a new Binance client with default base URL
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetch klines (candlestick data) for a symbol
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}",
            self.base_url, symbol, interval
        );

        if let Some(start) = start_time {
            url.push_str(&format!("&startTime={}", start));
        }
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end));
        }

        let limit = limit.unwrap_or(500).min(MAX_KLINES_PER_REQUEST);
        url.push_str(&format!("&limit={}", limit));

        debug!(symbol, interval, "Fetching klines from Binance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_klines: Vec<RawKline> = response.json().await?;
        let klines: Vec<Kline> = raw_klines
            .into_iter()
            .filter_map(RawKline::into_kline)
            .collect();

        debug!(count = klines.len(), "Fetched klines");
        Ok(klines)
    }

    /// Fetch klines with automatic pagination for ranges > 1000 bars
    pub async fn get_klines_paginated(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<Kline>> {
        let mut all_klines = Vec::new();
        let mut current_start = start_time;

        info!(symbol, interval, "Fetching paginated klines from Binance");

        while current_start < end_time {
            let klines = self
                .get_klines(
                    symbol,
                    interval,
                    Some(current_start),
                    Some(end_time),
                    Some(MAX_KLINES_PER_REQUEST),
                )
                .await?;

            let Some(last_close_time) = klines.last().map(|k| k.close_time) else {
                break;
            };
            all_klines.extend(klines);

            // Move start to after the last candle
            current_start = last_close_time + 1;

            // Small delay to respect rate limits
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        info!(total = all_klines.len(), "Paginated kline fetch complete");
        Ok(all_klines)
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_ticks(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<PricePoint>> {
        let klines = if limit <= MAX_KLINES_PER_REQUEST {
            self.get_klines(symbol, interval, None, None, Some(limit))
                .await?
        } else {
            let end = chrono::Utc::now().timestamp_millis();
            let span = interval_millis(interval)
                .with_context(|| format!("Unsupported interval {interval}"))?;
            let start = span
                .checked_mul(i64::from(limit))
                .and_then(|lookback| end.checked_sub(lookback))
                .with_context(|| format!("Lookback of {limit} x {interval} overflows"))?;
            self.get_klines_paginated(symbol, interval, start, end)
                .await?
        };
        Ok(klines.iter().map(PricePoint::from_kline).collect())
    }
}

/// Length of a Binance kline interval string ("1m", "4h", "1d", ...) in ms
pub fn interval_millis(interval: &str) -> Option<i64> {
    let (split, unit) = interval.char_indices().last()?;
    let count: i64 = interval[..split].parse().ok()?;
    let unit_ms = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 604_800_000,
        _ => return None,
    };
    count.checked_mul(unit_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_kline_decodes() {
        let json = r#"[[1700000000000,"100.1","101.0","99.5","100.7","12.5",1700000059999,"1258.75",42,"6.0","604.2","0"]]"#;
        let raw: Vec<RawKline> = serde_json::from_str(json).unwrap();
        let kline = raw.into_iter().next().and_then(RawKline::into_kline).unwrap();
        assert_eq!(kline.open_time, 1_700_000_000_000);
        let point = PricePoint::from_kline(&kline);
        assert!((point.price - 100.7).abs() < 1e-9);
        assert_eq!(point.volume, 12.5);
    }

    #[test]
    fn test_raw_kline_bad_number_is_skipped() {
        let json = r#"[1,"x","1","1","1","1",2,"1",1,"1","1","0"]"#;
        let raw: RawKline = serde_json::from_str(json).unwrap();
        assert!(raw.into_kline().is_none());
    }

    #[test]
    fn test_interval_millis() {
        assert_eq!(interval_millis("1m"), Some(60_000));
        assert_eq!(interval_millis("15m"), Some(900_000));
        assert_eq!(interval_millis("4h"), Some(14_400_000));
        assert_eq!(interval_millis("1d"), Some(86_400_000));
        assert_eq!(interval_millis("3x"), None);
        assert_eq!(interval_millis(""), None);
        assert_eq!(interval_millis("1µ"), None);
        assert_eq!(interval_millis("µ"), None);
        assert_eq!(interval_millis("9223372036854775807w"), None);
    }
}
