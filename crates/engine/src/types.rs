//! Types shared across the signal pipeline

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TickRejection;

/// A single candlestick (OHLCV) as delivered by the market-data client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

/// One market sample. Timestamps are unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
    pub volume: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            price,
            volume,
        }
    }

    /// Collapse a kline into a tick stamped at its open time
    pub fn from_kline(kline: &Kline) -> Self {
        Self {
            timestamp: kline.open_time,
            price: kline.close.to_f64().unwrap_or(f64::NAN),
            volume: kline.volume.to_f64().unwrap_or(f64::NAN),
        }
    }

    /// Ingestion rules: finite positive price, finite non-negative volume,
    /// and a timestamp strictly after `last_timestamp`
    pub fn validate(&self, last_timestamp: Option<i64>) -> Result<(), TickRejection> {
        if !self.price.is_finite() {
            return Err(TickRejection::NonFiniteValue {
                field: "price",
                value: self.price,
            });
        }
        if !self.volume.is_finite() {
            return Err(TickRejection::NonFiniteValue {
                field: "volume",
                value: self.volume,
            });
        }
        if self.price <= 0.0 {
            return Err(TickRejection::NonPositivePrice(self.price));
        }
        if self.volume < 0.0 {
            return Err(TickRejection::NegativeVolume(self.volume));
        }
        match last_timestamp {
            Some(last) if self.timestamp <= last => Err(TickRejection::NonMonotonicTimestamp {
                last,
                got: self.timestamp,
            }),
            _ => Ok(()),
        }
    }
}

/// A tick tagged with the symbol it belongs to (feed / HTTP wire shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickMessage {
    pub symbol: String,
    pub timestamp: i64,
    pub price: f64,
    pub volume: f64,
}

impl TickMessage {
    pub fn point(&self) -> PricePoint {
        PricePoint::new(self.timestamp, self.price, self.volume)
    }
}

/// Discrete second derivative over the newest three samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurvatureSample {
    /// price / sec²
    pub kappa: f64,
    /// seconds between prev and curr
    pub dt1: f64,
    /// seconds between curr and next
    pub dt2: f64,
}

impl CurvatureSample {
    /// dt2 / dt1, or `None` when the first interval is degenerate
    pub fn interval_ratio(&self) -> Option<f64> {
        if self.dt1 > 0.0 && self.dt2 > 0.0 {
            Some(self.dt2 / self.dt1)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtcpEvent {
    pub timestamp: i64,
    pub kappa: f64,
    pub threshold: f64,
    pub golden_ratio_match: bool,
    pub is_ftcp: bool,
}

/// The five consensus inputs, each already in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub linear_coherence: f64,
    pub nonlinear_coherence: f64,
    pub cross_scale_coherence: f64,
    pub effective_gravity: f64,
    pub anomaly_pointer: f64,
}

impl MetricSnapshot {
    /// Fixed order used by the consensus weights
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.linear_coherence,
            self.nonlinear_coherence,
            self.cross_scale_coherence,
            self.effective_gravity,
            self.anomaly_pointer,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LighthouseSample {
    pub timestamp: i64,
    pub intensity: f64,
    pub inputs: MetricSnapshot,
}

/// A statistically and structurally confirmed consensus peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseEvent {
    pub timestamp: i64,
    pub intensity: f64,
    pub threshold: f64,
    pub confidence: f64,
    pub linked_ftcp: FtcpEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

/// Confidence bucket; drives the downstream size multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    pub fn number(self) -> u8 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }

    /// Tier 3 carries no trade
    pub fn is_tradable(self) -> bool {
        !matches!(self, Tier::Three)
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::One),
            2 => Ok(Tier::Two),
            3 => Ok(Tier::Three),
            other => Err(format!("invalid tier {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurvatureDirection {
    Up,
    Down,
    Flat,
}

impl CurvatureDirection {
    pub fn of(kappa: f64) -> Self {
        if kappa > 0.0 {
            CurvatureDirection::Up
        } else if kappa < 0.0 {
            CurvatureDirection::Down
        } else {
            CurvatureDirection::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseSummary {
    #[serde(rename = "L")]
    pub intensity: f64,
    pub is_lhe: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoherenceSummary {
    pub linear: f64,
    pub nonlinear: f64,
    pub cross_scale: f64,
}

/// Output record handed to the execution collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub timestamp: i64,
    pub signal_type: SignalType,
    pub tier: Tier,
    pub confidence: f64,
    pub curvature: f64,
    pub curvature_direction: CurvatureDirection,
    pub ftcp_detected: bool,
    pub golden_ratio_score: f64,
    pub lighthouse: LighthouseSummary,
    pub coherence: CoherenceSummary,
    pub anomaly_pointer: f64,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_point_from_kline_uses_close_and_open_time() {
        let kline = Kline {
            open_time: 60_000,
            open: dec!(99.5),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.25),
            volume: dec!(12.5),
            close_time: 119_999,
        };
        let point = PricePoint::from_kline(&kline);
        assert_eq!(point.timestamp, 60_000);
        assert_eq!(point.price, 100.25);
        assert_eq!(point.volume, 12.5);
    }

    #[test]
    fn test_validate_rules() {
        assert!(PricePoint::new(10, 1.0, 0.0).validate(Some(9)).is_ok());
        assert!(PricePoint::new(10, 1.0, 0.0).validate(None).is_ok());
        assert_eq!(
            PricePoint::new(10, 1.0, 1.0).validate(Some(10)),
            Err(TickRejection::NonMonotonicTimestamp { last: 10, got: 10 })
        );
        assert!(matches!(
            PricePoint::new(10, f64::INFINITY, 1.0).validate(None),
            Err(TickRejection::NonFiniteValue { field: "price", .. })
        ));
        assert_eq!(
            PricePoint::new(10, 0.0, 1.0).validate(None),
            Err(TickRejection::NonPositivePrice(0.0))
        );
        assert_eq!(
            PricePoint::new(10, 1.0, -2.0).validate(None),
            Err(TickRejection::NegativeVolume(-2.0))
        );
    }

    #[test]
    fn test_interval_ratio_degenerate() {
        let sample = CurvatureSample {
            kappa: 0.0,
            dt1: 0.0,
            dt2: 3.0,
        };
        assert!(sample.interval_ratio().is_none());
    }

    #[test]
    fn test_tier_serializes_as_number() {
        let json = serde_json::to_string(&Tier::Two).unwrap();
        assert_eq!(json, "2");
        let tier: Tier = serde_json::from_str("1").unwrap();
        assert_eq!(tier, Tier::One);
        assert!(serde_json::from_str::<Tier>("4").is_err());
    }

    #[test]
    fn test_curvature_direction_sign() {
        assert_eq!(CurvatureDirection::of(0.5), CurvatureDirection::Up);
        assert_eq!(CurvatureDirection::of(-0.5), CurvatureDirection::Down);
        assert_eq!(CurvatureDirection::of(0.0), CurvatureDirection::Flat);
    }
}
