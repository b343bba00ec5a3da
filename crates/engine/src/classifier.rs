//! Maps a confirmed Lighthouse Event into a tiered BUY/SELL/HOLD call

use crate::coherence::CoherenceReading;
use crate::types::{CurvatureDirection, SignalType, Tier};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub signal_type: SignalType,
    pub tier: Tier,
    /// Confidence after directional boosts
    pub confidence: f64,
    pub boosted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalClassifier {
    signal_floor: f64,
    tier1_floor: f64,
    tier2_floor: f64,
    boost: f64,
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::new(60.0, 80.0, 60.0, 5.0)
    }
}

impl SignalClassifier {
    pub fn new(signal_floor: f64, tier1_floor: f64, tier2_floor: f64, boost: f64) -> Self {
        Self {
            signal_floor,
            tier1_floor,
            tier2_floor,
            boost,
        }
    }

    /// Lower floors are inclusive of the higher tier
    pub fn tier(&self, confidence: f64) -> Tier {
        if confidence >= self.tier1_floor {
            Tier::One
        } else if confidence >= self.tier2_floor {
            Tier::Two
        } else {
            Tier::Three
        }
    }

    pub fn classify(
        &self,
        kappa: f64,
        confidence: f64,
        coherence: &CoherenceReading,
    ) -> Classification {
        let bias = match CurvatureDirection::of(kappa) {
            CurvatureDirection::Up => SignalType::Buy,
            CurvatureDirection::Down => SignalType::Sell,
            CurvatureDirection::Flat => SignalType::Hold,
        };

        let boosted = match bias {
            SignalType::Buy => coherence.cross_scale_rising,
            SignalType::Sell => coherence.linear_breakdown,
            SignalType::Hold => false,
        };
        let confidence = if boosted {
            (confidence + self.boost).min(100.0)
        } else {
            confidence
        }
        .clamp(0.0, 100.0);

        let signal_type = if confidence > self.signal_floor {
            bias
        } else {
            SignalType::Hold
        };

        Classification {
            signal_type,
            tier: self.tier(confidence),
            confidence,
            boosted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let c = SignalClassifier::default();
        assert_eq!(c.tier(85.0), Tier::One);
        assert_eq!(c.tier(80.0), Tier::One);
        assert_eq!(c.tier(79.999), Tier::Two);
        assert_eq!(c.tier(70.0), Tier::Two);
        assert_eq!(c.tier(60.0), Tier::Two);
        assert_eq!(c.tier(40.0), Tier::Three);
        assert!(!c.tier(40.0).is_tradable());
    }

    #[test]
    fn test_direction_follows_curvature() {
        let c = SignalClassifier::default();
        let neutral = CoherenceReading::default();
        assert_eq!(c.classify(0.5, 90.0, &neutral).signal_type, SignalType::Buy);
        assert_eq!(c.classify(-0.5, 90.0, &neutral).signal_type, SignalType::Sell);
        assert_eq!(c.classify(0.0, 90.0, &neutral).signal_type, SignalType::Hold);
    }

    #[test]
    fn test_low_confidence_holds() {
        let c = SignalClassifier::default();
        let neutral = CoherenceReading::default();
        let result = c.classify(0.5, 60.0, &neutral);
        assert_eq!(result.signal_type, SignalType::Hold);
        assert_eq!(result.tier, Tier::Two);

        let result = c.classify(-0.5, 30.0, &neutral);
        assert_eq!(result.signal_type, SignalType::Hold);
        assert_eq!(result.tier, Tier::Three);
    }

    #[test]
    fn test_rising_cross_scale_boosts_buy_only() {
        let c = SignalClassifier::default();
        let rising = CoherenceReading {
            cross_scale_rising: true,
            ..Default::default()
        };
        let buy = c.classify(0.5, 58.0, &rising);
        assert!(buy.boosted);
        assert_eq!(buy.confidence, 63.0);
        assert_eq!(buy.signal_type, SignalType::Buy);

        let sell = c.classify(-0.5, 58.0, &rising);
        assert!(!sell.boosted);
        assert_eq!(sell.signal_type, SignalType::Hold);
    }

    #[test]
    fn test_linear_breakdown_boosts_sell_and_caps() {
        let c = SignalClassifier::default();
        let breakdown = CoherenceReading {
            linear_breakdown: true,
            ..Default::default()
        };
        let sell = c.classify(-0.5, 98.0, &breakdown);
        assert!(sell.boosted);
        assert_eq!(sell.confidence, 100.0);
        assert_eq!(sell.tier, Tier::One);
    }
}
