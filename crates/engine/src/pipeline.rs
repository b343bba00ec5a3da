//! Per-symbol signal pipeline
//!
//! One `SymbolPipeline` owns every rolling buffer for one symbol. Each accepted
//! tick runs the full chain synchronously:
//!
//! ```text
//! tick → curvature + golden ratio → FTCP gate → gravity ─┐
//!      → coherence bank ─────────────────────────────────┼→ consensus L → LHE → Signal
//!      → anomaly pointer ────────────────────────────────┘
//! ```
//!
//! Ticks must arrive in timestamp order; anything else is rejected without
//! touching state.

use tracing::{info, warn};

use crate::anomaly::{AnomalyPointer, AnomalyReading};
use crate::classifier::SignalClassifier;
use crate::coherence::{CoherenceBank, CoherenceReading};
use crate::confirm::{Confirmation, EventConfirmer};
use crate::config::EngineConfig;
use crate::consensus::ConsensusAggregator;
use crate::curvature::{curvature_of, golden_ratio_score, FtcpDetector};
use crate::error::{EngineResult, TickRejection};
use crate::gravity::{GravityReading, GravityScorer};
use crate::lattice::TimeLattice;
use crate::types::*;
use crate::window::RollingWindow;

/// Everything computed for one accepted tick
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub timestamp: i64,
    pub curvature: CurvatureSample,
    pub ftcp: FtcpEvent,
    pub gravity: GravityReading,
    pub anomaly: AnomalyReading,
    pub coherence: CoherenceReading,
    pub metrics: MetricSnapshot,
    pub lighthouse: LighthouseSample,
    pub confirmation: Confirmation,
    pub signal: Option<Signal>,
}

pub struct SymbolPipeline {
    symbol: String,
    config: EngineConfig,
    ticks: RollingWindow<PricePoint>,
    detector: FtcpDetector,
    gravity: GravityScorer,
    coherence: CoherenceBank,
    anomaly: AnomalyPointer,
    consensus: ConsensusAggregator,
    confirmer: EventConfirmer,
    classifier: SignalClassifier,
    lattice: Option<TimeLattice>,
    signals_emitted: usize,
}

impl SymbolPipeline {
    pub fn new(symbol: impl Into<String>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            symbol: symbol.into(),
            ticks: RollingWindow::new(config.price_buffer_capacity),
            detector: FtcpDetector::new(
                config.curvature_window,
                config.curvature_percentile,
                config.golden_ratio_tolerance,
                config.min_curvature_samples,
            ),
            gravity: GravityScorer::new(
                config.gravity_alpha,
                config.golden_ratio_tolerance,
                config.curvature_window,
                config.rescale,
            ),
            coherence: CoherenceBank::new(
                config.coherence_window,
                config.ema_fast_span,
                config.ema_slow_span,
            )?,
            anomaly: AnomalyPointer::new(
                config.coherence_window,
                config.curvature_window,
                config.rescale,
            ),
            consensus: ConsensusAggregator::new(config.consensus_weights),
            confirmer: EventConfirmer::new(
                config.lighthouse_history_capacity,
                config.min_history_for_confirmation,
                config.z_score_multiplier,
            ),
            classifier: SignalClassifier::new(
                config.signal_confidence_floor,
                config.tier1_floor,
                config.tier2_floor,
                config.coherence_boost,
            ),
            lattice: None,
            signals_emitted: 0,
            config,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ticks currently buffered
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.ticks.last().map(|t| t.timestamp)
    }

    pub fn signals_emitted(&self) -> usize {
        self.signals_emitted
    }

    /// Validate, buffer and evaluate one tick
    pub fn ingest(&mut self, tick: PricePoint) -> Result<Evaluation, TickRejection> {
        if let Err(rejection) = tick.validate(self.last_timestamp()) {
            warn!(symbol = %self.symbol, error = %rejection, "Dropping tick");
            return Err(rejection);
        }

        if self.lattice.is_none() {
            self.lattice = TimeLattice::from_millis(tick.timestamp, self.config.base_interval_minutes);
        }
        self.ticks.push(tick);

        let recent: Vec<PricePoint> = self.ticks.tail(self.config.coherence_window).copied().collect();
        let recent_prices: Vec<f64> = recent.iter().map(|t| t.price).collect();

        let triple: Vec<PricePoint> = self.ticks.tail(3).copied().collect();
        let curvature = curvature_of(&triple);
        let ftcp = if triple.len() == 3 {
            self.detector.evaluate(tick.timestamp, &curvature)
        } else {
            FtcpEvent {
                timestamp: tick.timestamp,
                kappa: 0.0,
                threshold: f64::INFINITY,
                golden_ratio_match: false,
                is_ftcp: false,
            }
        };

        let gravity = self.gravity.score(&curvature, &recent);
        let coherence = self.coherence.update(tick.price, &recent_prices);
        let anomaly = self.anomaly.score(&recent);

        let metrics = MetricSnapshot {
            linear_coherence: coherence.linear,
            nonlinear_coherence: coherence.nonlinear,
            cross_scale_coherence: coherence.cross_scale,
            effective_gravity: gravity.normalized,
            anomaly_pointer: anomaly.normalized,
        };
        let lighthouse = LighthouseSample {
            timestamp: tick.timestamp,
            intensity: self.consensus.intensity(&metrics),
            inputs: metrics,
        };

        let confirmation = self.confirmer.evaluate(lighthouse, &ftcp);
        let signal = confirmation
            .event
            .map(|event| self.build_signal(&event, &curvature, &coherence, &anomaly));

        if let Some(signal) = &signal {
            self.signals_emitted += 1;
            info!(
                symbol = %signal.symbol,
                signal = ?signal.signal_type,
                tier = signal.tier.number(),
                confidence = signal.confidence,
                "Signal emitted"
            );
        }

        Ok(Evaluation {
            timestamp: tick.timestamp,
            curvature,
            ftcp,
            gravity,
            anomaly,
            coherence,
            metrics,
            lighthouse,
            confirmation,
            signal,
        })
    }

    /// Ingest a batch in order, keeping only emitted signals. Rejected ticks
    /// are skipped.
    pub fn run(&mut self, ticks: impl IntoIterator<Item = PricePoint>) -> Vec<Signal> {
        ticks
            .into_iter()
            .filter_map(|tick| self.ingest(tick).ok())
            .filter_map(|evaluation| evaluation.signal)
            .collect()
    }

    fn build_signal(
        &self,
        event: &LighthouseEvent,
        curvature: &CurvatureSample,
        coherence: &CoherenceReading,
        anomaly: &AnomalyReading,
    ) -> Signal {
        let class = self
            .classifier
            .classify(event.linked_ftcp.kappa, event.confidence, coherence);
        let golden_ratio_score =
            golden_ratio_score(curvature.dt1, curvature.dt2, self.config.golden_ratio_tolerance);
        let direction = CurvatureDirection::of(event.linked_ftcp.kappa);

        let mut reasoning = format!(
            "{:?} tier {}: {} bend κ={:.3e} at interval ratio {:.4} (φ score {:.2}); \
             L={:.3} over threshold {:.3}, confidence {:.1}",
            class.signal_type,
            class.tier.number(),
            match direction {
                CurvatureDirection::Up => "upward",
                CurvatureDirection::Down => "downward",
                CurvatureDirection::Flat => "flat",
            },
            event.linked_ftcp.kappa,
            curvature.interval_ratio().unwrap_or_default(),
            golden_ratio_score,
            event.intensity,
            event.threshold,
            class.confidence,
        );
        if class.boosted {
            reasoning.push_str(match class.signal_type {
                SignalType::Buy => "; cross-scale coherence rising",
                _ => "; linear coherence breaking down",
            });
        }
        reasoning.push_str(&format!(
            "; coherence lin {:.2} / nonlin {:.2} / φ {:.2}; volume spike {:.1}x",
            coherence.linear, coherence.nonlinear, coherence.cross_scale, anomaly.volume_spike,
        ));
        if let Some((knot, offset)) = self
            .lattice
            .as_ref()
            .and_then(|l| l.nearest_knot(event.timestamp))
        {
            reasoning.push_str(&format!(
                "; nearest Fibonacci knot #{} ({:+}s)",
                knot.fibonacci_index,
                offset / 1000
            ));
        }

        Signal {
            symbol: self.symbol.clone(),
            timestamp: event.timestamp,
            signal_type: class.signal_type,
            tier: class.tier,
            confidence: class.confidence,
            curvature: event.linked_ftcp.kappa,
            curvature_direction: direction,
            ftcp_detected: event.linked_ftcp.is_ftcp,
            golden_ratio_score,
            lighthouse: LighthouseSummary {
                intensity: event.intensity,
                is_lhe: true,
                confidence: event.confidence,
            },
            coherence: CoherenceSummary {
                linear: coherence.linear,
                nonlinear: coherence.nonlinear,
                cross_scale: coherence.cross_scale,
            },
            anomaly_pointer: anomaly.normalized,
            reasoning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curvature::PHI_INV;

    const FIVE_MINUTES_MS: i64 = 300_000;
    const START_MS: i64 = 1_700_000_000_000;

    fn pipeline() -> SymbolPipeline {
        SymbolPipeline::new("BTCUSDT", EngineConfig::default()).unwrap()
    }

    fn flat_ticks(count: usize) -> Vec<PricePoint> {
        (0..count)
            .map(|i| PricePoint::new(START_MS + i as i64 * FIVE_MINUTES_MS, 100.0, 1000.0))
            .collect()
    }

    /// 30 flat knots, then 100 → 130 → 102 where the last interval is φ⁻¹ of
    /// the one before it and volume jumps 5x on the final tick.
    fn spike_ticks() -> Vec<PricePoint> {
        let mut ticks = flat_ticks(30);
        let t29 = ticks[29].timestamp;
        let t30 = t29 + FIVE_MINUTES_MS;
        let t31 = t30 + FIVE_MINUTES_MS;
        let t32 = t31 + (FIVE_MINUTES_MS as f64 * PHI_INV).round() as i64;
        ticks.push(PricePoint::new(t30, 100.0, 1000.0));
        ticks.push(PricePoint::new(t31, 130.0, 1000.0));
        ticks.push(PricePoint::new(t32, 102.0, 5000.0));
        ticks
    }

    #[test]
    fn test_flat_market_emits_nothing() {
        let mut p = pipeline();
        for tick in flat_ticks(50) {
            let eval = p.ingest(tick).unwrap();
            assert!(!eval.ftcp.is_ftcp);
            assert!(eval.signal.is_none());
            assert_eq!(eval.lighthouse.intensity, 0.0);
        }
        assert_eq!(p.signals_emitted(), 0);
        assert_eq!(p.len(), 50);
    }

    #[test]
    fn test_spike_confirms_sell() {
        let mut p = pipeline();
        let ticks = spike_ticks();
        let (last, warmup) = ticks.split_last().unwrap();
        for tick in warmup {
            let eval = p.ingest(*tick).unwrap();
            assert!(eval.signal.is_none());
        }

        let eval = p.ingest(*last).unwrap();
        assert!(eval.curvature.kappa < 0.0);
        assert!(eval.curvature.kappa.abs() > 1e-4);
        assert!(eval.ftcp.golden_ratio_match);
        assert!(eval.ftcp.is_ftcp);
        assert!(eval.anomaly.raw > 1.0);
        assert!((eval.anomaly.volume_spike - 5.0).abs() < 1e-12);
        assert!(eval.lighthouse.intensity > 0.0);
        assert!(eval.confirmation.is_lhe());

        let signal = eval.signal.expect("spike should emit a signal");
        assert!(signal.confidence > 60.0);
        assert_eq!(signal.signal_type, SignalType::Sell);
        assert_eq!(signal.tier, Tier::One);
        assert_eq!(signal.curvature_direction, CurvatureDirection::Down);
        assert!(signal.ftcp_detected);
        assert!(signal.golden_ratio_score > 0.99);
        assert!(signal.lighthouse.is_lhe);
        assert!(signal.reasoning.contains("Fibonacci knot"));
        assert_eq!(p.signals_emitted(), 1);
    }

    #[test]
    fn test_upward_bend_confirms_buy() {
        let mut p = pipeline();
        let mut ticks = flat_ticks(30);
        let t29 = ticks[29].timestamp;
        let t30 = t29 + FIVE_MINUTES_MS;
        let t31 = t30 + FIVE_MINUTES_MS;
        let t32 = t31 + (FIVE_MINUTES_MS as f64 * PHI_INV).round() as i64;
        ticks.push(PricePoint::new(t30, 100.0, 1000.0));
        ticks.push(PricePoint::new(t31, 70.0, 1000.0));
        ticks.push(PricePoint::new(t32, 98.0, 5000.0));

        let signals = p.run(ticks);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::Buy);
        assert!(signals[0].curvature > 0.0);
    }

    #[test]
    fn test_no_event_before_twenty_samples() {
        // Same spike shape but only 10 flat ticks of history
        let mut p = pipeline();
        let mut ticks = flat_ticks(10);
        let t = ticks[9].timestamp;
        ticks.push(PricePoint::new(t + FIVE_MINUTES_MS, 100.0, 1000.0));
        ticks.push(PricePoint::new(t + 2 * FIVE_MINUTES_MS, 130.0, 1000.0));
        ticks.push(PricePoint::new(
            t + 2 * FIVE_MINUTES_MS + (FIVE_MINUTES_MS as f64 * PHI_INV).round() as i64,
            102.0,
            50_000.0,
        ));
        for tick in ticks {
            let eval = p.ingest(tick).unwrap();
            assert!(!eval.confirmation.is_lhe());
            assert_eq!(eval.confirmation.confidence, 0.0);
        }
    }

    #[test]
    fn test_rejects_malformed_ticks_without_mutation() {
        let mut p = pipeline();
        p.ingest(PricePoint::new(1_000, 100.0, 1.0)).unwrap();
        p.ingest(PricePoint::new(2_000, 101.0, 1.0)).unwrap();

        assert!(matches!(
            p.ingest(PricePoint::new(2_000, 101.0, 1.0)),
            Err(TickRejection::NonMonotonicTimestamp { last: 2_000, got: 2_000 })
        ));
        assert!(matches!(
            p.ingest(PricePoint::new(1_500, 101.0, 1.0)),
            Err(TickRejection::NonMonotonicTimestamp { .. })
        ));
        assert!(matches!(
            p.ingest(PricePoint::new(3_000, f64::NAN, 1.0)),
            Err(TickRejection::NonFiniteValue { field: "price", .. })
        ));
        assert!(matches!(
            p.ingest(PricePoint::new(3_000, 100.0, f64::INFINITY)),
            Err(TickRejection::NonFiniteValue { field: "volume", .. })
        ));
        assert!(matches!(
            p.ingest(PricePoint::new(3_000, -1.0, 1.0)),
            Err(TickRejection::NonPositivePrice(_))
        ));
        assert!(matches!(
            p.ingest(PricePoint::new(3_000, 100.0, -1.0)),
            Err(TickRejection::NegativeVolume(_))
        ));

        assert_eq!(p.len(), 2);
        assert_eq!(p.last_timestamp(), Some(2_000));
        assert!(p.ingest(PricePoint::new(3_000, 102.0, 1.0)).is_ok());
    }

    #[test]
    fn test_first_ticks_are_neutral() {
        let mut p = pipeline();
        let first = p.ingest(PricePoint::new(0, 100.0, 1.0)).unwrap();
        assert_eq!(first.curvature.kappa, 0.0);
        assert_eq!(first.metrics, MetricSnapshot::default());
        let second = p.ingest(PricePoint::new(1_000, 120.0, 1.0)).unwrap();
        assert_eq!(second.curvature.kappa, 0.0);
        assert!(!second.ftcp.is_ftcp);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let mut ticks = spike_ticks();
        // add some structured noise afterwards
        let mut t = ticks.last().unwrap().timestamp;
        for i in 0..60 {
            t += FIVE_MINUTES_MS + (i % 7) * 10_000;
            let price = 102.0 + (i as f64 * 0.7).sin() * 3.0;
            ticks.push(PricePoint::new(t, price, 900.0 + (i % 5) as f64 * 80.0));
        }

        let mut a = pipeline();
        let mut b = pipeline();
        let evals_a: Vec<Evaluation> = ticks.iter().map(|t| a.ingest(*t).unwrap()).collect();
        let evals_b: Vec<Evaluation> = ticks.iter().map(|t| b.ingest(*t).unwrap()).collect();
        assert_eq!(evals_a, evals_b);

        let sig_a: Vec<_> = evals_a.into_iter().filter_map(|e| e.signal).collect();
        let sig_b: Vec<_> = evals_b.into_iter().filter_map(|e| e.signal).collect();
        assert_eq!(
            serde_json::to_string(&sig_a).unwrap(),
            serde_json::to_string(&sig_b).unwrap()
        );
        assert!(!sig_a.is_empty());
    }

    #[test]
    fn test_buffers_stay_bounded() {
        let config = EngineConfig {
            price_buffer_capacity: 40,
            ..Default::default()
        };
        let mut p = SymbolPipeline::new("ETHUSDT", config).unwrap();
        for (i, tick) in flat_ticks(200).into_iter().enumerate() {
            p.ingest(tick).unwrap();
            assert!(p.len() <= 40, "tick {i}");
        }
        assert_eq!(p.len(), 40);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            coherence_window: 1,
            ..Default::default()
        };
        assert!(SymbolPipeline::new("X", config).is_err());
    }

    #[test]
    fn test_curvature_independent_of_coherence_window() {
        let config = EngineConfig {
            coherence_window: 2,
            ..Default::default()
        };
        let mut p = SymbolPipeline::new("SOLUSDT", config).unwrap();
        let ticks = spike_ticks();
        let (last, warmup) = ticks.split_last().unwrap();
        for tick in warmup {
            p.ingest(*tick).unwrap();
        }

        let eval = p.ingest(*last).unwrap();
        assert!(eval.curvature.kappa < 0.0);
        assert!(eval.ftcp.golden_ratio_match);
        assert!(eval.ftcp.is_ftcp);
    }
}
