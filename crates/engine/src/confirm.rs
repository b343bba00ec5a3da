//! Lighthouse Event confirmation: a z-score outlier test on L joined with the
//! FTCP gate from the same tick.

use tracing::info;

use crate::types::{FtcpEvent, LighthouseEvent, LighthouseSample};
use crate::window::{mean, std_dev, RollingWindow};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confirmation {
    /// μ + kσ of the prior history; `None` while warming up
    pub threshold: Option<f64>,
    pub intensity_exceeded: bool,
    pub confidence: f64,
    pub event: Option<LighthouseEvent>,
}

impl Confirmation {
    pub fn is_lhe(&self) -> bool {
        self.event.is_some()
    }
}

/// Relative excess of L over the threshold, in percent, capped at 100.
/// A zero threshold makes any positive excess unbounded, which caps.
pub fn excess_confidence(intensity: f64, threshold: f64) -> f64 {
    if !(intensity > threshold) {
        return 0.0;
    }
    if threshold <= 0.0 {
        return 100.0;
    }
    ((intensity - threshold) / threshold * 100.0).min(100.0)
}

#[derive(Debug, Clone)]
pub struct EventConfirmer {
    history: RollingWindow<LighthouseSample>,
    min_history: usize,
    k: f64,
}

impl EventConfirmer {
    pub fn new(capacity: usize, min_history: usize, k: f64) -> Self {
        Self {
            history: RollingWindow::new(capacity),
            min_history,
            k,
        }
    }

    /// Test `sample` against the prior history, then append it
    pub fn evaluate(&mut self, sample: LighthouseSample, ftcp: &FtcpEvent) -> Confirmation {
        let threshold = self.threshold();
        self.history.push(sample);

        let Some(threshold) = threshold else {
            return Confirmation {
                threshold: None,
                intensity_exceeded: false,
                confidence: 0.0,
                event: None,
            };
        };

        let intensity_exceeded = sample.intensity > threshold;
        if !(intensity_exceeded && ftcp.is_ftcp) {
            return Confirmation {
                threshold: Some(threshold),
                intensity_exceeded,
                confidence: 0.0,
                event: None,
            };
        }

        let confidence = excess_confidence(sample.intensity, threshold);
        info!(
            timestamp = sample.timestamp,
            intensity = sample.intensity,
            threshold,
            confidence,
            "Lighthouse event confirmed"
        );

        Confirmation {
            threshold: Some(threshold),
            intensity_exceeded,
            confidence,
            event: Some(LighthouseEvent {
                timestamp: sample.timestamp,
                intensity: sample.intensity,
                threshold,
                confidence,
                linked_ftcp: *ftcp,
            }),
        }
    }

    fn threshold(&self) -> Option<f64> {
        if self.history.len() < self.min_history {
            return None;
        }
        let intensities = || self.history.iter().map(|s| s.intensity);
        let mu = mean(intensities())?;
        let sigma = std_dev(intensities())?;
        Some(mu + self.k * sigma)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricSnapshot;

    fn sample(ts: i64, intensity: f64) -> LighthouseSample {
        LighthouseSample {
            timestamp: ts,
            intensity,
            inputs: MetricSnapshot::default(),
        }
    }

    fn ftcp(is_ftcp: bool) -> FtcpEvent {
        FtcpEvent {
            timestamp: 0,
            kappa: -1.0,
            threshold: 0.5,
            golden_ratio_match: is_ftcp,
            is_ftcp,
        }
    }

    #[test]
    fn test_cold_start_never_confirms() {
        let mut confirmer = EventConfirmer::new(500, 20, 2.0);
        for i in 0..20 {
            let c = confirmer.evaluate(sample(i, 1e9), &ftcp(true));
            assert!(!c.is_lhe());
            assert_eq!(c.confidence, 0.0);
            assert!(c.threshold.is_none());
        }
        assert_eq!(confirmer.history_len(), 20);
    }

    #[test]
    fn test_confirms_outlier_with_ftcp() {
        let mut confirmer = EventConfirmer::new(500, 20, 2.0);
        for i in 0..30 {
            let l = if i % 2 == 0 { 0.1 } else { 0.2 };
            confirmer.evaluate(sample(i, l), &ftcp(false));
        }
        // μ = 0.15, σ = 0.05, threshold = 0.25
        let c = confirmer.evaluate(sample(30, 0.45), &ftcp(true));
        assert!(c.is_lhe());
        let threshold = c.threshold.unwrap();
        assert!((threshold - 0.25).abs() < 1e-9);
        assert!((c.confidence - 80.0).abs() < 1e-6);
        let event = c.event.unwrap();
        assert_eq!(event.linked_ftcp.kappa, -1.0);
    }

    #[test]
    fn test_outlier_without_ftcp_is_not_event() {
        let mut confirmer = EventConfirmer::new(500, 20, 2.0);
        for i in 0..25 {
            confirmer.evaluate(sample(i, 0.1), &ftcp(false));
        }
        let c = confirmer.evaluate(sample(25, 0.9), &ftcp(false));
        assert!(c.intensity_exceeded);
        assert!(!c.is_lhe());
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_excess_confidence() {
        assert_eq!(excess_confidence(0.2, 0.25), 0.0);
        assert_eq!(excess_confidence(0.25, 0.25), 0.0);
        assert!((excess_confidence(0.3, 0.25) - 20.0).abs() < 1e-9);
        assert_eq!(excess_confidence(10.0, 0.25), 100.0);
        assert_eq!(excess_confidence(0.5, 0.0), 100.0);
        assert_eq!(excess_confidence(0.0, 0.0), 0.0);
    }
}
