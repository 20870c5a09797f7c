// StabilityDetector - rolling current history and stable-load state machine
//
// Every reading lands in the history ring. Readings under the near-zero
// threshold only bump the zero counter; anything else resets it and, once
// the ring has been filled, evaluates the window:
//
//   Idle --stable--> StableStart --stable--> StableHolding
//   StableHolding --held past stable_time--> Idle (recalibrate if due)
//   any --unstable--> Idle

use serde::Serialize;

use crate::calibration::ring::RingBuffer;
use crate::config::StabilityConfig;

/// Phase of the stable-load state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StabilityPhase {
    Idle,
    StableStart,
    StableHolding,
}

/// Outcome of feeding one reading to the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StabilityEvent {
    /// Reading was near zero; window not evaluated
    NearZero { consecutive: u32 },
    /// History not yet filled
    Warming,
    /// Window evaluated as not stable
    Unstable { mean: f32, variance: f32 },
    /// Idle -> StableStart; recognition should run on `value`
    StableStarted { value: f32 },
    /// Still inside the hold period
    Holding { value: f32, held_ms: u64 },
    /// Hold period ended and the detector went back to Idle
    HoldExpired { value: f32, recalibrate: bool },
}

/// Snapshot of detector state for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StabilityState {
    pub phase: StabilityPhase,
    pub stable_value: f32,
    pub stable_since_ms: u64,
    pub consecutive_near_zero: u32,
    pub history_len: usize,
    pub history_filled: bool,
}

/// History & Stability Detector
pub struct StabilityDetector {
    config: StabilityConfig,
    history: RingBuffer<f32>,
    phase: StabilityPhase,
    stable_value: f32,
    stable_since_ms: u64,
    consecutive_near_zero: u32,
}

impl StabilityDetector {
    pub fn new(config: StabilityConfig) -> Self {
        let history = RingBuffer::new(config.history_size);
        Self {
            config,
            history,
            phase: StabilityPhase::Idle,
            stable_value: 0.0,
            stable_since_ms: 0,
            consecutive_near_zero: 0,
        }
    }

    /// Feed one current reading
    ///
    /// # Arguments
    /// * `current_amps` - Calibrated reading from the RMS engine
    /// * `now_ms` - Current clock value
    /// * `last_scale_cal_ms` - When the scale was last recalibrated
    pub fn observe(&mut self, current_amps: f32, now_ms: u64, last_scale_cal_ms: u64) -> StabilityEvent {
        self.history.push(current_amps);

        if current_amps < self.config.zero_threshold {
            self.consecutive_near_zero = self.consecutive_near_zero.saturating_add(1);
            return StabilityEvent::NearZero {
                consecutive: self.consecutive_near_zero,
            };
        }
        self.consecutive_near_zero = 0;

        if !self.history.is_filled() {
            return StabilityEvent::Warming;
        }

        let (mean, variance) = match self.history.mean_variance() {
            Some(stats) => stats,
            None => return StabilityEvent::Warming,
        };

        if !self.is_stable(mean, variance) {
            if self.phase != StabilityPhase::Idle {
                log::info!(
                    "[Stability] Load no longer stable (mean={:.3}A, var={:.4})",
                    mean,
                    variance
                );
            }
            self.phase = StabilityPhase::Idle;
            return StabilityEvent::Unstable { mean, variance };
        }

        match self.phase {
            StabilityPhase::Idle => {
                self.phase = StabilityPhase::StableStart;
                self.stable_since_ms = now_ms;
                self.stable_value = mean;
                log::info!("[Stability] Stable load detected: {:.3}A", mean);
                StabilityEvent::StableStarted { value: mean }
            }
            StabilityPhase::StableStart | StabilityPhase::StableHolding => {
                let held_ms = now_ms.saturating_sub(self.stable_since_ms);
                if held_ms <= self.config.stable_time_ms {
                    self.phase = StabilityPhase::StableHolding;
                    return StabilityEvent::Holding {
                        value: self.stable_value,
                        held_ms,
                    };
                }

                let since_cal = now_ms.saturating_sub(last_scale_cal_ms);
                let recalibrate = since_cal > self.config.scale_recal_interval_ms;
                self.phase = StabilityPhase::Idle;
                log::info!(
                    "[Stability] Stable for {}ms at {:.3}A (recalibrate={})",
                    held_ms,
                    self.stable_value,
                    recalibrate
                );
                StabilityEvent::HoldExpired {
                    value: self.stable_value,
                    recalibrate,
                }
            }
        }
    }

    fn is_stable(&self, mean: f32, variance: f32) -> bool {
        variance < self.config.variance_threshold
            && mean >= self.config.min_current
            && mean <= self.config.max_current
    }

    pub fn consecutive_near_zero(&self) -> u32 {
        self.consecutive_near_zero
    }

    pub fn reset_near_zero(&mut self) {
        self.consecutive_near_zero = 0;
    }

    pub fn phase(&self) -> StabilityPhase {
        self.phase
    }

    /// Rolling mean and variance, once the window has filled
    pub fn window_stats(&self) -> Option<(f32, f32)> {
        if self.history.is_filled() {
            self.history.mean_variance()
        } else {
            None
        }
    }

    pub fn state(&self) -> StabilityState {
        StabilityState {
            phase: self.phase,
            stable_value: self.stable_value,
            stable_since_ms: self.stable_since_ms,
            consecutive_near_zero: self.consecutive_near_zero,
            history_len: self.history.len(),
            history_filled: self.history.is_filled(),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.phase = StabilityPhase::Idle;
        self.stable_value = 0.0;
        self.stable_since_ms = 0;
        self.consecutive_near_zero = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StabilityDetector {
        StabilityDetector::new(StabilityConfig::default())
    }

    fn fill(detector: &mut StabilityDetector, value: f32, count: usize, now_ms: u64) -> StabilityEvent {
        let mut last = StabilityEvent::Warming;
        for _ in 0..count {
            last = detector.observe(value, now_ms, 0);
        }
        last
    }

    #[test]
    fn test_warming_until_history_filled() {
        let mut det = detector();
        for _ in 0..49 {
            assert_eq!(det.observe(3.0, 0, 0), StabilityEvent::Warming);
        }
        assert_eq!(det.observe(3.0, 0, 0), StabilityEvent::StableStarted { value: 3.0 });
    }

    #[test]
    fn test_constant_load_has_zero_variance_and_starts_stable() {
        let mut det = detector();
        fill(&mut det, 3.0, 50, 1_000);

        let (mean, variance) = det.window_stats().unwrap();
        assert_eq!(variance, 0.0);
        assert!((mean - 3.0).abs() < 1e-6);
        assert_eq!(det.phase(), StabilityPhase::StableStart);
        assert_eq!(det.state().stable_since_ms, 1_000);
    }

    #[test]
    fn test_holding_then_expiry_with_recalibration() {
        let mut det = detector();
        fill(&mut det, 3.0, 50, 0);

        let event = det.observe(3.0, 60_000, 0);
        assert_eq!(
            event,
            StabilityEvent::Holding {
                value: 3.0,
                held_ms: 60_000
            }
        );
        assert_eq!(det.phase(), StabilityPhase::StableHolding);

        let event = det.observe(3.0, 2_000_000, 0);
        assert_eq!(
            event,
            StabilityEvent::HoldExpired {
                value: 3.0,
                recalibrate: true
            }
        );
        assert_eq!(det.phase(), StabilityPhase::Idle);
    }

    #[test]
    fn test_expiry_without_recalibration_when_recently_calibrated() {
        let mut det = detector();
        fill(&mut det, 3.0, 50, 0);
        det.observe(3.0, 1_000, 0);

        let event = det.observe(3.0, 200_000, 100_000);
        assert_eq!(
            event,
            StabilityEvent::HoldExpired {
                value: 3.0,
                recalibrate: false
            }
        );
        assert_eq!(det.phase(), StabilityPhase::Idle);

        // Still stable, so the next evaluation starts a fresh period
        assert_eq!(
            det.observe(3.0, 200_010, 100_000),
            StabilityEvent::StableStarted { value: 3.0 }
        );
    }

    #[test]
    fn test_unstable_window_returns_to_idle() {
        let mut det = detector();
        fill(&mut det, 3.0, 50, 0);
        assert_eq!(det.phase(), StabilityPhase::StableStart);

        let event = det.observe(9.0, 10, 0);
        assert!(matches!(event, StabilityEvent::Unstable { .. }));
        assert_eq!(det.phase(), StabilityPhase::Idle);
    }

    #[test]
    fn test_out_of_range_mean_is_not_stable() {
        let mut det = detector();
        let event = fill(&mut det, 20.0, 50, 0);
        assert!(matches!(event, StabilityEvent::Unstable { .. }));

        let mut det = detector();
        let event = fill(&mut det, 0.2, 50, 0);
        assert!(matches!(event, StabilityEvent::Unstable { .. }));
    }

    #[test]
    fn test_near_zero_counter_skips_evaluation() {
        let mut det = detector();
        fill(&mut det, 3.0, 50, 0);

        for expected in 1..=5 {
            assert_eq!(
                det.observe(0.01, 10, 0),
                StabilityEvent::NearZero {
                    consecutive: expected
                }
            );
        }
        assert_eq!(det.consecutive_near_zero(), 5);
        assert_eq!(det.phase(), StabilityPhase::StableStart);

        det.observe(3.0, 20, 0);
        assert_eq!(det.consecutive_near_zero(), 0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut det = detector();
        fill(&mut det, 3.0, 50, 0);
        det.reset();
        assert_eq!(det.phase(), StabilityPhase::Idle);
        assert!(det.window_stats().is_none());
        assert_eq!(det.state().history_len, 0);
    }
}
