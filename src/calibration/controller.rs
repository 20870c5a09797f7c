// Auto-calibration controller
//
// Periodic background task: zero recalibration when due, learned scale
// application, sensitivity adaptation. Cancelled through a ShutdownSignal,
// observed at the top of every iteration and during the period sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::context::AppContext;
use crate::error::{log_calibration_error, CalibrationError};
use crate::shutdown::ShutdownSignal;

/// Adapt recognition sensitivity to the recognition success rate
///
/// High success widens acceptance, low success tightens it. The result is
/// always clamped into `bounds`.
pub fn next_sensitivity(current: f32, success_rate: f32, bounds: (f32, f32), step: f32) -> f32 {
    let (low, high) = bounds;
    let next = if success_rate > 0.8 && current < high {
        current + step
    } else if success_rate < 0.4 && current > low {
        current - step
    } else {
        current
    };
    next.clamp(low, high)
}

/// What one controller iteration did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IterationReport {
    pub zero_calibrated: bool,
    pub learning_applied: bool,
    /// New sensitivity when it changed
    pub sensitivity: Option<f32>,
}

/// Handle to a running controller task
pub struct ControllerHandle {
    signal: ShutdownSignal,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cancellation without waiting
    pub fn cancel(&self) {
        self.signal.trigger();
    }

    /// Cancel and wait for the loop to exit
    pub async fn stop(self) {
        self.signal.trigger();
        if let Err(e) = self.task.await {
            tracing::warn!("[AutoCal] Controller task ended abnormally: {}", e);
        }
    }
}

pub struct AutoCalController;

impl AutoCalController {
    /// Spawn the periodic loop on the current tokio runtime
    pub fn spawn(ctx: Arc<AppContext>) -> ControllerHandle {
        let signal = ShutdownSignal::new();
        let loop_signal = signal.clone();
        let task = tokio::spawn(async move {
            Self::run(ctx, loop_signal).await;
        });
        ControllerHandle { signal, task }
    }

    async fn run(ctx: Arc<AppContext>, signal: ShutdownSignal) {
        let period = Duration::from_millis(ctx.config().auto_cal.period_ms);
        tracing::info!("[AutoCal] Controller started (period {:?})", period);

        let mut iterations: u64 = 0;
        loop {
            if signal.is_triggered() || !ctx.auto_calibration_enabled() {
                break;
            }

            match Self::run_iteration(&ctx).await {
                Ok(report) => {
                    iterations += 1;
                    if report != IterationReport::default() {
                        tracing::info!("[AutoCal] Iteration {}: {:?}", iterations, report);
                    }
                }
                Err(e) => log_calibration_error(&e, "auto_calibration_iteration"),
            }

            if !signal.sleep(period).await {
                break;
            }
        }

        tracing::info!("[AutoCal] Controller stopped after {} iterations", iterations);
    }

    /// One pass of the controller
    ///
    /// Individual step failures are logged and do not abort the pass; only a
    /// poisoned state lock is returned.
    pub async fn run_iteration(ctx: &AppContext) -> Result<IterationReport, CalibrationError> {
        let mut report = IterationReport::default();

        if ctx.zero_calibration_due()? {
            tracing::info!("[AutoCal] Performing automatic zero calibration");
            match ctx.zero_calibrate(true).await {
                Ok(_) => report.zero_calibrated = true,
                Err(e) => log_calibration_error(&e, "automatic_zero_calibration"),
            }
        }

        if ctx.has_enough_learning_points()? {
            match ctx.apply_learned_calibration().await {
                Ok(_) => report.learning_applied = true,
                Err(e @ CalibrationError::LearnedScaleRejected { .. }) => {
                    tracing::debug!("[AutoCal] {}", e);
                }
                Err(e) => log_calibration_error(&e, "apply_learned_calibration"),
            }
        }

        report.sensitivity = ctx.adapt_sensitivity()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: (f32, f32) = (0.3, 0.9);

    #[test]
    fn high_success_rate_raises_sensitivity() {
        let next = next_sensitivity(0.6, 0.9, BOUNDS, 0.05);
        assert!((next - 0.65).abs() < 1e-6);
    }

    #[test]
    fn low_success_rate_lowers_sensitivity() {
        let next = next_sensitivity(0.6, 0.2, BOUNDS, 0.05);
        assert!((next - 0.55).abs() < 1e-6);
    }

    #[test]
    fn middling_success_rate_keeps_sensitivity() {
        assert_eq!(next_sensitivity(0.6, 0.5, BOUNDS, 0.05), 0.6);
    }

    #[test]
    fn sensitivity_stays_within_bounds() {
        assert_eq!(next_sensitivity(0.9, 1.0, BOUNDS, 0.05), 0.9);
        assert_eq!(next_sensitivity(0.3, 0.0, BOUNDS, 0.05), 0.3);
        assert!((next_sensitivity(0.88, 1.0, BOUNDS, 0.05) - 0.9).abs() < 1e-6);
        // Manual overrides outside the adaptive band are pulled back in
        assert_eq!(next_sensitivity(1.0, 0.5, BOUNDS, 0.05), 0.9);
        assert_eq!(next_sensitivity(0.1, 0.5, BOUNDS, 0.05), 0.3);
    }
}
