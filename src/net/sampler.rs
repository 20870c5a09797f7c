//! Continuous measurement loop.

use std::sync::Arc;
use std::time::Duration;

use crate::context::AppContext;
use crate::error::log_calibration_error;
use crate::shutdown::ShutdownSignal;

/// Pause between batches so a zero-interval configuration cannot starve the runtime
const MIN_CYCLE: Duration = Duration::from_millis(10);

/// Measure back to back until cancelled
///
/// Cancellation is observed between batches, so shutdown waits for at most
/// one batch of sampling.
pub async fn run_sampler(ctx: Arc<AppContext>, signal: ShutdownSignal) {
    tracing::info!("[Sampler] Measurement loop started");
    let mut failures: u64 = 0;

    while !signal.is_triggered() {
        if let Err(e) = ctx.measure_current().await {
            failures += 1;
            log_calibration_error(&e, "measure_current");
        }
        if !signal.sleep(MIN_CYCLE).await {
            break;
        }
    }

    tracing::info!(failures, "[Sampler] Measurement loop stopped");
}
