//! Millisecond clock abstraction shared by the measurement and calibration paths.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Trait representing a monotonic millisecond clock measured from boot.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Default time source backed by `Instant::now`.
pub struct SystemTimeSource {
    start: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Manually driven clock for tests and offline replay.
///
/// Time only moves when [`ManualTimeSource::advance`] or
/// [`ManualTimeSource::set`] is called.
#[derive(Default)]
pub struct ManualTimeSource {
    now_ms: AtomicU64,
}

impl ManualTimeSource {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
