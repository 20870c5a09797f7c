//! Calibration telemetry: event collector and broadcast packet formatting.
//!
//! The collector multiplexes calibration decisions into a bounded history
//! plus an async broadcast stream; the packet type renders the periodic
//! datagram sent to dashboards.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

pub mod events;

pub use events::CalibrationEvent;

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<CalibrationEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of events.
pub struct TelemetryCollector {
    tx: broadcast::Sender<CalibrationEvent>,
    history: Mutex<VecDeque<CalibrationEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<CalibrationEvent>> {
        // History is append-only, a poisoned guard still holds valid events
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish(&self, event: CalibrationEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history();
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            if self.history_capacity > 0 {
                history.push_back(event.clone());
            }
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CalibrationEvent> {
        self.tx.subscribe()
    }

    /// Live event stream; lagged receivers skip what they missed.
    ///
    /// The stream is `Unpin`, so callers can poll it with `next()` directly.
    pub fn stream(&self) -> impl Stream<Item = CalibrationEvent> + Unpin + Send + 'static {
        tokio_stream::StreamExt::filter_map(BroadcastStream::new(self.tx.subscribe()), Result::ok)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history();
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Periodic telemetry datagram
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPacket {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub current_amps: f32,
    pub voltage_rms: f32,
    pub mains_voltage: f32,
    /// `CAL_STATUS` body
    pub cal_status: String,
    /// Auto-calibration statistics, empty while auto-calibration is off
    pub auto_cal: String,
}

impl TelemetryPacket {
    pub fn power_watts(&self) -> f32 {
        self.current_amps * self.mains_voltage
    }

    /// `SEQ=..,TIME=..,CURRENT=..,VOLTAGE_RMS=..,POWER=..,CAL_STATUS=..,AUTO_CAL=..`
    pub fn encode(&self) -> String {
        format!(
            "SEQ={},TIME={},CURRENT={:.6},VOLTAGE_RMS={:.6},POWER={:.2},CAL_STATUS={},AUTO_CAL={}",
            self.sequence,
            self.timestamp_ms,
            self.current_amps,
            self.voltage_rms,
            self.power_watts(),
            self.cal_status,
            self.auto_cal
        )
    }
}
