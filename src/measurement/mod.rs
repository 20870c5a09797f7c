// Measurement module - RMS engine building blocks and running statistics
//
// The sampling itself is async and lives on the context; this module holds
// the pure pieces: RMS accumulation, the diagnostic sample window and the
// per-measurement counters reported by MEASUREMENT_STATS.

pub mod rms;
pub mod window;

pub use rms::{rms_above_floor, RmsAccumulator, RmsReading};
pub use window::{SampleWindow, WindowAnalysis};

use serde::Serialize;

/// Running statistics over every successful measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementStats {
    pub total_measurements: u64,
    pub min_current: f32,
    pub max_current: f32,
    pub accumulated_current: f64,
    pub last_voltage_rms: f32,
    pub last_current: f32,
}

impl Default for MeasurementStats {
    fn default() -> Self {
        Self {
            total_measurements: 0,
            min_current: f32::MAX,
            max_current: 0.0,
            accumulated_current: 0.0,
            last_voltage_rms: 0.0,
            last_current: 0.0,
        }
    }
}

impl MeasurementStats {
    pub fn record(&mut self, reading: &RmsReading) {
        self.total_measurements += 1;
        self.min_current = self.min_current.min(reading.current_amps);
        self.max_current = self.max_current.max(reading.current_amps);
        self.accumulated_current += reading.current_amps as f64;
        self.last_voltage_rms = reading.voltage_rms;
        self.last_current = reading.current_amps;
    }

    pub fn average_current(&self) -> f32 {
        if self.total_measurements == 0 {
            return 0.0;
        }
        (self.accumulated_current / self.total_measurements as f64) as f32
    }

    /// Minimum current, or 0 before the first measurement
    pub fn min_current_or_zero(&self) -> f32 {
        if self.total_measurements == 0 {
            0.0
        } else {
            self.min_current
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
