// Sensor error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Sensor error code constants
///
/// Error code range: 1001-1003
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// A single raw read failed
    pub const READ_FAILED: i32 = 1001;

    /// Transducer not yet initialized
    pub const NOT_READY: i32 = 1002;

    /// Transducer driver went away
    pub const DISCONNECTED: i32 = 1003;
}

/// Log a sensor error with structured context
///
/// Sensor failures are skipped per tick, so they are logged at warn level
/// rather than error.
pub fn log_sensor_error(err: &SensorError, context: &str) {
    warn!(
        "Sensor error in {}: code={}, component=SampleSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Raw sample source errors
///
/// Error code ranges: 1001-1003
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Read of one tick failed; the tick is skipped
    ReadFailed,

    /// Source not initialized
    NotReady,

    /// Source disconnected
    Disconnected,
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::ReadFailed => SensorErrorCodes::READ_FAILED,
            SensorError::NotReady => SensorErrorCodes::NOT_READY,
            SensorError::Disconnected => SensorErrorCodes::DISCONNECTED,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::ReadFailed => "Raw sample read failed".to_string(),
            SensorError::NotReady => "Sample source not initialized".to_string(),
            SensorError::Disconnected => "Sample source disconnected".to_string(),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_codes() {
        assert_eq!(SensorError::ReadFailed.code(), 1001);
        assert_eq!(SensorError::NotReady.code(), 1002);
        assert_eq!(SensorError::Disconnected.code(), 1003);
    }

    #[test]
    fn test_sensor_error_display() {
        let display = format!("{}", SensorError::ReadFailed);
        assert!(display.contains("SensorError"));
        assert!(display.contains("1001"));
    }
}
