// Error types for the ampsense calibration core
//
// This module defines custom error types for sensor, calibration and command
// operations, providing structured error handling with error codes that are
// stable across the text protocol and the log output.

mod calibration;
mod command;
mod sensor;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use command::{CommandError, CommandErrorCodes};
pub use sensor::{log_sensor_error, SensorError, SensorErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the command interface.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait_objects() {
        let sensor_err: &dyn ErrorCode = &SensorError::ReadFailed;
        assert_eq!(sensor_err.code(), 1001);

        let cal_err: &dyn ErrorCode = &CalibrationError::StatePoisoned;
        assert_eq!(cal_err.code(), 2007);

        let cmd_err: &dyn ErrorCode = &CommandError::InvalidFormat;
        assert_eq!(cmd_err.code(), 3002);
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), CalibrationError> {
            Err(CalibrationError::InsufficientSamples {
                required: 10,
                collected: 3,
            })
        }

        fn caller() -> Result<(), CalibrationError> {
            may_fail()?;
            Ok(())
        }

        assert!(caller().is_err());
    }
}
