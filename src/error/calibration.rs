// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Single source of truth for the numeric codes reported in logs and
/// carried by protocol error responses.
///
/// Error code range: 2001-2007
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Fewer valid samples than the operation requires
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// Parameter outside its documented bounds
    pub const INVALID_PARAMETER: i32 = 2002;

    /// Bounded-wait lock could not be acquired in time
    pub const LOCK_CONTENTION: i32 = 2003;

    /// Learning history too short for an estimate
    pub const NOT_ENOUGH_LEARNING_POINTS: i32 = 2004;

    /// Learned scale outside the anti-runaway window
    pub const LEARNED_SCALE_REJECTED: i32 = 2005;

    /// Learning weights or voltages too small to estimate from
    pub const DEGENERATE_LEARNING_DATA: i32 = 2006;

    /// Monitor state lock was poisoned
    pub const STATE_POISONED: i32 = 2007;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - context: The operation that failed
/// - message: Human-readable error message
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These errors cover parameter store access, calibration sampling and the
/// learning estimator. None of them are fatal: the caller keeps the previous
/// calibration parameters and carries on.
///
/// Error code ranges: 2001-2007
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Insufficient valid samples collected for a calibration batch
    InsufficientSamples { required: usize, collected: usize },

    /// Parameter rejected before any state mutation
    InvalidParameter { name: &'static str, value: f32 },

    /// Parameter store lock not acquired within the bounded wait
    LockContention { resource: &'static str },

    /// Learning history holds fewer points than the estimator needs
    NotEnoughLearningPoints { required: usize, available: usize },

    /// Learned scale deviates too far from the current scale
    LearnedScaleRejected { learned: f32, current: f32 },

    /// Accumulated weights too small for a stable estimate
    DegenerateLearningData,

    /// Monitor state lock was poisoned
    StatePoisoned,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::InvalidParameter { .. } => CalibrationErrorCodes::INVALID_PARAMETER,
            CalibrationError::LockContention { .. } => CalibrationErrorCodes::LOCK_CONTENTION,
            CalibrationError::NotEnoughLearningPoints { .. } => {
                CalibrationErrorCodes::NOT_ENOUGH_LEARNING_POINTS
            }
            CalibrationError::LearnedScaleRejected { .. } => {
                CalibrationErrorCodes::LEARNED_SCALE_REJECTED
            }
            CalibrationError::DegenerateLearningData => {
                CalibrationErrorCodes::DEGENERATE_LEARNING_DATA
            }
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!("Insufficient samples: need {}, got {}", required, collected)
            }
            CalibrationError::InvalidParameter { name, value } => {
                format!("Invalid parameter: {} = {}", name, value)
            }
            CalibrationError::LockContention { resource } => {
                format!("Lock contention on {}", resource)
            }
            CalibrationError::NotEnoughLearningPoints {
                required,
                available,
            } => {
                format!(
                    "Not enough learning points: need {}, have {}",
                    required, available
                )
            }
            CalibrationError::LearnedScaleRejected { learned, current } => {
                format!(
                    "Learned scale {:.2} A/V rejected (current {:.2} A/V)",
                    learned, current
                )
            }
            CalibrationError::DegenerateLearningData => {
                "Learning data too weak for an estimate".to_string()
            }
            CalibrationError::StatePoisoned => "Calibration state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::InsufficientSamples {
                required: 10,
                collected: 3
            }
            .code(),
            CalibrationErrorCodes::INSUFFICIENT_SAMPLES
        );
        assert_eq!(
            CalibrationError::InvalidParameter {
                name: "scale",
                value: -1.0
            }
            .code(),
            CalibrationErrorCodes::INVALID_PARAMETER
        );
        assert_eq!(
            CalibrationError::LockContention { resource: "bias" }.code(),
            CalibrationErrorCodes::LOCK_CONTENTION
        );
        assert_eq!(
            CalibrationError::NotEnoughLearningPoints {
                required: 3,
                available: 1
            }
            .code(),
            CalibrationErrorCodes::NOT_ENOUGH_LEARNING_POINTS
        );
        assert_eq!(
            CalibrationError::LearnedScaleRejected {
                learned: 500.0,
                current: 200.0
            }
            .code(),
            CalibrationErrorCodes::LEARNED_SCALE_REJECTED
        );
        assert_eq!(
            CalibrationError::DegenerateLearningData.code(),
            CalibrationErrorCodes::DEGENERATE_LEARNING_DATA
        );
        assert_eq!(
            CalibrationError::StatePoisoned.code(),
            CalibrationErrorCodes::STATE_POISONED
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::InsufficientSamples {
            required: 10,
            collected: 4,
        };
        assert_eq!(err.message(), "Insufficient samples: need 10, got 4");

        let err = CalibrationError::InvalidParameter {
            name: "sensitivity",
            value: 1.5,
        };
        assert_eq!(err.message(), "Invalid parameter: sensitivity = 1.5");

        let err = CalibrationError::LockContention { resource: "scale" };
        assert!(err.message().contains("scale"));

        let err = CalibrationError::LearnedScaleRejected {
            learned: 450.0,
            current: 200.0,
        };
        assert!(err.message().contains("450.00"));
    }

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::DegenerateLearningData;
        let display = format!("{}", err);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
