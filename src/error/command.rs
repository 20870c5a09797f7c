// Command protocol error types

use crate::error::{CalibrationError, ErrorCode};
use std::fmt;

/// Command error code constants
///
/// Error code range: 3001-3004
pub struct CommandErrorCodes {}

impl CommandErrorCodes {
    pub const UNKNOWN_COMMAND: i32 = 3001;
    pub const INVALID_FORMAT: i32 = 3002;
    pub const INVALID_RANGE: i32 = 3003;
    pub const FAILED: i32 = 3004;
}

/// Errors raised while parsing or executing a text command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// No entry in the command table matched
    UnknownCommand { raw: String },

    /// Arguments missing or not parseable
    InvalidFormat,

    /// Arguments parsed but outside accepted bounds
    InvalidRange,

    /// Command was valid but the operation failed
    Failed { reason: String },
}

impl ErrorCode for CommandError {
    fn code(&self) -> i32 {
        match self {
            CommandError::UnknownCommand { .. } => CommandErrorCodes::UNKNOWN_COMMAND,
            CommandError::InvalidFormat => CommandErrorCodes::INVALID_FORMAT,
            CommandError::InvalidRange => CommandErrorCodes::INVALID_RANGE,
            CommandError::Failed { .. } => CommandErrorCodes::FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            CommandError::UnknownCommand { raw } => format!("Unknown command: {}", raw),
            CommandError::InvalidFormat => "Invalid command format".to_string(),
            CommandError::InvalidRange => "Argument out of range".to_string(),
            CommandError::Failed { reason } => format!("Command failed: {}", reason),
        }
    }
}

impl CommandError {
    /// Token carried after `ERROR,` in a protocol response
    pub fn status_token(&self) -> String {
        match self {
            CommandError::UnknownCommand { .. } => "UNKNOWN_COMMAND".to_string(),
            CommandError::InvalidFormat => "INVALID_FORMAT".to_string(),
            CommandError::InvalidRange => "INVALID_RANGE".to_string(),
            CommandError::Failed { reason } => reason.clone(),
        }
    }
}

impl From<CalibrationError> for CommandError {
    fn from(err: CalibrationError) -> Self {
        let reason = match err {
            CalibrationError::InvalidParameter { .. } => return CommandError::InvalidRange,
            CalibrationError::InsufficientSamples { .. } => "INSUFFICIENT_SAMPLES",
            CalibrationError::LockContention { .. } => "BUSY",
            CalibrationError::NotEnoughLearningPoints { .. } => "NOT_ENOUGH_POINTS",
            CalibrationError::LearnedScaleRejected { .. } => "LEARNED_SCALE_REJECTED",
            CalibrationError::DegenerateLearningData => "DEGENERATE_DATA",
            CalibrationError::StatePoisoned => "INTERNAL",
        };
        CommandError::Failed {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for CommandError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_codes() {
        assert_eq!(
            CommandError::UnknownCommand {
                raw: "FOO".to_string()
            }
            .code(),
            3001
        );
        assert_eq!(CommandError::InvalidFormat.code(), 3002);
        assert_eq!(CommandError::InvalidRange.code(), 3003);
        assert_eq!(
            CommandError::Failed {
                reason: "busy".to_string()
            }
            .code(),
            3004
        );
    }

    #[test]
    fn test_calibration_errors_map_to_status_tokens() {
        let busy: CommandError = CalibrationError::LockContention { resource: "scale" }.into();
        assert_eq!(busy.status_token(), "BUSY");

        let range: CommandError = CalibrationError::InvalidParameter {
            name: "sensitivity",
            value: 2.0,
        }
        .into();
        assert_eq!(range, CommandError::InvalidRange);
        assert_eq!(range.status_token(), "INVALID_RANGE");

        let samples: CommandError = CalibrationError::InsufficientSamples {
            required: 11,
            collected: 3,
        }
        .into();
        assert_eq!(samples.status_token(), "INSUFFICIENT_SAMPLES");
    }

    #[test]
    fn test_unknown_command_message_carries_raw_text() {
        let err = CommandError::UnknownCommand {
            raw: "BOGUS".to_string(),
        };
        assert!(err.message().contains("BOGUS"));
    }
}
