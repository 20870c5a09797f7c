//! Calibration event types published by the context and the controller.

use serde::{Deserialize, Serialize};

/// Every calibration decision the core takes, in the order it took them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CalibrationEvent {
    ZeroCalibrated {
        bias_voltage: f32,
        valid_samples: usize,
        automatic: bool,
    },
    ScaleCalibrated {
        known_amps: f32,
        scale_factor: f32,
        automatic: bool,
    },
    ParametersSet {
        bias_voltage: f32,
        scale_factor: f32,
    },
    CalibrationReset {
        bias_voltage: f32,
        scale_factor: f32,
    },
    StableLoad {
        current_amps: f32,
    },
    DeviceRecognized {
        name: String,
        confidence: f32,
        accepted: bool,
    },
    LearnedScaleApplied {
        previous: f32,
        learned: f32,
        applied: f32,
    },
    SensitivityAdjusted {
        from: f32,
        to: f32,
        success_rate: f32,
    },
    AutoCalibrationToggled {
        enabled: bool,
    },
    CalibrationFailed {
        code: i32,
        context: String,
    },
}
