// Response lines and the key=value bodies shared with telemetry

use std::fmt;

use crate::context::{AutoCalSummary, CalibrationStatus, InstantReading, LearningSummary};
use crate::error::CommandError;
use crate::measurement::{MeasurementStats, WindowAnalysis};

const MS_PER_HOUR: u64 = 3_600_000;

/// One response datagram: `TAG:BODY`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    tag: String,
    body: String,
}

impl Response {
    pub fn new(tag: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            body: body.into(),
        }
    }

    /// `TAG:SUCCESS`
    pub fn success(tag: &str) -> Self {
        Self::new(tag, "SUCCESS")
    }

    /// `TAG:SUCCESS,FIELDS`
    pub fn success_with(tag: &str, fields: impl fmt::Display) -> Self {
        Self::new(tag, format!("SUCCESS,{}", fields))
    }

    /// `TAG:ERROR,TOKEN`, or `ERROR:UNKNOWN_COMMAND:RAW` for unknown names
    pub fn error(tag: &str, err: &CommandError) -> Self {
        match err {
            CommandError::UnknownCommand { raw } => {
                Self::new("ERROR", format!("UNKNOWN_COMMAND:{}", raw))
            }
            _ => Self::new(tag, format!("ERROR,{}", err.status_token())),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_error(&self) -> bool {
        self.tag == "ERROR" || self.body.starts_with("ERROR")
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.body)
    }
}

pub fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

/// `BIAS_V=..,SCALE=..,AUTO_CAL=..,AUTO_DET=..,LOAD=..,LEARNING_PTS=..`
pub fn format_calibration_status(status: &CalibrationStatus) -> String {
    format!(
        "BIAS_V={:.4},SCALE={:.2},AUTO_CAL={},AUTO_DET={},LOAD={:.3},LEARNING_PTS={}",
        status.bias_voltage,
        status.scale_factor,
        on_off(status.auto_calibration),
        on_off(status.auto_detection),
        status.detected_load,
        status.learning_points
    )
}

/// `AUTO_CAL_STATS:ENABLED=..,COUNT=..,UPTIME=..h,SUCCESS=..,FAILED=..,LEARNING_PTS=..,SENSITIVITY=..`
pub fn format_auto_cal_summary(summary: &AutoCalSummary) -> String {
    format!(
        "AUTO_CAL_STATS:ENABLED={},COUNT={},UPTIME={}h,SUCCESS={},FAILED={},LEARNING_PTS={},SENSITIVITY={:.2}",
        yes_no(summary.enabled),
        summary.statistics.auto_cal_count,
        summary.uptime_ms / MS_PER_HOUR,
        summary.statistics.successful_recognitions,
        summary.statistics.failed_recognitions,
        summary.learning_points,
        summary.sensitivity
    )
}

pub fn format_measurement_stats(stats: &MeasurementStats) -> String {
    format!(
        "MEASUREMENTS={},AVG_CURRENT={:.3},MIN_CURRENT={:.3},MAX_CURRENT={:.3},LAST_VRMS={:.6}",
        stats.total_measurements,
        stats.average_current(),
        stats.min_current_or_zero(),
        stats.max_current,
        stats.last_voltage_rms
    )
}

pub fn format_buffer_analysis(analysis: Option<&WindowAnalysis>) -> String {
    match analysis {
        None => "BUFFER_ANALYSIS=NOT_READY".to_string(),
        Some(a) => format!(
            "BUFFER_ANALYSIS=READY,MEAN={:.6},STD_DEV={:.6},RMS={:.6},MIN={:.6},MAX={:.6},VARIANCE={:.8}",
            a.mean, a.std_dev, a.rms, a.min, a.max, a.variance
        ),
    }
}

pub fn format_learning_summary(summary: &LearningSummary) -> String {
    format!(
        "POINTS={},RATE={:.2},MAX_POINTS={}",
        summary.points, summary.learning_rate, summary.capacity
    )
}

/// `INSTANT=..A,DETECTED=..A,VRMS=..V`; a failed tick reads as zero
pub fn format_instant_reading(reading: &InstantReading) -> String {
    format!(
        "INSTANT={:.3}A,DETECTED={:.3}A,VRMS={:.6}V",
        reading.instant_amps.unwrap_or(0.0),
        reading.detected_amps,
        reading.last_voltage_rms
    )
}
