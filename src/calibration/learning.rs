// LearningSystem - time-decayed weighted scale estimator
//
// Calibration events are recorded as (expected current, measured voltage)
// points. The estimator weights each point by confidence, daily decay and
// the learning rate, and proposes a damped update of the scale factor.

use serde::Serialize;

use crate::calibration::ring::RingBuffer;
use crate::config::LearningConfig;
use crate::error::CalibrationError;

const MS_PER_DAY: f32 = 86_400_000.0;

/// Measured voltages at or below this are ignored by the estimator
const MIN_MEASURED_VOLTAGE: f32 = 0.001;
const MIN_DENOMINATOR: f32 = 0.001;
const MIN_TOTAL_WEIGHT: f32 = 0.1;

const MANUAL_CONFIDENCE: f32 = 1.0;
const AUTO_CONFIDENCE: f32 = 0.8;

/// One recorded calibration observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationPoint {
    pub expected_current: f32,
    pub measured_voltage: f32,
    pub timestamp_ms: u64,
    pub confidence: f32,
    pub auto_generated: bool,
}

/// Decision produced by [`LearningSystem::propose`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LearnedScale {
    pub learned: f32,
    pub blended: f32,
    pub total_weight: f32,
}

/// Weighted-average estimate over a set of points
///
/// Returns the raw `sum(expected * w) / sum(measured * w)` together with the
/// accumulated weight.
pub fn estimate_scale(
    points: impl IntoIterator<Item = CalibrationPoint>,
    now_ms: u64,
    learning_rate: f32,
    decay_per_day: f32,
) -> Result<(f32, f32), CalibrationError> {
    let mut numerator = 0.0_f32;
    let mut denominator = 0.0_f32;
    let mut total_weight = 0.0_f32;

    for point in points {
        if point.measured_voltage <= MIN_MEASURED_VOLTAGE {
            continue;
        }
        let age_days = now_ms.saturating_sub(point.timestamp_ms) as f32 / MS_PER_DAY;
        let weight = point.confidence * decay_per_day.powf(age_days) * learning_rate;

        numerator += point.expected_current * weight;
        denominator += point.measured_voltage * weight;
        total_weight += weight;
    }

    if denominator <= MIN_DENOMINATOR || total_weight <= MIN_TOTAL_WEIGHT {
        return Err(CalibrationError::DegenerateLearningData);
    }

    Ok((numerator / denominator, total_weight))
}

/// Learning System
pub struct LearningSystem {
    config: LearningConfig,
    points: RingBuffer<CalibrationPoint>,
    learning_rate: f32,
}

impl LearningSystem {
    pub fn new(config: LearningConfig) -> Self {
        let points = RingBuffer::new(config.capacity);
        let learning_rate = config.default_learning_rate;
        Self {
            config,
            points,
            learning_rate,
        }
    }

    /// Record a calibration observation, overwriting the oldest when full
    pub fn learn(&mut self, expected_current: f32, measured_voltage: f32, manual: bool, now_ms: u64) {
        let point = CalibrationPoint {
            expected_current,
            measured_voltage,
            timestamp_ms: now_ms,
            confidence: if manual {
                MANUAL_CONFIDENCE
            } else {
                AUTO_CONFIDENCE
            },
            auto_generated: !manual,
        };
        self.points.push(point);
        log::info!(
            "[Learning] Point added: {:.3}A -> {:.6}V ({})",
            expected_current,
            measured_voltage,
            if manual { "manual" } else { "auto" }
        );
    }

    /// Estimate a new scale and blend it with `current_scale`
    ///
    /// # Errors
    /// * `NotEnoughLearningPoints` - fewer points than `min_points`
    /// * `DegenerateLearningData` - weights or voltages too small
    /// * `LearnedScaleRejected` - estimate outside `current * (1 ± max_deviation)`
    pub fn propose(&self, current_scale: f32, now_ms: u64) -> Result<LearnedScale, CalibrationError> {
        if self.points.len() < self.config.min_points {
            return Err(CalibrationError::NotEnoughLearningPoints {
                required: self.config.min_points,
                available: self.points.len(),
            });
        }

        let (learned, total_weight) = estimate_scale(
            self.points.iter().copied(),
            now_ms,
            self.learning_rate,
            self.config.decay_per_day,
        )?;

        let lower = current_scale * (1.0 - self.config.max_deviation);
        let upper = current_scale * (1.0 + self.config.max_deviation);
        if !(learned > lower && learned < upper) {
            return Err(CalibrationError::LearnedScaleRejected {
                learned,
                current: current_scale,
            });
        }

        let blended =
            current_scale * self.config.blend_current + learned * (1.0 - self.config.blend_current);
        Ok(LearnedScale {
            learned,
            blended,
            total_weight,
        })
    }

    pub fn has_enough_points(&self) -> bool {
        self.points.len() >= self.config.min_points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn capacity(&self) -> usize {
        self.points.capacity()
    }

    pub fn points(&self) -> impl Iterator<Item = &CalibrationPoint> + '_ {
        self.points.iter()
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Set the learning rate; must lie in `[0, 1]`
    pub fn set_learning_rate(&mut self, rate: f32) -> Result<(), CalibrationError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(CalibrationError::InvalidParameter {
                name: "learning_rate",
                value: rate,
            });
        }
        self.learning_rate = rate;
        log::info!("[Learning] Learning rate set to {:.2}", rate);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.points.clear();
        log::info!("[Learning] Learning data reset");
    }
}
