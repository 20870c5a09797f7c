// Auto-calibration counters, reset only by an explicit operator command

use serde::Serialize;

/// Counters describing auto-calibration activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AutoCalStatistics {
    /// Auto-calibrations committed (zero and scale)
    pub auto_cal_count: u32,
    pub successful_recognitions: u32,
    /// Recognitions that matched a profile but fell below the confidence threshold
    pub failed_recognitions: u32,
    pub last_auto_cal_ms: u64,
    pub last_zero_cal_ms: u64,
    pub last_scale_cal_ms: u64,
}

impl AutoCalStatistics {
    /// Recognition success rate, 0.5 before any attempt
    pub fn success_rate(&self) -> f32 {
        let attempts = self.successful_recognitions + self.failed_recognitions;
        if attempts == 0 {
            return 0.5;
        }
        self.successful_recognitions as f32 / attempts as f32
    }

    pub fn record_recognition(&mut self, accepted: bool) {
        if accepted {
            self.successful_recognitions += 1;
        } else {
            self.failed_recognitions += 1;
        }
    }

    pub fn record_zero_cal(&mut self, now_ms: u64, automatic: bool) {
        self.last_zero_cal_ms = now_ms;
        if automatic {
            self.auto_cal_count += 1;
            self.last_auto_cal_ms = now_ms;
        }
    }

    pub fn record_scale_cal(&mut self, now_ms: u64, automatic: bool) {
        self.last_scale_cal_ms = now_ms;
        self.last_auto_cal_ms = now_ms;
        if automatic {
            self.auto_cal_count += 1;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
