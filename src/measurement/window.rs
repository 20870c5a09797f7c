//! Diagnostic window over the most recent AC voltage samples.

use serde::Serialize;

use crate::calibration::RingBuffer;

/// Summary statistics of a full sample window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowAnalysis {
    pub mean: f32,
    pub std_dev: f32,
    pub rms: f32,
    pub min: f32,
    pub max: f32,
    /// `E[x^2] - mean^2`
    pub variance: f32,
}

/// Ring of AC samples; never used for control decisions
pub struct SampleWindow {
    samples: RingBuffer<f32>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: RingBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, ac_voltage: f32) {
        self.samples.push(ac_voltage);
    }

    pub fn is_ready(&self) -> bool {
        self.samples.is_filled()
    }

    /// Statistics over the window, `None` until it has filled once
    pub fn analyze(&self) -> Option<WindowAnalysis> {
        if !self.samples.is_filled() {
            return None;
        }

        let n = self.samples.len() as f32;
        let mut sum = 0.0_f32;
        let mut sum_squared = 0.0_f32;
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for &v in self.samples.iter() {
            sum += v;
            sum_squared += v * v;
            min = min.min(v);
            max = max.max(v);
        }

        let mean = sum / n;
        let variance = sum_squared / n - mean * mean;
        Some(WindowAnalysis {
            mean,
            std_dev: variance.max(0.0).sqrt(),
            rms: (sum_squared / n).sqrt(),
            min,
            max,
            variance,
        })
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
