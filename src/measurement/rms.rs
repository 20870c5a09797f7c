//! RMS accumulation over one batch of AC samples.

/// One calibrated reading produced from a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsReading {
    /// RMS of the AC component, in volts
    pub voltage_rms: f32,
    /// `voltage_rms * scale`, in amps
    pub current_amps: f32,
    /// Ticks that were read successfully
    pub valid_samples: usize,
}

/// Running sum of squares for a batch
#[derive(Debug, Default, Clone, Copy)]
pub struct RmsAccumulator {
    sum_squared: f64,
    count: usize,
}

impl RmsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ac_voltage: f32) {
        let v = ac_voltage as f64;
        self.sum_squared += v * v;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn voltage_rms(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        Some((self.sum_squared / self.count as f64).sqrt() as f32)
    }

    /// Convert to a calibrated reading; `None` when no samples were pushed
    pub fn finish(&self, scale_factor: f32) -> Option<RmsReading> {
        let voltage_rms = self.voltage_rms()?;
        Some(RmsReading {
            voltage_rms,
            current_amps: voltage_rms * scale_factor,
            valid_samples: self.count,
        })
    }
}

/// RMS magnitude of the AC samples above `floor`, as `(rms, valid)`.
///
/// Used by known-load calibration: samples whose magnitude is at or below
/// `floor` are discarded.
pub fn rms_above_floor(ac_samples: &[f32], floor: f32) -> (f32, usize) {
    let mut acc = RmsAccumulator::new();
    for &ac in ac_samples {
        if ac.abs() > floor {
            acc.push(ac);
        }
    }
    (acc.voltage_rms().unwrap_or(0.0), acc.count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_empty_batch_has_no_reading() {
        assert!(RmsAccumulator::new().finish(200.0).is_none());
    }

    #[test]
    fn test_zero_signal_yields_zero_current() {
        let mut acc = RmsAccumulator::new();
        for _ in 0..100 {
            acc.push(0.0);
        }
        let reading = acc.finish(200.0).unwrap();
        assert_eq!(reading.current_amps, 0.0);
        assert_eq!(reading.valid_samples, 100);
    }

    #[test]
    fn test_sine_rms() {
        let peak = 0.05_f32;
        let mut acc = RmsAccumulator::new();
        for i in 0..100 {
            let phase = i as f32 * 2.0 * PI * 12.0 / 100.0;
            acc.push(peak * phase.sin());
        }
        let reading = acc.finish(200.0).unwrap();
        let expected_vrms = peak / 2.0_f32.sqrt();
        assert!((reading.voltage_rms - expected_vrms).abs() < 1e-4);
        assert!((reading.current_amps - expected_vrms * 200.0).abs() < 0.02);
    }

    #[test]
    fn test_rms_above_floor_discards_small_samples() {
        let samples = [0.0005, -0.0002, 0.02, -0.02, 0.02];
        let (rms, valid) = rms_above_floor(&samples, 0.001);
        assert_eq!(valid, 3);
        assert!((rms - 0.02).abs() < 1e-6);
    }
}
