//! Configuration management for sensor physics and calibration tuning
//!
//! This module provides runtime configuration loading from JSON files so the
//! sensor constants, stability thresholds, and controller cadence can be
//! adjusted without recompilation. Every section has defaults matching the
//! stock CT-clamp hardware, so a missing or partial file is never fatal.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub measurement: MeasurementConfig,
    pub stability: StabilityConfig,
    pub recognition: RecognitionConfig,
    pub learning: LearningConfig,
    pub auto_cal: AutoCalConfig,
    pub network: NetworkConfig,
}

/// Transducer and ADC physics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Full-scale raw reading of the ADC
    pub adc_resolution: u16,
    /// ADC reference voltage in volts
    pub reference_voltage: f32,
    /// Manufacturer bias voltage (mid-rail)
    pub default_bias_voltage: f32,
    /// Burden resistor in ohms
    pub burden_resistor_ohms: f32,
    /// Secondary current at rated primary current, in amps
    pub max_secondary_current: f32,
    /// CT turns ratio
    pub transformation_ratio: f32,
    /// Rated primary current in amps
    pub max_current_amps: f32,
    /// Accepted range for SET_BIAS
    pub bias_range: (f32, f32),
    /// Accepted range for SET_SCALE
    pub scale_range: (f32, f32),
}

impl SensorConfig {
    /// Manufacturer scale factor in A/V derived from CT physics
    pub fn theoretical_scale(&self) -> f32 {
        self.max_current_amps / (self.max_secondary_current * self.burden_resistor_ohms)
    }

    /// Convert a raw ADC reading to volts
    pub fn raw_to_voltage(&self, raw: u16) -> f32 {
        raw as f32 / self.adc_resolution as f32 * self.reference_voltage
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            adc_resolution: 4095,
            reference_voltage: 3.3,
            default_bias_voltage: 1.65,
            burden_resistor_ohms: 10.0,
            max_secondary_current: 0.05,
            transformation_ratio: 2000.0,
            max_current_amps: 100.0,
            bias_range: (0.1, 3.0),
            scale_range: (1.0, 1000.0),
        }
    }
}

/// RMS engine and sampler cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Raw ticks per RMS measurement
    pub batch_size: usize,
    /// Delay between ticks in a batch
    pub sample_interval_ms: u64,
    /// Run the averaged detection pass every N measurements
    pub detection_every: u64,
    /// Ticks in a detection pass
    pub detection_samples: usize,
    /// Delay between detection ticks
    pub detection_interval_ms: u64,
    /// Nominal mains voltage used for power estimates
    pub mains_voltage: f32,
    /// Telemetry broadcast period
    pub telemetry_interval_ms: u64,
    /// Capacity of the diagnostic sample window
    pub window_size: usize,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            sample_interval_ms: 2,
            detection_every: 50,
            detection_samples: 20,
            detection_interval_ms: 100,
            mains_voltage: 120.0,
            telemetry_interval_ms: 2000,
            window_size: 100,
        }
    }
}

/// History and stability detector thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub history_size: usize,
    pub variance_threshold: f32,
    pub min_current: f32,
    pub max_current: f32,
    /// Readings below this count toward zero-calibration eligibility
    pub zero_threshold: f32,
    /// Hold time before a stable load may trigger scale recalibration
    pub stable_time_ms: u64,
    /// Minimum time between scale recalibrations
    pub scale_recal_interval_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            history_size: 50,
            variance_threshold: 0.1,
            min_current: 0.5,
            max_current: 15.0,
            zero_threshold: 0.05,
            stable_time_ms: 180_000,
            scale_recal_interval_ms: 1_800_000,
        }
    }
}

/// Device recognition gating
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub confidence_threshold: f32,
    pub default_sensitivity: f32,
    /// Bounds enforced by the adaptive sensitivity loop
    pub sensitivity_bounds: (f32, f32),
    /// Step applied by each sensitivity adjustment
    pub sensitivity_step: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.9,
            default_sensitivity: 0.7,
            sensitivity_bounds: (0.3, 0.9),
            sensitivity_step: 0.05,
        }
    }
}

/// Learning estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub capacity: usize,
    pub min_points: usize,
    pub decay_per_day: f32,
    pub default_learning_rate: f32,
    /// Weight of the current scale in the damped update
    pub blend_current: f32,
    /// Maximum relative deviation of a learned scale from the current one
    pub max_deviation: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            min_points: 3,
            decay_per_day: 0.95,
            default_learning_rate: 0.1,
            blend_current: 0.7,
            max_deviation: 0.5,
        }
    }
}

/// Auto-calibration controller cadence and sampling budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCalConfig {
    pub enabled: bool,
    pub period_ms: u64,
    pub zero_interval_ms: u64,
    pub consecutive_zero_count: u32,
    pub zero_batch: usize,
    pub zero_min_valid: usize,
    pub zero_sample_interval_ms: u64,
    pub known_load_batch: usize,
    pub known_load_min_valid: usize,
    pub known_load_interval_ms: u64,
    /// Sensitivity adaptation cadence
    pub adjust_interval_ms: u64,
    /// Bounded wait on the parameter store lock
    pub lock_timeout_ms: u64,
}

impl Default for AutoCalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 30_000,
            zero_interval_ms: 1_800_000,
            consecutive_zero_count: 150,
            zero_batch: 100,
            zero_min_valid: 50,
            zero_sample_interval_ms: 10,
            known_load_batch: 50,
            known_load_min_valid: 10,
            known_load_interval_ms: 50,
            adjust_interval_ms: 3_600_000,
            lock_timeout_ms: 100,
        }
    }
}

/// UDP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub command_port: u16,
    pub telemetry_port: u16,
    pub telemetry_target: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            command_port: 3334,
            telemetry_port: 3333,
            telemetry_target: "255.255.255.255".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or
    /// its JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("config/ampsense.json")
    }

    /// Configuration with every sampling delay zeroed, for tests and replay
    pub fn without_delays() -> Self {
        let mut config = Self::default();
        config.measurement.sample_interval_ms = 0;
        config.measurement.detection_interval_ms = 0;
        config.auto_cal.zero_sample_interval_ms = 0;
        config.auto_cal.known_load_interval_ms = 0;
        config
    }
}
