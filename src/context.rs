// AppContext: explicitly owned calibration context
// Created once at startup and shared as Arc<AppContext> by the sampler, the
// auto-calibration controller and the command handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;

use crate::calibration::{
    next_sensitivity, AutoCalController, AutoCalStatistics, CalibrationParameters,
    CalibrationStore, ControllerHandle, DeviceCatalog, DeviceProfile, LearnedScale,
    LearningSystem, Recognition, StabilityDetector, StabilityEvent, StabilityState,
};
use crate::clock::TimeSource;
use crate::config::AppConfig;
use crate::error::{log_calibration_error, log_sensor_error, CalibrationError, ErrorCode};
use crate::hardware::{RawTick, Relay, SampleSource};
use crate::measurement::{
    rms_above_floor, MeasurementStats, RmsAccumulator, RmsReading, SampleWindow, WindowAnalysis,
};
use crate::telemetry::{CalibrationEvent, TelemetryCollector};

/// AC magnitudes at or below this are treated as noise during calibration
const AC_NOISE_FLOOR: f32 = 0.001;

/// State mutated by measurements, recognition and learning
///
/// Guarded by a single lock that is never held across sampling or an await.
struct MonitorState {
    window: SampleWindow,
    stats: MeasurementStats,
    measurement_count: u64,
    stability: StabilityDetector,
    catalog: DeviceCatalog,
    learning: LearningSystem,
    statistics: AutoCalStatistics,
    sensitivity: f32,
    detected_load: f32,
    last_sensitivity_adjust_ms: u64,
}

/// Snapshot reported by CAL_STATUS and embedded in telemetry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationStatus {
    pub bias_voltage: f32,
    pub scale_factor: f32,
    pub auto_calibration: bool,
    pub auto_detection: bool,
    pub detected_load: f32,
    pub learning_points: usize,
}

/// Snapshot reported by AUTO_CAL_STATUS
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AutoCalSummary {
    pub enabled: bool,
    pub statistics: AutoCalStatistics,
    pub uptime_ms: u64,
    pub learning_points: usize,
    pub sensitivity: f32,
}

/// Snapshot reported by LEARNING_STATS
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LearningSummary {
    pub points: usize,
    pub learning_rate: f32,
    pub capacity: usize,
}

/// Snapshot reported by GET_CURRENT
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstantReading {
    /// Single-tick reading, `None` when the tick failed
    pub instant_amps: Option<f32>,
    pub detected_amps: f32,
    pub last_voltage_rms: f32,
}

/// AppContext: the calibration core and its collaborators
pub struct AppContext {
    config: AppConfig,
    clock: Arc<dyn TimeSource>,
    source: Arc<dyn SampleSource>,
    relay: Arc<dyn Relay>,
    store: CalibrationStore,
    monitor: Mutex<MonitorState>,
    auto_calibration: AtomicBool,
    auto_detection: AtomicBool,
    telemetry_running: AtomicBool,
    controller: Mutex<Option<ControllerHandle>>,
    telemetry: TelemetryCollector,
}

impl AppContext {
    /// Create a context with manufacturer defaults
    ///
    /// Bias starts at the configured mid-rail voltage and scale at the
    /// theoretical CT scale. No task is started until [`AppContext::startup`].
    pub fn new(
        config: AppConfig,
        source: Arc<dyn SampleSource>,
        relay: Arc<dyn Relay>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let defaults = CalibrationParameters {
            bias_voltage: config.sensor.default_bias_voltage,
            scale_factor: config.sensor.theoretical_scale(),
        };
        let store = CalibrationStore::new(
            defaults,
            config.sensor.reference_voltage,
            Duration::from_millis(config.auto_cal.lock_timeout_ms),
        );
        let monitor = MonitorState {
            window: SampleWindow::new(config.measurement.window_size),
            stats: MeasurementStats::default(),
            measurement_count: 0,
            stability: StabilityDetector::new(config.stability.clone()),
            catalog: DeviceCatalog::stock(),
            learning: LearningSystem::new(config.learning.clone()),
            statistics: AutoCalStatistics::default(),
            sensitivity: config.recognition.default_sensitivity,
            detected_load: 0.0,
            last_sensitivity_adjust_ms: 0,
        };

        Self {
            auto_calibration: AtomicBool::new(config.auto_cal.enabled),
            auto_detection: AtomicBool::new(true),
            telemetry_running: AtomicBool::new(false),
            controller: Mutex::new(None),
            telemetry: TelemetryCollector::default(),
            config,
            clock,
            source,
            relay,
            store,
            monitor: Mutex::new(monitor),
        }
    }

    // ========================================================================
    // LOCK HELPER METHODS
    // ========================================================================

    fn monitor(&self) -> Result<MutexGuard<'_, MonitorState>, CalibrationError> {
        self.monitor
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn controller_slot(&self) -> Result<MutexGuard<'_, Option<ControllerHandle>>, CalibrationError> {
        self.controller
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn report_failure(&self, err: &CalibrationError, context: &str) {
        log_calibration_error(err, context);
        self.telemetry.publish(CalibrationEvent::CalibrationFailed {
            code: err.code(),
            context: context.to_string(),
        });
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn auto_calibration_enabled(&self) -> bool {
        self.auto_calibration.load(Ordering::SeqCst)
    }

    pub fn auto_detection_enabled(&self) -> bool {
        self.auto_detection.load(Ordering::SeqCst)
    }

    pub fn set_auto_detection(&self, enabled: bool) {
        self.auto_detection.store(enabled, Ordering::SeqCst);
        log::info!(
            "[Context] Auto-detection {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn telemetry_running(&self) -> bool {
        self.telemetry_running.load(Ordering::SeqCst)
    }

    pub fn set_telemetry_running(&self, running: bool) {
        self.telemetry_running.store(running, Ordering::SeqCst);
    }

    pub fn controller_running(&self) -> bool {
        match self.controller_slot() {
            Ok(slot) => slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false),
            Err(_) => false,
        }
    }

    // ========================================================================
    // SAMPLING
    // ========================================================================

    /// Read `count` ticks, sleeping `interval_ms` between reads
    ///
    /// Failed reads are skipped and not counted; the last failure of the
    /// batch is logged once.
    async fn sample_batch(&self, count: usize, interval_ms: u64) -> Vec<RawTick> {
        let mut ticks = Vec::with_capacity(count);
        let mut failures = 0usize;
        let mut last_error = None;

        for _ in 0..count {
            match self.source.read_one() {
                Ok(raw) => ticks.push(raw),
                Err(err) => {
                    failures += 1;
                    last_error = Some(err);
                }
            }
            if interval_ms > 0 {
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
        }

        if let Some(err) = last_error {
            log_sensor_error(
                &err,
                &format!("sample_batch ({} of {} ticks failed)", failures, count),
            );
        }
        ticks
    }

    fn to_ac(&self, raw: RawTick, bias_voltage: f32) -> f32 {
        self.config.sensor.raw_to_voltage(raw) - bias_voltage
    }

    // ========================================================================
    // RMS MEASUREMENT ENGINE
    // ========================================================================

    /// Take one batch and convert it into a calibrated current reading
    ///
    /// A batch with no successful tick yields a zero reading with a warning
    /// and does not touch the statistics. Every other reading updates the
    /// running statistics and the stability detector, and may trigger
    /// recognition, stable-load recalibration and the detection pass.
    pub async fn measure_current(&self) -> Result<RmsReading, CalibrationError> {
        let params = self.store.snapshot().await?;
        let measurement = &self.config.measurement;
        let ticks = self
            .sample_batch(measurement.batch_size, measurement.sample_interval_ms)
            .await;

        let ac_samples: Vec<f32> = ticks
            .iter()
            .map(|&raw| self.to_ac(raw, params.bias_voltage))
            .collect();
        let mut acc = RmsAccumulator::new();
        for &ac in &ac_samples {
            acc.push(ac);
        }
        let reading = match acc.finish(params.scale_factor) {
            Some(reading) => reading,
            None => {
                log::warn!("[Rms] No valid samples obtained, reporting 0 A");
                return Ok(RmsReading {
                    voltage_rms: 0.0,
                    current_amps: 0.0,
                    valid_samples: 0,
                });
            }
        };

        let now = self.clock.now_ms();
        let (event, run_detection, count) = {
            let mut monitor = self.monitor()?;
            for &ac in &ac_samples {
                monitor.window.push(ac);
            }
            monitor.stats.record(&reading);
            monitor.detected_load = reading.current_amps;
            monitor.measurement_count += 1;

            let last_scale_cal = monitor.statistics.last_scale_cal_ms;
            let event = monitor
                .stability
                .observe(reading.current_amps, now, last_scale_cal);
            let count = monitor.measurement_count;
            let run_detection =
                self.auto_detection_enabled() && count % measurement.detection_every.max(1) == 0;
            (event, run_detection, count)
        };

        if count % 100 == 0 {
            log::info!(
                "[Rms] Measurement #{}: {:.3}A ({:.6} V RMS)",
                count,
                reading.current_amps,
                reading.voltage_rms
            );
        }

        self.handle_stability_event(event).await;

        if run_detection {
            if let Err(err) = self.detect_load().await {
                self.report_failure(&err, "detect_load");
            }
        }

        Ok(reading)
    }

    async fn handle_stability_event(&self, event: StabilityEvent) {
        match event {
            StabilityEvent::StableStarted { value } => {
                self.telemetry
                    .publish(CalibrationEvent::StableLoad { current_amps: value });
                if self.auto_calibration_enabled() {
                    if let Err(err) = self.recognize_and_calibrate(value).await {
                        self.report_failure(&err, "recognize_and_calibrate");
                    }
                }
            }
            StabilityEvent::HoldExpired {
                value,
                recalibrate: true,
            } if self.auto_calibration_enabled() => {
                log::info!("[Stability] Auto-calibrating with stable load: {:.3}A", value);
                if let Err(err) = self.calibrate_with_known_load(value, true).await {
                    self.report_failure(&err, "stable_load_recalibration");
                }
            }
            _ => {}
        }
    }

    /// Averaged detection pass used for reporting
    ///
    /// Averages per-tick `|v - bias| * scale` over the detection batch,
    /// ignoring values at or above the rated maximum, and stores the result
    /// as the detected load.
    pub async fn detect_load(&self) -> Result<f32, CalibrationError> {
        let params = self.store.snapshot().await?;
        let measurement = &self.config.measurement;
        let ticks = self
            .sample_batch(measurement.detection_samples, measurement.detection_interval_ms)
            .await;

        let max_current = self.config.sensor.max_current_amps;
        let currents: Vec<f32> = ticks
            .iter()
            .map(|&raw| self.to_ac(raw, params.bias_voltage).abs() * params.scale_factor)
            .filter(|current| (0.0..max_current).contains(current))
            .collect();

        if currents.is_empty() {
            return Err(CalibrationError::InsufficientSamples {
                required: 1,
                collected: 0,
            });
        }

        let average = currents.iter().sum::<f32>() / currents.len() as f32;
        self.monitor()?.detected_load = average;
        log::info!(
            "[Rms] Detected load: {:.3} A (from {} samples)",
            average,
            currents.len()
        );
        Ok(average)
    }

    /// Single-tick reading plus the latest detected load and VRMS
    pub async fn instant_reading(&self) -> Result<InstantReading, CalibrationError> {
        let params = self.store.snapshot().await?;
        let instant_amps = match self.source.read_one() {
            Ok(raw) => Some(self.to_ac(raw, params.bias_voltage).abs() * params.scale_factor),
            Err(err) => {
                log_sensor_error(&err, "instant_reading");
                None
            }
        };
        let monitor = self.monitor()?;
        Ok(InstantReading {
            instant_amps,
            detected_amps: monitor.detected_load,
            last_voltage_rms: monitor.stats.last_voltage_rms,
        })
    }

    // ========================================================================
    // CALIBRATION PRIMITIVES
    // ========================================================================

    /// Re-anchor the bias from a no-load batch
    ///
    /// # Arguments
    /// * `automatic` - Triggered by the controller rather than an operator
    ///
    /// # Errors
    /// `InsufficientSamples` unless more than `zero_min_valid` ticks were read;
    /// the stored bias is left untouched in that case.
    pub async fn zero_calibrate(&self, automatic: bool) -> Result<f32, CalibrationError> {
        self.run_zero_calibration(automatic, true).await
    }

    /// Zero calibration body; `stamp` controls whether the run restarts the
    /// automatic zero-calibration interval
    async fn run_zero_calibration(
        &self,
        automatic: bool,
        stamp: bool,
    ) -> Result<f32, CalibrationError> {
        let cfg = &self.config.auto_cal;
        log::info!("[ZeroCal] Sampling {} ticks for bias voltage", cfg.zero_batch);
        let ticks = self
            .sample_batch(cfg.zero_batch, cfg.zero_sample_interval_ms)
            .await;

        if ticks.len() <= cfg.zero_min_valid {
            return Err(CalibrationError::InsufficientSamples {
                required: cfg.zero_min_valid + 1,
                collected: ticks.len(),
            });
        }

        let avg_raw = ticks.iter().map(|&raw| raw as f64).sum::<f64>() / ticks.len() as f64;
        let bias = (avg_raw / self.config.sensor.adc_resolution as f64
            * self.config.sensor.reference_voltage as f64) as f32;
        self.store.set_bias(bias).await?;

        let now = self.clock.now_ms();
        {
            let mut monitor = self.monitor()?;
            monitor.stability.reset_near_zero();
            if stamp {
                monitor.statistics.record_zero_cal(now, automatic);
            }
        }

        self.telemetry.publish(CalibrationEvent::ZeroCalibrated {
            bias_voltage: bias,
            valid_samples: ticks.len(),
            automatic,
        });
        Ok(bias)
    }

    /// Derive the scale factor from a batch taken under a known load
    ///
    /// # Arguments
    /// * `known_amps` - Actual load current, in `(0, max_current_amps]`
    /// * `automatic` - Recorded as an auto learning point (confidence 0.8)
    ///   rather than a manual one (1.0)
    ///
    /// # Errors
    /// - `InvalidParameter` for a non-positive or over-range current
    /// - `InsufficientSamples` unless more than `known_load_min_valid`
    ///   samples rose above the noise floor
    pub async fn calibrate_with_known_load(
        &self,
        known_amps: f32,
        automatic: bool,
    ) -> Result<f32, CalibrationError> {
        if !(known_amps > 0.0 && known_amps <= self.config.sensor.max_current_amps) {
            return Err(CalibrationError::InvalidParameter {
                name: "known_amps",
                value: known_amps,
            });
        }

        let bias = self.store.get_bias().await?;
        let cfg = &self.config.auto_cal;
        log::info!("[ScaleCal] Calibrating with known load: {:.3} A", known_amps);
        let ticks = self
            .sample_batch(cfg.known_load_batch, cfg.known_load_interval_ms)
            .await;

        let ac_samples: Vec<f32> = ticks.iter().map(|&raw| self.to_ac(raw, bias)).collect();
        let (voltage_rms, valid) = rms_above_floor(&ac_samples, AC_NOISE_FLOOR);
        if valid <= cfg.known_load_min_valid {
            return Err(CalibrationError::InsufficientSamples {
                required: cfg.known_load_min_valid + 1,
                collected: valid,
            });
        }

        let scale = known_amps / voltage_rms;
        self.store.set_scale(scale).await?;

        let now = self.clock.now_ms();
        {
            let mut monitor = self.monitor()?;
            monitor
                .learning
                .learn(known_amps, voltage_rms, !automatic, now);
            monitor.statistics.record_scale_cal(now, automatic);
        }

        log::info!(
            "[ScaleCal] Calibration complete: {:.2} A/V (from {:.4} V RMS)",
            scale,
            voltage_rms
        );
        self.telemetry.publish(CalibrationEvent::ScaleCalibrated {
            known_amps,
            scale_factor: scale,
            automatic,
        });
        Ok(scale)
    }

    /// Set bias and scale directly
    pub async fn manual_calibrate(
        &self,
        bias_voltage: f32,
        scale_factor: f32,
    ) -> Result<CalibrationParameters, CalibrationError> {
        let params = CalibrationParameters {
            bias_voltage,
            scale_factor,
        };
        self.store.set_parameters(params).await?;
        self.telemetry.publish(CalibrationEvent::ParametersSet {
            bias_voltage,
            scale_factor,
        });
        Ok(params)
    }

    /// Operator bias override, limited to `sensor.bias_range`
    pub async fn set_bias(&self, bias_voltage: f32) -> Result<f32, CalibrationError> {
        let (low, high) = self.config.sensor.bias_range;
        if !(low..=high).contains(&bias_voltage) {
            return Err(CalibrationError::InvalidParameter {
                name: "bias_voltage",
                value: bias_voltage,
            });
        }
        self.store.set_bias(bias_voltage).await?;
        Ok(bias_voltage)
    }

    /// Operator scale override, limited to `sensor.scale_range`
    pub async fn set_scale(&self, scale_factor: f32) -> Result<f32, CalibrationError> {
        let (low, high) = self.config.sensor.scale_range;
        if !(low..=high).contains(&scale_factor) {
            return Err(CalibrationError::InvalidParameter {
                name: "scale_factor",
                value: scale_factor,
            });
        }
        self.store.set_scale(scale_factor).await?;
        Ok(scale_factor)
    }

    /// Restore defaults, clear learning history and auto-calibration statistics
    pub async fn reset_calibration(&self) -> Result<CalibrationParameters, CalibrationError> {
        let params = self.store.reset().await?;
        {
            let mut monitor = self.monitor()?;
            monitor.learning.reset();
            monitor.statistics.reset();
        }
        log::info!("[Context] Calibration reset to defaults");
        self.telemetry.publish(CalibrationEvent::CalibrationReset {
            bias_voltage: params.bias_voltage,
            scale_factor: params.scale_factor,
        });
        Ok(params)
    }

    // ========================================================================
    // RECOGNITION
    // ========================================================================

    /// Catalog lookup without side effects
    pub fn recognize(&self, current_amps: f32) -> Result<Option<DeviceProfile>, CalibrationError> {
        Ok(self.monitor()?.catalog.recognize(current_amps).cloned())
    }

    /// Recognize a stable load and calibrate against it when confident
    ///
    /// A match bumps the success or failure counter depending on the
    /// confidence gate; no match leaves both counters alone. An accepted
    /// match calibrates against the profile's typical current.
    pub async fn recognize_and_calibrate(
        &self,
        current_amps: f32,
    ) -> Result<Option<Recognition>, CalibrationError> {
        let recognition = {
            let mut monitor = self.monitor()?;
            let sensitivity = monitor.sensitivity;
            let assessed = monitor.catalog.assess(
                current_amps,
                sensitivity,
                self.config.recognition.confidence_threshold,
            );
            if let Some(recognition) = &assessed {
                monitor.statistics.record_recognition(recognition.accepted);
            }
            assessed
        };

        let recognition = match recognition {
            Some(recognition) => recognition,
            None => {
                log::info!("[Recognition] No known device at {:.3}A", current_amps);
                return Ok(None);
            }
        };

        self.telemetry.publish(CalibrationEvent::DeviceRecognized {
            name: recognition.profile.name.clone(),
            confidence: recognition.confidence,
            accepted: recognition.accepted,
        });

        if recognition.accepted {
            log::info!(
                "[Recognition] {} at {:.3}A, confidence {:.2}: calibrating with {:.2}A",
                recognition.profile.name,
                current_amps,
                recognition.confidence,
                recognition.profile.typical_current
            );
            if let Err(err) = self
                .calibrate_with_known_load(recognition.profile.typical_current, true)
                .await
            {
                self.report_failure(&err, "recognition_calibration");
            }
        } else {
            log::info!(
                "[Recognition] {} at {:.3}A, low confidence {:.2}: skipping calibration",
                recognition.profile.name,
                current_amps,
                recognition.confidence
            );
        }

        Ok(Some(recognition))
    }

    /// Run recognition against the latest detected load
    pub async fn auto_recognize(&self) -> Result<(f32, Option<Recognition>), CalibrationError> {
        let detected = self.monitor()?.detected_load;
        let recognition = self.recognize_and_calibrate(detected).await?;
        Ok((detected, recognition))
    }

    pub fn device_listing(&self) -> Result<String, CalibrationError> {
        Ok(self.monitor()?.catalog.listing())
    }

    pub fn add_custom_profile(
        &self,
        min: f32,
        max: f32,
        typical: f32,
        name: &str,
    ) -> Result<(), CalibrationError> {
        self.monitor()?.catalog.add_custom(min, max, typical, name)
    }

    pub fn sensitivity(&self) -> Result<f32, CalibrationError> {
        Ok(self.monitor()?.sensitivity)
    }

    /// Operator sensitivity override in `[0, 1]`
    pub fn set_sensitivity(&self, sensitivity: f32) -> Result<f32, CalibrationError> {
        if !(0.0..=1.0).contains(&sensitivity) {
            return Err(CalibrationError::InvalidParameter {
                name: "sensitivity",
                value: sensitivity,
            });
        }
        self.monitor()?.sensitivity = sensitivity;
        log::info!("[Recognition] Sensitivity set to {:.2}", sensitivity);
        Ok(sensitivity)
    }

    // ========================================================================
    // LEARNING
    // ========================================================================

    /// Blend the learned scale into the store
    pub async fn apply_learned_calibration(&self) -> Result<LearnedScale, CalibrationError> {
        let current = self.store.get_scale().await?;
        let now = self.clock.now_ms();
        let proposal = self.monitor()?.learning.propose(current, now)?;
        self.store.set_scale(proposal.blended).await?;

        log::info!(
            "[Learning] Applied learned calibration: {:.2} -> {:.2} A/V (weight {:.2})",
            current,
            proposal.blended,
            proposal.total_weight
        );
        self.telemetry.publish(CalibrationEvent::LearnedScaleApplied {
            previous: current,
            learned: proposal.learned,
            applied: proposal.blended,
        });
        Ok(proposal)
    }

    pub fn has_enough_learning_points(&self) -> Result<bool, CalibrationError> {
        Ok(self.monitor()?.learning.has_enough_points())
    }

    pub fn learning_summary(&self) -> Result<LearningSummary, CalibrationError> {
        let monitor = self.monitor()?;
        Ok(LearningSummary {
            points: monitor.learning.point_count(),
            learning_rate: monitor.learning.learning_rate(),
            capacity: monitor.learning.capacity(),
        })
    }

    pub fn set_learning_rate(&self, rate: f32) -> Result<f32, CalibrationError> {
        self.monitor()?.learning.set_learning_rate(rate)?;
        Ok(rate)
    }

    pub fn reset_learning(&self) -> Result<(), CalibrationError> {
        self.monitor()?.learning.reset();
        Ok(())
    }

    // ========================================================================
    // AUTO-CALIBRATION CONTROL
    // ========================================================================

    /// Zero recalibration is due when the interval has elapsed and the
    /// near-zero streak is long enough
    pub fn zero_calibration_due(&self) -> Result<bool, CalibrationError> {
        if !self.auto_calibration_enabled() {
            return Ok(false);
        }
        let cfg = &self.config.auto_cal;
        let now = self.clock.now_ms();
        let monitor = self.monitor()?;
        let interval_elapsed =
            now.saturating_sub(monitor.statistics.last_zero_cal_ms) > cfg.zero_interval_ms;
        let consistent_zeros = monitor.stability.consecutive_near_zero() > cfg.consecutive_zero_count;
        Ok(interval_elapsed && consistent_zeros)
    }

    /// Nudge recognition sensitivity from the recent success rate
    ///
    /// Runs at most once per `adjust_interval_ms`; returns the new value when
    /// it changed.
    pub fn adapt_sensitivity(&self) -> Result<Option<f32>, CalibrationError> {
        let now = self.clock.now_ms();
        let (from, to, success_rate) = {
            let mut monitor = self.monitor()?;
            if now.saturating_sub(monitor.last_sensitivity_adjust_ms)
                < self.config.auto_cal.adjust_interval_ms
            {
                return Ok(None);
            }
            let success_rate = monitor.statistics.success_rate();
            let from = monitor.sensitivity;
            let to = next_sensitivity(
                from,
                success_rate,
                self.config.recognition.sensitivity_bounds,
                self.config.recognition.sensitivity_step,
            );
            monitor.sensitivity = to;
            monitor.last_sensitivity_adjust_ms = now;
            (from, to, success_rate)
        };

        if (to - from).abs() <= f32::EPSILON {
            return Ok(None);
        }
        log::info!(
            "[Recognition] Sensitivity {:.2} -> {:.2} (success rate {:.2})",
            from,
            to,
            success_rate
        );
        self.telemetry.publish(CalibrationEvent::SensitivityAdjusted {
            from,
            to,
            success_rate,
        });
        Ok(Some(to))
    }

    /// Enable or disable the auto-calibration controller
    ///
    /// Enabling spawns the controller task if it is not already running;
    /// disabling cancels it at its next suspension point.
    pub fn set_auto_calibration(self: &Arc<Self>, enabled: bool) -> Result<(), CalibrationError> {
        self.auto_calibration.store(enabled, Ordering::SeqCst);
        {
            let mut slot = self.controller_slot()?;
            if enabled {
                let running = slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false);
                if !running {
                    *slot = Some(AutoCalController::spawn(Arc::clone(self)));
                }
            } else if let Some(handle) = slot.take() {
                handle.cancel();
            }
        }

        log::info!(
            "[Context] Auto-calibration {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.telemetry
            .publish(CalibrationEvent::AutoCalibrationToggled { enabled });
        Ok(())
    }

    // ========================================================================
    // STATUS & STATISTICS
    // ========================================================================

    pub async fn calibration_status(&self) -> Result<CalibrationStatus, CalibrationError> {
        let params = self.store.snapshot().await?;
        let monitor = self.monitor()?;
        Ok(CalibrationStatus {
            bias_voltage: params.bias_voltage,
            scale_factor: params.scale_factor,
            auto_calibration: self.auto_calibration_enabled(),
            auto_detection: self.auto_detection_enabled(),
            detected_load: monitor.detected_load,
            learning_points: monitor.learning.point_count(),
        })
    }

    pub fn auto_cal_summary(&self) -> Result<AutoCalSummary, CalibrationError> {
        let monitor = self.monitor()?;
        Ok(AutoCalSummary {
            enabled: self.auto_calibration_enabled(),
            statistics: monitor.statistics,
            uptime_ms: self.clock.now_ms(),
            learning_points: monitor.learning.point_count(),
            sensitivity: monitor.sensitivity,
        })
    }

    pub fn measurement_stats(&self) -> Result<MeasurementStats, CalibrationError> {
        Ok(self.monitor()?.stats)
    }

    pub fn buffer_analysis(&self) -> Result<Option<WindowAnalysis>, CalibrationError> {
        Ok(self.monitor()?.window.analyze())
    }

    pub fn stability_state(&self) -> Result<StabilityState, CalibrationError> {
        Ok(self.monitor()?.stability.state())
    }

    /// Clear measurement and auto-calibration statistics
    pub fn reset_statistics(&self) -> Result<(), CalibrationError> {
        let mut monitor = self.monitor()?;
        monitor.stats.reset();
        monitor.measurement_count = 0;
        monitor.statistics.reset();
        log::info!("[Context] Measurement and auto-calibration statistics reset");
        Ok(())
    }

    // ========================================================================
    // RELAY
    // ========================================================================

    pub fn set_relay(&self, on: bool) {
        self.relay.set(on);
        log::info!("[Relay] {}", if on { "ON" } else { "OFF" });
    }

    pub fn relay_state(&self) -> bool {
        self.relay.get()
    }

    pub fn toggle_relay(&self) -> bool {
        let next = !self.relay.get();
        self.set_relay(next);
        next
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Startup zero calibration, then the controller if enabled
    ///
    /// Assumes no load is connected. A failed zero calibration is logged and
    /// the manufacturer bias stays in place. The startup run does not restart
    /// the automatic zero-calibration interval, which stays measured from boot.
    pub async fn startup(self: &Arc<Self>) -> Result<(), CalibrationError> {
        let defaults = self.store.defaults();
        log::info!(
            "[Context] Starting with bias {:.4} V, scale {:.1} A/V, auto-calibration {}",
            defaults.bias_voltage,
            defaults.scale_factor,
            if self.auto_calibration_enabled() { "ON" } else { "OFF" }
        );

        match self.run_zero_calibration(false, false).await {
            Ok(bias) => log::info!("[Context] Startup bias calibrated to {:.4} V", bias),
            Err(err) => self.report_failure(&err, "startup_zero_calibration"),
        }

        if self.auto_calibration_enabled() {
            self.set_auto_calibration(true)?;
        }
        Ok(())
    }

    /// Cancel the controller and wait for it to exit
    pub async fn shutdown(&self) {
        let handle = match self.controller_slot() {
            Ok(mut slot) => slot.take(),
            Err(err) => {
                log_calibration_error(&err, "shutdown");
                None
            }
        };
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }
}
