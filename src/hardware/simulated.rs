use std::f32::consts::{PI, SQRT_2};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use rand::Rng;

use crate::config::SensorConfig;
use crate::error::SensorError;

use super::{RawTick, Relay, SampleSource};

/// Phase advance per tick: 60 Hz mains sampled every 2 ms.
const PHASE_STEP: f32 = 2.0 * PI * 60.0 * 0.002;

/// Simulated CT clamp feeding a biased ADC input.
///
/// Produces a sine of the configured load current on top of a DC bias, with
/// optional uniform noise and random read failures. Phase advances by a
/// fixed step per read, so any batch of 100 ticks spans whole mains cycles
/// regardless of wall-clock timing.
pub struct SimulatedSensor {
    sensor: SensorConfig,
    /// Physical A/V of the simulated CT + burden
    true_scale: f32,
    bias_voltage: AtomicU32,
    load_amps: AtomicU32,
    noise_volts: AtomicU32,
    failure_rate: AtomicU32,
    disconnected: AtomicBool,
    tick: AtomicU64,
}

impl SimulatedSensor {
    pub fn new(sensor: SensorConfig) -> Self {
        let true_scale = sensor.theoretical_scale();
        let bias = sensor.default_bias_voltage;
        Self {
            sensor,
            true_scale,
            bias_voltage: AtomicU32::new(bias.to_bits()),
            load_amps: AtomicU32::new(0.0_f32.to_bits()),
            noise_volts: AtomicU32::new(0.0_f32.to_bits()),
            failure_rate: AtomicU32::new(0.0_f32.to_bits()),
            disconnected: AtomicBool::new(false),
            tick: AtomicU64::new(0),
        }
    }

    /// Override the physical A/V ratio, e.g. to model a mis-specified burden.
    pub fn with_true_scale(mut self, true_scale: f32) -> Self {
        self.true_scale = true_scale;
        self
    }

    pub fn set_load_amps(&self, amps: f32) {
        store_f32(&self.load_amps, amps.max(0.0));
    }

    pub fn load_amps(&self) -> f32 {
        load_f32(&self.load_amps)
    }

    /// Move the DC operating point, e.g. to model bias drift.
    pub fn set_bias_voltage(&self, volts: f32) {
        store_f32(&self.bias_voltage, volts);
    }

    pub fn set_noise_volts(&self, volts: f32) {
        store_f32(&self.noise_volts, volts.abs());
    }

    /// Probability in `[0, 1]` that a single read fails.
    pub fn set_failure_rate(&self, rate: f32) {
        store_f32(&self.failure_rate, rate.clamp(0.0, 1.0));
    }

    pub fn set_disconnected(&self, disconnected: bool) {
        self.disconnected.store(disconnected, Ordering::SeqCst);
    }

    fn voltage_at(&self, tick: u64) -> f32 {
        let peak = load_f32(&self.load_amps) * SQRT_2 / self.true_scale;
        let phase = (tick % 1_000) as f32 * PHASE_STEP;
        let mut volts = load_f32(&self.bias_voltage) + peak * phase.sin();

        let noise = load_f32(&self.noise_volts);
        if noise > 0.0 {
            volts += rand::thread_rng().gen_range(-noise..=noise);
        }
        volts
    }
}

impl SampleSource for SimulatedSensor {
    fn read_one(&self) -> Result<RawTick, SensorError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(SensorError::Disconnected);
        }

        let tick = self.tick.fetch_add(1, Ordering::SeqCst);

        let failure_rate = load_f32(&self.failure_rate);
        if failure_rate > 0.0 && rand::thread_rng().gen_bool(failure_rate as f64) {
            return Err(SensorError::ReadFailed);
        }

        let volts = self.voltage_at(tick);
        let full_scale = self.sensor.adc_resolution as f32;
        let raw = (volts / self.sensor.reference_voltage * full_scale)
            .round()
            .clamp(0.0, full_scale);
        Ok(raw as RawTick)
    }
}

/// In-memory relay.
#[derive(Default)]
pub struct SimulatedRelay {
    on: AtomicBool,
}

impl SimulatedRelay {
    pub fn new(initial: bool) -> Self {
        Self {
            on: AtomicBool::new(initial),
        }
    }
}

impl Relay for SimulatedRelay {
    fn set(&self, on: bool) {
        self.on.store(on, Ordering::SeqCst);
    }

    fn get(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::SeqCst))
}

fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::SeqCst);
}
