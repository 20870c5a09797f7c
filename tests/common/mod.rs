#![allow(dead_code)]

use std::sync::Arc;

use ampsense::clock::ManualTimeSource;
use ampsense::hardware::{SimulatedRelay, SimulatedSensor};
use ampsense::{AppConfig, AppContext};

pub const START_MS: u64 = 1_000;
pub const MINUTE_MS: u64 = 60_000;

/// Context wired to a noiseless simulated clamp and a manual clock
pub struct Rig {
    pub ctx: Arc<AppContext>,
    pub sensor: Arc<SimulatedSensor>,
    pub relay: Arc<SimulatedRelay>,
    pub clock: Arc<ManualTimeSource>,
}

pub fn rig() -> Rig {
    rig_with(AppConfig::without_delays(), None)
}

pub fn rig_with(config: AppConfig, true_scale: Option<f32>) -> Rig {
    let mut sensor = SimulatedSensor::new(config.sensor.clone());
    if let Some(scale) = true_scale {
        sensor = sensor.with_true_scale(scale);
    }
    let sensor = Arc::new(sensor);
    let relay = Arc::new(SimulatedRelay::default());
    let clock = Arc::new(ManualTimeSource::new(START_MS));
    let ctx = Arc::new(AppContext::new(
        config,
        sensor.clone(),
        relay.clone(),
        clock.clone(),
    ));
    Rig {
        ctx,
        sensor,
        relay,
        clock,
    }
}

pub fn without_auto_cal() -> AppConfig {
    let mut config = AppConfig::without_delays();
    config.auto_cal.enabled = false;
    config
}

pub fn relative_error(actual: f32, expected: f32) -> f32 {
    ((actual - expected) / expected).abs()
}

impl Rig {
    /// Run `n` measurement batches
    pub async fn measure(&self, n: usize) -> f32 {
        let mut last = 0.0;
        for _ in 0..n {
            last = self
                .ctx
                .measure_current()
                .await
                .expect("measurement failed")
                .current_amps;
        }
        last
    }
}
