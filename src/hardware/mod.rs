//! Collaborator interfaces for the transducer and the relay.
//!
//! The calibration core only needs a way to pull one raw ADC tick and a way
//! to flip the load relay; everything else about the hardware stays behind
//! these traits.

use crate::error::SensorError;

mod simulated;

pub use simulated::{SimulatedRelay, SimulatedSensor};

/// One raw ADC reading in `0..=adc_resolution`.
pub type RawTick = u16;

/// Trait implemented by raw transducer drivers.
///
/// A failed read is reported per tick; callers skip it and keep sampling.
pub trait SampleSource: Send + Sync {
    fn read_one(&self) -> Result<RawTick, SensorError>;
}

/// Trait implemented by the load relay driver.
pub trait Relay: Send + Sync {
    fn set(&self, on: bool);
    fn get(&self) -> bool;
}
