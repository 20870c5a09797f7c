// CalibrationStore - bias/scale parameters under a bounded-wait lock
//
// Every get/set acquires the lock for a single field access and never holds
// it across sampling. When the lock cannot be taken within the configured
// wait, the caller gets `CalibrationError::LockContention` and the stored
// value is left untouched.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use crate::error::CalibrationError;

/// Current zero-point and gain of the sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// DC offset subtracted from every sample, in volts
    pub bias_voltage: f32,
    /// Amps per volt of RMS AC signal
    pub scale_factor: f32,
}

/// Calibration Parameter Store
pub struct CalibrationStore {
    params: Mutex<CalibrationParameters>,
    defaults: CalibrationParameters,
    /// Upper bound for a physically meaningful bias
    max_bias: f32,
    lock_timeout: Duration,
}

impl CalibrationStore {
    /// Create a store initialized with manufacturer defaults
    ///
    /// # Arguments
    /// * `defaults` - Parameters restored by `reset`
    /// * `max_bias` - ADC reference voltage; bias must stay in `[0, max_bias]`
    /// * `lock_timeout` - Bounded wait for every access
    pub fn new(defaults: CalibrationParameters, max_bias: f32, lock_timeout: Duration) -> Self {
        Self {
            params: Mutex::new(defaults),
            defaults,
            max_bias,
            lock_timeout,
        }
    }

    async fn lock(
        &self,
        resource: &'static str,
    ) -> Result<MutexGuard<'_, CalibrationParameters>, CalibrationError> {
        timeout(self.lock_timeout, self.params.lock())
            .await
            .map_err(|_| CalibrationError::LockContention { resource })
    }

    pub async fn get_bias(&self) -> Result<f32, CalibrationError> {
        Ok(self.lock("bias").await?.bias_voltage)
    }

    pub async fn get_scale(&self) -> Result<f32, CalibrationError> {
        Ok(self.lock("scale").await?.scale_factor)
    }

    /// Both parameters read under a single acquisition
    pub async fn snapshot(&self) -> Result<CalibrationParameters, CalibrationError> {
        Ok(*self.lock("parameters").await?)
    }

    pub async fn set_bias(&self, bias_voltage: f32) -> Result<(), CalibrationError> {
        self.validate_bias(bias_voltage)?;
        let mut params = self.lock("bias").await?;
        params.bias_voltage = bias_voltage;
        log::info!("[Store] Bias voltage set to {:.4} V", bias_voltage);
        Ok(())
    }

    pub async fn set_scale(&self, scale_factor: f32) -> Result<(), CalibrationError> {
        Self::validate_scale(scale_factor)?;
        let mut params = self.lock("scale").await?;
        params.scale_factor = scale_factor;
        log::info!("[Store] Scale factor set to {:.2} A/V", scale_factor);
        Ok(())
    }

    /// Replace both parameters atomically; nothing is written if either is invalid
    pub async fn set_parameters(
        &self,
        new_params: CalibrationParameters,
    ) -> Result<(), CalibrationError> {
        self.validate_bias(new_params.bias_voltage)?;
        Self::validate_scale(new_params.scale_factor)?;
        let mut params = self.lock("parameters").await?;
        *params = new_params;
        log::info!(
            "[Store] Parameters set: bias={:.4} V, scale={:.2} A/V",
            new_params.bias_voltage,
            new_params.scale_factor
        );
        Ok(())
    }

    /// Restore manufacturer defaults
    pub async fn reset(&self) -> Result<CalibrationParameters, CalibrationError> {
        self.set_parameters(self.defaults).await?;
        Ok(self.defaults)
    }

    pub fn defaults(&self) -> CalibrationParameters {
        self.defaults
    }

    fn validate_bias(&self, bias_voltage: f32) -> Result<(), CalibrationError> {
        if !bias_voltage.is_finite() || !(0.0..=self.max_bias).contains(&bias_voltage) {
            return Err(CalibrationError::InvalidParameter {
                name: "bias_voltage",
                value: bias_voltage,
            });
        }
        Ok(())
    }

    fn validate_scale(scale_factor: f32) -> Result<(), CalibrationError> {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(CalibrationError::InvalidParameter {
                name: "scale_factor",
                value: scale_factor,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn hold_lock_for_test(&self) -> MutexGuard<'_, CalibrationParameters> {
        self.params.lock().await
    }
}
