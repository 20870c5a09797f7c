// Command dispatcher: parsed command -> context operation -> response line

use std::sync::Arc;

use crate::context::AppContext;
use crate::error::{CommandError, ErrorCode};
use crate::protocol::command::{self, Command, COMMAND_TABLE};
use crate::protocol::response::{
    format_auto_cal_summary, format_buffer_analysis, format_calibration_status,
    format_instant_reading, format_learning_summary, format_measurement_stats, on_off, yes_no,
    Response,
};

/// Parse and execute one raw command, always producing a response line
pub async fn execute(ctx: &Arc<AppContext>, raw: &str) -> Response {
    let command = match command::parse(raw) {
        Ok(command) => command,
        Err(err) => {
            log::warn!(
                "[Protocol] Rejected command {:?}: code={}, {}",
                raw.trim(),
                err.code(),
                err.message()
            );
            return Response::error(command::error_tag(raw), &err);
        }
    };

    let tag = command.response_tag();
    match dispatch(ctx, command).await {
        Ok(response) => response,
        Err(err) => {
            log::warn!(
                "[Protocol] {} failed: code={}, {}",
                tag,
                err.code(),
                err.message()
            );
            Response::error(tag, &err)
        }
    }
}

/// Execute a parsed command against the context
///
/// # Errors
/// Calibration failures surface as `CommandError` with the status token the
/// response carries (`INVALID_RANGE`, `INSUFFICIENT_SAMPLES`, `BUSY`, ...).
pub async fn dispatch(ctx: &Arc<AppContext>, command: Command) -> Result<Response, CommandError> {
    let tag = command.response_tag();
    let response = match command {
        // === CALIBRATION ===
        Command::ZeroCal | Command::RecalibrateBias => {
            let bias = ctx.zero_calibrate(false).await?;
            Response::success_with(tag, format_args!("BIAS={:.4}", bias))
        }
        Command::ScaleCal(amps) | Command::Calibrate(amps) | Command::CalKnown(amps) => {
            let scale = ctx.calibrate_with_known_load(amps, false).await?;
            Response::success_with(tag, format_args!("SCALE={:.2}", scale))
        }
        Command::ManualCal { bias, scale } => {
            let params = ctx.manual_calibrate(bias, scale).await?;
            Response::success_with(
                tag,
                format_args!(
                    "BIAS={:.4},SCALE={:.2}",
                    params.bias_voltage, params.scale_factor
                ),
            )
        }
        Command::ResetCal => {
            let params = ctx.reset_calibration().await?;
            Response::success_with(
                tag,
                format_args!(
                    "BIAS={:.4},SCALE={:.2}",
                    params.bias_voltage, params.scale_factor
                ),
            )
        }
        Command::CalStatus => {
            let status = ctx.calibration_status().await?;
            Response::new(tag, format_calibration_status(&status))
        }
        Command::SetBias(value) => {
            let bias = ctx.set_bias(value).await?;
            Response::success_with(tag, format_args!("VALUE={:.4}", bias))
        }
        Command::SetScale(value) => {
            let scale = ctx.set_scale(value).await?;
            Response::success_with(tag, format_args!("VALUE={:.2}", scale))
        }
        Command::SctInfo => {
            let params = ctx.store().snapshot().await?;
            let sensor = &ctx.config().sensor;
            log::info!(
                "[Protocol] CT ratio {:.0}:1, burden {:.1} ohm, max secondary {:.0} mA",
                sensor.transformation_ratio,
                sensor.burden_resistor_ohms,
                sensor.max_secondary_current * 1000.0
            );
            Response::new(
                tag,
                format!(
                    "THEORETICAL={:.1}A/V,CURRENT_SCALE={:.2}A/V,BIAS={:.4}V,BURDEN={:.1}OHM,RATIO={:.0}:1",
                    sensor.theoretical_scale(),
                    params.scale_factor,
                    params.bias_voltage,
                    sensor.burden_resistor_ohms,
                    sensor.transformation_ratio
                ),
            )
        }

        // === AUTO-CALIBRATION ===
        Command::AutoCalOn => {
            ctx.set_auto_calibration(true)?;
            Response::success(tag)
        }
        Command::AutoCalOff => {
            ctx.set_auto_calibration(false)?;
            Response::success(tag)
        }
        Command::AutoCalStatus => {
            let summary = ctx.auto_cal_summary()?;
            Response::new(tag, format_auto_cal_summary(&summary))
        }
        Command::AutoCalSensitivity(value) => {
            let sensitivity = ctx.set_sensitivity(value)?;
            Response::success_with(tag, format_args!("VALUE={:.2}", sensitivity))
        }
        Command::AutoCalLearningRate(value) => {
            let rate = ctx.set_learning_rate(value)?;
            Response::success_with(tag, format_args!("VALUE={:.2}", rate))
        }

        // === DEVICE RECOGNITION ===
        Command::ListDevices => Response::new(tag, ctx.device_listing()?),
        Command::RecognizeCurrent(amps) => match ctx.recognize(amps)? {
            Some(profile) => Response::new(
                tag,
                format!(
                    "NAME={},TYPICAL={:.2}A,RANGE={:.2}-{:.2}A",
                    profile.name, profile.typical_current, profile.min_current, profile.max_current
                ),
            ),
            None => Response::new(tag, "NONE"),
        },
        Command::AutoRecognize => {
            let (current, _) = ctx.auto_recognize().await?;
            Response::new(tag, format!("PROCESSED,CURRENT={:.3}A", current))
        }
        Command::AddDevice {
            min,
            max,
            typical,
            name,
        } => {
            ctx.add_custom_profile(min, max, typical, &name)?;
            Response::success_with(tag, format_args!("NAME={}", name))
        }

        // === LEARNING ===
        Command::LearningStats => {
            let summary = ctx.learning_summary()?;
            Response::new(tag, format_learning_summary(&summary))
        }
        Command::ResetLearning => {
            ctx.reset_learning()?;
            Response::success(tag)
        }
        Command::ApplyLearning => {
            ctx.apply_learned_calibration().await?;
            Response::success(tag)
        }

        // === DETECTION & DIAGNOSTICS ===
        Command::AutoDetect => {
            let current = ctx.detect_load().await?;
            Response::success_with(tag, format_args!("CURRENT={:.3}A", current))
        }
        Command::AutoDetectOn => {
            ctx.set_auto_detection(true);
            Response::success(tag)
        }
        Command::AutoDetectOff => {
            ctx.set_auto_detection(false);
            Response::success(tag)
        }
        Command::GetCurrent => {
            let reading = ctx.instant_reading().await?;
            Response::new(tag, format_instant_reading(&reading))
        }
        Command::MeasurementStats => {
            let stats = ctx.measurement_stats()?;
            Response::new(tag, format_measurement_stats(&stats))
        }
        Command::ResetStats => {
            ctx.reset_statistics()?;
            Response::success(tag)
        }
        Command::BufferAnalysis => {
            let analysis = ctx.buffer_analysis()?;
            Response::new(tag, format_buffer_analysis(analysis.as_ref()))
        }

        // === RELAY & SYSTEM ===
        Command::RelayOn => {
            ctx.set_relay(true);
            Response::success(tag)
        }
        Command::RelayOff => {
            ctx.set_relay(false);
            Response::success(tag)
        }
        Command::RelayToggle => {
            let on = ctx.toggle_relay();
            Response::success_with(tag, format_args!("STATE={}", on_off(on)))
        }
        Command::SystemStatus => {
            let summary = ctx.auto_cal_summary()?;
            Response::new(
                tag,
                format!(
                    "UPTIME={}s,AUTO_CAL={},AUTO_DET={},CAL_COUNT={},UDP_RUNNING={}",
                    summary.uptime_ms / 1000,
                    on_off(summary.enabled),
                    on_off(ctx.auto_detection_enabled()),
                    summary.statistics.auto_cal_count,
                    yes_no(ctx.telemetry_running())
                ),
            )
        }
        Command::Ping => {
            let mode = if ctx.auto_calibration_enabled() {
                "AUTO_CAL_ENABLED"
            } else {
                "AUTO_CAL_DISABLED"
            };
            Response::new(tag, format!("ESP32_READY,{}", mode))
        }
        Command::GetConfig => Response::new(
            tag,
            format!(
                "AUTO_CAL={},AUTO_DET={},LEARNING=ON,DEVICE_RECOG=ON,SENSITIVITY={:.2}",
                on_off(ctx.auto_calibration_enabled()),
                on_off(ctx.auto_detection_enabled()),
                ctx.sensitivity()?
            ),
        ),
        Command::Help => Response::new(tag, help_text()),
    };
    Ok(response)
}

/// `Commands available - ...` built from the command table
pub fn help_text() -> String {
    let usages: Vec<&str> = COMMAND_TABLE.iter().map(|entry| entry.usage).collect();
    format!("Commands available - {}", usages.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_lists_every_table_entry() {
        let help = help_text();
        assert!(help.starts_with("Commands available - ZERO_CAL"));
        for entry in COMMAND_TABLE.iter() {
            assert!(help.contains(entry.usage), "missing {}", entry.usage);
        }
    }
}
