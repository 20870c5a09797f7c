//! Periodic telemetry broadcaster.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::context::AppContext;
use crate::error::{log_calibration_error, CalibrationError};
use crate::protocol::response::{format_auto_cal_summary, format_calibration_status};
use crate::shutdown::ShutdownSignal;
use crate::telemetry::TelemetryPacket;

/// Assemble one telemetry packet from the latest measurement
///
/// The auto-calibration field stays empty while auto-calibration is off.
pub async fn build_packet(
    ctx: &AppContext,
    sequence: u64,
) -> Result<TelemetryPacket, CalibrationError> {
    let status = ctx.calibration_status().await?;
    let auto_cal = if status.auto_calibration {
        format_auto_cal_summary(&ctx.auto_cal_summary()?)
    } else {
        String::new()
    };
    let stats = ctx.measurement_stats()?;

    Ok(TelemetryPacket {
        sequence,
        timestamp_ms: ctx.now_ms(),
        current_amps: stats.last_current,
        voltage_rms: stats.last_voltage_rms,
        mains_voltage: ctx.config().measurement.mains_voltage,
        cal_status: format_calibration_status(&status),
        auto_cal,
    })
}

/// Send a packet every `telemetry_interval_ms` until cancelled
pub async fn broadcast_telemetry(
    ctx: Arc<AppContext>,
    socket: UdpSocket,
    target: SocketAddr,
    signal: ShutdownSignal,
) {
    let interval = Duration::from_millis(ctx.config().measurement.telemetry_interval_ms);
    tracing::info!(%target, ?interval, "[Telemetry] Broadcaster started");
    ctx.set_telemetry_running(true);

    let mut sequence: u64 = 0;
    while !signal.is_triggered() {
        match build_packet(&ctx, sequence).await {
            Ok(packet) => {
                let line = packet.encode();
                match socket.send_to(line.as_bytes(), target).await {
                    Ok(_) => {
                        tracing::debug!(sequence, current = packet.current_amps, "[Telemetry] Sent");
                        sequence += 1;
                    }
                    Err(e) => tracing::warn!(error = %e, "[Telemetry] Send failed"),
                }
            }
            Err(e) => log_calibration_error(&e, "build_telemetry_packet"),
        }

        if !signal.sleep(interval).await {
            break;
        }
    }

    ctx.set_telemetry_running(false);
    tracing::info!(sent = sequence, "[Telemetry] Broadcaster stopped");
}
