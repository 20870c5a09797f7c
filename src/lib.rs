// Ampsense Core - CT current sensing and self-calibration
// RMS measurement, stable-load detection, device recognition and learned scale

// Module declarations
pub mod calibration;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod hardware;
pub mod measurement;
pub mod net;
pub mod protocol;
pub mod shutdown;
pub mod telemetry;

// Re-exports for convenience
pub use config::AppConfig;
pub use context::AppContext;
pub use shutdown::ShutdownSignal;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, honouring `RUST_LOG` (default `info`)
///
/// `log` records from the library are bridged into the subscriber. Calling
/// this more than once is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
