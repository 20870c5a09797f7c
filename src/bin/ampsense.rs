use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use ampsense::calibration::DeviceCatalog;
use ampsense::clock::SystemTimeSource;
use ampsense::hardware::{SimulatedRelay, SimulatedSensor};
use ampsense::net::Service;
use ampsense::{init_logging, protocol, AppConfig, AppContext};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;

#[derive(Parser, Debug)]
#[command(
    name = "ampsense",
    about = "Self-calibrating CT current sensor running against a simulated clamp"
)]
struct Cli {
    /// JSON configuration file (defaults to config/ampsense.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sampler, UDP command server and telemetry broadcaster
    Run {
        /// Load current seen by the simulated clamp, in amps
        #[arg(long, default_value_t = 0.0)]
        load_amps: f32,
        /// Scale the simulated clamp actually has, in A/V
        #[arg(long)]
        true_scale: Option<f32>,
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Start with auto-calibration disabled
        #[arg(long)]
        no_auto_cal: bool,
    },
    /// Execute commands against a fresh simulated device and print the responses
    Exec {
        /// Load current seen by the simulated clamp, in amps
        #[arg(long, default_value_t = 0.0)]
        load_amps: f32,
        /// Commands, e.g. ZERO_CAL "SCALE_CAL:5" CAL_STATUS
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Print the built-in device catalog
    Devices {
        /// Emit JSON instead of the protocol listing
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Run {
            load_amps,
            true_scale,
            duration_secs,
            no_auto_cal,
        } => run_device(config, load_amps, true_scale, duration_secs, no_auto_cal).await,
        Commands::Exec {
            load_amps,
            commands,
        } => run_exec(config, load_amps, &commands).await,
        Commands::Devices { json } => run_devices(json),
    }
}

fn simulated_context(
    config: AppConfig,
    load_amps: f32,
    true_scale: Option<f32>,
) -> (Arc<AppContext>, Arc<SimulatedSensor>) {
    let mut sensor = SimulatedSensor::new(config.sensor.clone());
    if let Some(scale) = true_scale {
        sensor = sensor.with_true_scale(scale);
    }
    let sensor = Arc::new(sensor);
    sensor.set_load_amps(load_amps);

    let ctx = Arc::new(AppContext::new(
        config,
        sensor.clone(),
        Arc::new(SimulatedRelay::default()),
        Arc::new(SystemTimeSource::new()),
    ));
    (ctx, sensor)
}

async fn run_device(
    mut config: AppConfig,
    load_amps: f32,
    true_scale: Option<f32>,
    duration_secs: Option<u64>,
    no_auto_cal: bool,
) -> Result<ExitCode> {
    if no_auto_cal {
        config.auto_cal.enabled = false;
    }

    // Startup zero calibration needs a quiet clamp
    let (ctx, sensor) = simulated_context(config, 0.0, true_scale);
    ctx.startup().await.context("startup calibration")?;
    sensor.set_load_amps(load_amps);

    let mut events = ctx.telemetry().stream();
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(target: "ampsense::events", "{json}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
        }
    });

    let service = Service::start(Arc::clone(&ctx))
        .await
        .context("starting network service")?;
    println!("Listening for commands on {}", service.command_addr());

    match duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c()
            .await
            .context("waiting for Ctrl-C")?,
    }

    service.shutdown().await;
    ctx.shutdown().await;
    event_log.abort();
    Ok(ExitCode::from(0))
}

async fn run_exec(config: AppConfig, load_amps: f32, commands: &[String]) -> Result<ExitCode> {
    let mut config = config;
    config.auto_cal.enabled = false;
    let (ctx, _sensor) = simulated_context(config, load_amps, None);

    let mut failed = false;
    for raw in commands {
        let response = protocol::execute(&ctx, raw).await;
        failed |= response.is_error();
        println!("{response}");
    }

    ctx.shutdown().await;
    Ok(ExitCode::from(if failed { 2 } else { 0 }))
}

fn run_devices(json: bool) -> Result<ExitCode> {
    let catalog = DeviceCatalog::stock();
    if json {
        let text = serde_json::to_string_pretty(catalog.profiles())?;
        println!("{text}");
    } else {
        print!("{}", catalog.listing());
    }
    Ok(ExitCode::from(0))
}
