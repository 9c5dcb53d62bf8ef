//! CLI Entry Point for gaze-bridge
//!
//! Provides a command-line front-end for:
//! - Listing reachable devices
//! - Recording until Ctrl-C
//! - Writing the effective configuration to a file
//!
//! The binary drives the simulated driver. Hardware drivers implement the
//! `bridge-core` traits and plug into the same `Recorder`.
//!
//! # Usage
//!
//! ```bash
//! gaze-bridge devices
//! gaze-bridge record --name Lab1
//! gaze-bridge --config lab.toml config save lab.toml
//! ```

use anyhow::{Context, Result};
use bridge_driver_mock::{Scenario, SimulatedDriver};
use clap::{Parser, Subcommand};
use gaze_bridge::config::BridgeConfig;
use gaze_bridge::logging::{self, LoggingConfig};
use gaze_bridge::publisher::StreamPublisher;
use gaze_bridge::{Recorder, RecordingOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Endpoint of the built-in simulated tracker.
const SIM_ENDPOINT: &str = "tobii-ttp://simulated-tracker";

#[derive(Parser)]
#[command(name = "gaze-bridge")]
#[command(
    about = "Streams eye-tracker events to real-time outbound data streams",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to gaze_bridge.toml in the usual places)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sampling rate of the simulated tracker in Hz
    #[arg(long, global = true, default_value_t = 120.0)]
    sim_rate: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List reachable devices
    Devices,

    /// Record until Ctrl-C
    Record {
        /// Stream base name (overrides [stream] name)
        #[arg(long)]
        name: Option<String>,

        /// Device endpoint (overrides [device] endpoint)
        #[arg(long)]
        device: Option<String>,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the effective configuration to a file
    Save { path: PathBuf },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BridgeConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let logging_config =
        LoggingConfig::from_bridge_config(&config).map_err(anyhow::Error::msg)?;
    logging::init(logging_config).map_err(anyhow::Error::msg)?;

    let driver = Arc::new(SimulatedDriver::new(Scenario::free_running(
        SIM_ENDPOINT,
        cli.sim_rate,
    )));

    match cli.command {
        Commands::Devices => list_devices(driver, &config),
        Commands::Record { name, device } => record(driver, config, name, device).await,
        Commands::Config { action } => match action {
            ConfigAction::Save { path } => {
                config.save(&path)?;
                println!("Configuration written to {}", path.display());
                Ok(())
            }
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        },
    }
}

fn publisher() -> Arc<dyn StreamPublisher> {
    #[cfg(feature = "lsl")]
    {
        Arc::new(gaze_bridge::publisher::LslPublisher::new())
    }
    #[cfg(not(feature = "lsl"))]
    {
        Arc::new(gaze_bridge::publisher::LocalStreamHub::new())
    }
}

fn list_devices(driver: Arc<SimulatedDriver>, config: &BridgeConfig) -> Result<()> {
    let mut recorder = Recorder::new(driver, publisher(), config.run_settings());
    let mut status = recorder
        .status_receiver()
        .context("status receiver already taken")?;

    let devices = recorder.refresh_devices();
    while let Ok(message) = status.try_recv() {
        eprintln!("{}", message.text);
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

async fn record(
    driver: Arc<SimulatedDriver>,
    config: BridgeConfig,
    name: Option<String>,
    device: Option<String>,
) -> Result<()> {
    let name = name.unwrap_or_else(|| config.stream.name.clone());
    let endpoint = device.unwrap_or_else(|| config.device.endpoint.clone());

    let mut recorder = Recorder::new(driver, publisher(), config.run_settings());
    let mut status = recorder
        .status_receiver()
        .context("status receiver already taken")?;
    let printer = tokio::spawn(async move {
        while let Some(message) = status.recv().await {
            println!("[{}] {}", message.at.format("%H:%M:%S"), message.text);
        }
    });

    recorder.start(&name, endpoint.as_str())?;
    println!("Recording '{}' (Ctrl-C to stop)", name);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("waiting for Ctrl-C")?;
                break;
            }
            _ = ticker.tick() => {
                if recorder.has_finished() {
                    break;
                }
            }
        }
    }

    // Joining the worker blocks for up to one wait timeout.
    let (outcome, recorder) = tokio::task::spawn_blocking(move || {
        let outcome = recorder.stop();
        (outcome, recorder)
    })
    .await?;
    drop(recorder);
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Status printer task failed");
    }

    match outcome.filter(RecordingOutcome::is_failure) {
        Some(RecordingOutcome::FailedToStart(reason)) => {
            anyhow::bail!("recording failed to start: {}", reason)
        }
        Some(RecordingOutcome::FailedWhileRunning(reason)) => {
            anyhow::bail!("recording failed: {}", reason)
        }
        _ => Ok(()),
    }
}
