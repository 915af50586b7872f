// IoT Central Daemon - Collection daemon and self-metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # IoT Central
//!
//! Collects environmental sensor readings, weather and financial quotes and
//! publishes them to Adafruit IO.
//!
//! ## Usage
//!
//! ```bash
//! # Run the collector (credentials from the environment)
//! IO_USERNAME=maker IO_KEY=... SENSOR_DEVICE=/sys/bus/iio/devices/iio:device0 iot-central
//!
//! # Log instead of publishing, expose self-metrics
//! iot-central run --dry-run --listen 127.0.0.1:9464
//!
//! # Poll a single source once
//! iot-central weather
//! ```

mod cli;
mod daemon;
mod error;
mod metrics;
mod oneshot;
mod server;

use clap::Parser;
use cli::{Args, Command};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::default().add_directive(level.into())
    });

    // stdout is reserved for the one-shot commands' output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("IoT Central v{}", env!("CARGO_PKG_VERSION"));

    let result = match args.command() {
        Command::Run => daemon::run(&args).await,
        command => oneshot::run(&args, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}
