// IoT Central Daemon - Collection daemon and self-metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Startup and runtime errors of the daemon

use iot_central::{CentralError, ConfigError, SourceError};
use iot_central_providers::ProviderError;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] CentralError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Poll failed: {0}")]
    Poll(#[from] SourceError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("No source configured (set OPEN_WEATHER_*, FINNHUB_API_KEY or SENSOR_DEVICE)")]
    NoSources,
}
