//! Error types for IoT Central
//!
//! This module defines all error types used throughout the pipeline.
//! None of them ever stops the pipeline: poll and publish failures are
//! logged and counted by the fetchers and the dispatcher.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for IoT Central operations
pub type Result<T> = std::result::Result<T, CentralError>;

/// Main error type for IoT Central operations
#[derive(Error, Debug)]
pub enum CentralError {
    /// Source adapter error
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Telemetry sink error
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by a source adapter
#[derive(Error, Debug)]
pub enum SourceError {
    /// The underlying device or bus could not be opened
    #[error("Setup failed: {0}")]
    Setup(String),

    /// Transport-level failure (HTTP, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered with something we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The poll did not complete within the configured timeout
    #[error("Poll timed out after {0:?}")]
    Timeout(Duration),

    /// Local I/O error (sysfs reads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a telemetry sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink answered but refused the value
    #[error("Rejected by sink: status {status} for feed {feed}")]
    Rejected { feed: String, status: u16 },

    /// Network or client failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The feed name cannot be published
    #[error("Invalid feed name: {0:?}")]
    InvalidFeed(String),
}

/// Errors in pipeline configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A fetcher interval of zero would spin
    #[error("Interval must be greater than zero for source {0}")]
    ZeroInterval(String),

    /// The metric channel needs room for at least one item
    #[error("Channel capacity must be at least 1")]
    ZeroCapacity,

    /// A required value is absent
    #[error("Missing configuration value: {0}")]
    Missing(String),

    /// A value is present but cannot be used
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
