// IoT Central Providers - Source adapters and telemetry sink
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the providers
//!
//! Provider failures are mapped into the core [`SourceError`] or
//! [`SinkError`] before they reach the pipeline.

use iot_central::{SinkError, SourceError};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP client error (connect, timeout, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// The response body is not what the provider documents
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Local I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A sysfs channel holds something that is not a number
    #[error("Unparseable reading in {path}: {value:?}")]
    Reading { path: PathBuf, value: String },
}

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<ProviderError> for SourceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Http(e) if e.is_timeout() => SourceError::Transport(format!("timeout: {e}")),
            ProviderError::Http(e) => SourceError::Transport(e.to_string()),
            ProviderError::Io(e) => SourceError::Io(e),
            other @ (ProviderError::Status(_)
            | ProviderError::Payload(_)
            | ProviderError::Reading { .. }) => SourceError::InvalidResponse(other.to_string()),
        }
    }
}

/// Map a provider error raised while publishing to `feed`
pub(crate) fn sink_error(feed: &str, err: ProviderError) -> SinkError {
    match err {
        ProviderError::Status(status) => SinkError::Rejected {
            feed: feed.to_string(),
            status,
        },
        other => SinkError::Transport(other.to_string()),
    }
}
