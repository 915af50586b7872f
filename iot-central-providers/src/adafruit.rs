// IoT Central Providers - Source adapters and telemetry sink
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Adafruit IO REST sink

use crate::config::AdafruitConfig;
use crate::error::{sink_error, ProviderError, Result};
use async_trait::async_trait;
use iot_central::{Sink, SinkError};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

const KEY_HEADER: &str = "X-AIO-Key";

#[derive(Debug, Serialize)]
struct DataPoint<'a> {
    value: &'a str,
}

/// Publishes every metric as a data point on the feed of the same name
pub struct AdafruitSink {
    config: AdafruitConfig,
    client: Client,
}

impl AdafruitSink {
    /// Build the HTTP client; fails only if TLS cannot be initialised
    pub fn new(config: AdafruitConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// `POST` target for a feed
    pub fn feed_url(&self, feed: &str) -> String {
        format!(
            "{}/{}/feeds/{}/data",
            self.config.base_url.trim_end_matches('/'),
            self.config.username,
            feed
        )
    }

    async fn post(&self, feed: &str, value: &str) -> Result<()> {
        let response = self
            .client
            .post(self.feed_url(feed))
            .header(KEY_HEADER, &self.config.key)
            .json(&DataPoint { value })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AdafruitSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdafruitSink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for AdafruitSink {
    async fn publish(&mut self, name: &str, value: &str) -> std::result::Result<(), SinkError> {
        if name.is_empty() || name.contains('/') {
            return Err(SinkError::InvalidFeed(name.to_string()));
        }
        self.post(name, value)
            .await
            .map_err(|e| sink_error(name, e))?;
        debug!(feed = %name, value = %value, "Published to Adafruit IO");
        Ok(())
    }
}
