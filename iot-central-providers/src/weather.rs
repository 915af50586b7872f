// IoT Central Providers - Source adapters and telemetry sink
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! OpenWeather One Call source
//!
//! Emits `weather.temp`, `weather.humidity` and `weather.pressure` for the
//! configured coordinates.

use crate::config::WeatherConfig;
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use iot_central::{Batch, Metric, Source, SourceError};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Sections of the One Call response we never read
const EXCLUDE: &str = "minutely,hourly,daily,alerts";

#[derive(Debug, Deserialize)]
struct OneCall {
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

/// Turn a One Call response body into metrics
///
/// Temperature is kept even at zero; humidity and pressure of zero mean the
/// station had no data and are skipped.
pub fn parse_current(body: &str) -> Result<Vec<Metric>> {
    let call: OneCall = serde_json::from_str(body)?;
    let mut batch = Batch::new();
    batch.reading("weather.temp", call.current.temp);
    batch.nonzero("weather.humidity", call.current.humidity);
    batch.nonzero("weather.pressure", call.current.pressure);
    Ok(batch.into_metrics())
}

/// Current conditions from OpenWeather
pub struct WeatherSource {
    config: WeatherConfig,
    client: Client,
}

impl WeatherSource {
    /// Build the HTTP client; fails only if TLS cannot be initialised
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// The configuration this source was built with
    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("lat", self.config.latitude.to_string()),
                ("lon", self.config.longitude.to_string()),
                ("units", self.config.units.clone()),
                ("exclude", EXCLUDE.to_string()),
                ("appid", self.config.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

impl std::fmt::Debug for WeatherSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Source for WeatherSource {
    fn name(&self) -> &str {
        "weather"
    }

    async fn init(&mut self) -> std::result::Result<(), SourceError> {
        self.config
            .validate()
            .map_err(|e| SourceError::Setup(e.to_string()))
    }

    async fn poll(&mut self) -> std::result::Result<Vec<Metric>, SourceError> {
        let body = self.fetch().await?;
        let metrics = parse_current(&body)?;
        debug!(source = "weather", count = metrics.len(), "Parsed current conditions");
        Ok(metrics)
    }
}
