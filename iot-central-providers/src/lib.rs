// IoT Central Providers - Source adapters and telemetry sink
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # IoT Central Providers
//!
//! Concrete data sources and the outbound sink for the IoT Central
//! pipeline.
//!
//! ## Overview
//!
//! | Type               | Role   | Upstream                         | Default interval |
//! |--------------------|--------|----------------------------------|------------------|
//! | [`WeatherSource`]  | Source | OpenWeather One Call             | 10 min           |
//! | [`FinanceSource`]  | Source | Finnhub quotes                   | 10 min           |
//! | [`EnvSensorSource`]| Source | BME280, SGP30, TSL2591 via IIO   | 1 min            |
//! | [`AdafruitSink`]   | Sink   | Adafruit IO REST API             |                  |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iot_central::{FetcherConfig, Orchestrator};
//! use iot_central_providers::{
//!     AdafruitConfig, AdafruitSink, WeatherConfig, WeatherSource, DEFAULT_HTTP_INTERVAL,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let weather = WeatherSource::new(WeatherConfig::new("api-key", 40.7128, -74.006))?;
//! let sink = AdafruitSink::new(AdafruitConfig::new("maker", "aio-key"))?;
//!
//! let mut orchestrator = Orchestrator::new();
//! orchestrator.add_source(weather, FetcherConfig::every(DEFAULT_HTTP_INTERVAL))?;
//!
//! let signal = orchestrator.shutdown_signal();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     signal.trigger();
//! });
//!
//! let report = orchestrator.run(sink).await?;
//! println!("published {} metrics", report.dispatcher.published);
//! # Ok(())
//! # }
//! ```

pub mod adafruit;
pub mod config;
pub mod error;
pub mod finance;
pub mod sensor;
pub mod weather;

pub use adafruit::AdafruitSink;
pub use config::{
    AdafruitConfig, FinanceConfig, SensorConfig, WeatherConfig, DEFAULT_FEED_PREFIX,
    DEFAULT_HTTP_INTERVAL, DEFAULT_HTTP_TIMEOUT, DEFAULT_INDOOR_PREFIX, DEFAULT_SAMPLE_PERIOD,
    DEFAULT_SENSOR_INTERVAL, DEFAULT_SYMBOLS,
};
pub use error::{ProviderError, Result};
pub use finance::FinanceSource;
pub use sensor::{AirReading, EnvReading, EnvSensorSource, Sample};
pub use weather::WeatherSource;
