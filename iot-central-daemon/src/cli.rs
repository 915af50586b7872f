// IoT Central Daemon - Collection daemon and self-metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Command line and environment configuration
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it. A source is enabled only when all of its required
//! values are present.

use clap::{Args as ClapArgs, Parser, Subcommand};
use iot_central::{ConfigError, FetcherConfig, OrchestratorConfig, DEFAULT_CHANNEL_CAPACITY};
use iot_central_providers::config::ADAFRUIT_BASE_URL;
use iot_central_providers::{
    AdafruitConfig, FinanceConfig, SensorConfig, WeatherConfig, DEFAULT_FEED_PREFIX,
    DEFAULT_INDOOR_PREFIX,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// IoT Central telemetry collector
#[derive(Parser, Debug)]
#[command(name = "iot-central", author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub sink: SinkArgs,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the collection daemon (default)
    Run,
    /// Poll OpenWeather once and print the metrics
    Weather,
    /// Poll Finnhub once and print the metrics
    Finance,
    /// Read the environmental sensor once and print the metrics
    Sensors,
}

#[derive(ClapArgs, Debug)]
pub struct SourceArgs {
    /// OpenWeather API key
    #[arg(long, env = "OPEN_WEATHER_KEY", hide_env_values = true, global = true)]
    pub open_weather_key: Option<String>,

    /// Latitude for the weather report
    #[arg(long, env = "OPEN_WEATHER_LAT", allow_negative_numbers = true, global = true)]
    pub open_weather_lat: Option<f64>,

    /// Longitude for the weather report
    #[arg(long, env = "OPEN_WEATHER_LON", allow_negative_numbers = true, global = true)]
    pub open_weather_lon: Option<f64>,

    /// OpenWeather unit system (metric, imperial, standard)
    #[arg(long, default_value = "metric", global = true)]
    pub open_weather_units: String,

    /// Finnhub API key
    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true, global = true)]
    pub finnhub_api_key: Option<String>,

    /// Older deployments spelled the Finnhub variable without the second N
    #[arg(long, env = "FINHUB_API_KEY", hide = true, hide_env_values = true, global = true)]
    pub finhub_api_key: Option<String>,

    /// Comma-separated ticker symbols (defaults to a crypto/tech mix)
    #[arg(long, env = "FINNHUB_SYMBOLS", value_delimiter = ',', global = true)]
    pub finnhub_symbols: Vec<String>,

    /// IIO device directory of the BME280, e.g. /sys/bus/iio/devices/iio:device0
    #[arg(long, env = "SENSOR_DEVICE", global = true)]
    pub sensor_device: Option<PathBuf>,

    /// Feed prefix for the sensor metrics
    #[arg(long, env = "SENSOR_FEED_PREFIX", default_value = DEFAULT_FEED_PREFIX, global = true)]
    pub sensor_prefix: String,

    /// Station altitude in meters for the sea-level pressure correction
    #[arg(long, env = "SENSOR_ALTITUDE", default_value_t = iot_central::conversion::DEFAULT_ALTITUDE_M, global = true)]
    pub sensor_altitude: f64,

    /// IIO device directory of an SGP30 air-quality sensor
    #[arg(long, env = "SENSOR_AIR_DEVICE", global = true)]
    pub sensor_air_device: Option<PathBuf>,

    /// IIO device directory of a TSL2591 light sensor
    #[arg(long, env = "SENSOR_LIGHT_DEVICE", global = true)]
    pub sensor_light_device: Option<PathBuf>,

    /// Feed prefix for the air-quality and light metrics
    #[arg(long, env = "SENSOR_INDOOR_PREFIX", default_value = DEFAULT_INDOOR_PREFIX, global = true)]
    pub sensor_indoor_prefix: String,

    /// Seconds between sensor samples averaged into each poll (0 samples once per poll)
    #[arg(long, default_value = "1", global = true)]
    pub sensor_sample_period: u64,
}

#[derive(ClapArgs, Debug)]
pub struct SinkArgs {
    /// Adafruit IO username
    #[arg(long, env = "IO_USERNAME", global = true)]
    pub io_username: Option<String>,

    /// Adafruit IO key
    #[arg(long, env = "IO_KEY", hide_env_values = true, global = true)]
    pub io_key: Option<String>,

    /// Adafruit IO API base URL
    #[arg(long, env = "IO_BASE_URL", default_value = ADAFRUIT_BASE_URL, global = true)]
    pub io_base_url: String,
}

#[derive(ClapArgs, Debug)]
pub struct PipelineArgs {
    /// Sensor poll interval in seconds
    #[arg(long, default_value = "60", global = true)]
    pub sensor_interval: u64,

    /// Weather poll interval in seconds
    #[arg(long, default_value = "600", global = true)]
    pub weather_interval: u64,

    /// Finance poll interval in seconds
    #[arg(long, default_value = "600", global = true)]
    pub finance_interval: u64,

    /// Capacity of the metric channel
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY, global = true)]
    pub channel_capacity: usize,

    /// Abandon a poll after this many seconds (off by default)
    #[arg(long, global = true)]
    pub poll_timeout: Option<u64>,

    /// Log metrics instead of publishing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Serve /metrics and /health on this address
    #[arg(long, env = "METRICS_LISTEN", global = true)]
    pub listen: Option<SocketAddr>,
}

fn required<T: Clone>(value: &Option<T>, key: &str) -> Result<T, ConfigError> {
    value
        .clone()
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    pub fn weather_config(&self) -> Result<WeatherConfig, ConfigError> {
        let s = &self.sources;
        let config = WeatherConfig::new(
            required(&s.open_weather_key, "OPEN_WEATHER_KEY")?,
            required(&s.open_weather_lat, "OPEN_WEATHER_LAT")?,
            required(&s.open_weather_lon, "OPEN_WEATHER_LON")?,
        )
        .with_units(s.open_weather_units.clone());
        config.validate()?;
        Ok(config)
    }

    pub fn finance_config(&self) -> Result<FinanceConfig, ConfigError> {
        let key = self
            .sources
            .finnhub_api_key
            .clone()
            .or_else(|| self.sources.finhub_api_key.clone())
            .ok_or_else(|| ConfigError::Missing("FINNHUB_API_KEY".to_string()))?;

        let symbols: Vec<String> = self
            .sources
            .finnhub_symbols
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let config = if symbols.is_empty() {
            FinanceConfig::new(key)
        } else {
            FinanceConfig::with_symbols(key, symbols)
        };
        config.validate()?;
        Ok(config)
    }

    pub fn sensor_config(&self) -> Result<SensorConfig, ConfigError> {
        let s = &self.sources;
        let sample_period = match s.sensor_sample_period {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let mut config = SensorConfig::new(required(&s.sensor_device, "SENSOR_DEVICE")?)
            .with_feed_prefix(s.sensor_prefix.clone())
            .with_altitude(s.sensor_altitude)
            .with_indoor_prefix(s.sensor_indoor_prefix.clone())
            .with_sample_period(sample_period);
        if let Some(device) = &s.sensor_air_device {
            config = config.with_air_quality_device(device);
        }
        if let Some(device) = &s.sensor_light_device {
            config = config.with_light_device(device);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn adafruit_config(&self) -> Result<AdafruitConfig, ConfigError> {
        let config = AdafruitConfig::new(
            required(&self.sink.io_username, "IO_USERNAME")?,
            required(&self.sink.io_key, "IO_KEY")?,
        )
        .with_base_url(self.sink.io_base_url.clone());
        config.validate()?;
        Ok(config)
    }

    pub fn fetcher_config(&self, interval_secs: u64) -> FetcherConfig {
        let config = FetcherConfig::every(Duration::from_secs(interval_secs));
        match self.pipeline.poll_timeout {
            Some(secs) => config.with_poll_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::with_channel_capacity(self.pipeline.channel_capacity)
    }
}

/// Parse `argv` as if no environment variable were set
#[cfg(test)]
pub(crate) fn parse_without_env(argv: &[&str]) -> Result<Args, clap::Error> {
    use clap::{CommandFactory, FromArgMatches};

    let command = <Args as CommandFactory>::command().mut_args(|arg| arg.env(None::<&str>));
    let argv = std::iter::once("iot-central").chain(argv.iter().copied());
    let matches = command.try_get_matches_from(argv)?;
    Args::from_arg_matches(&matches)
}
