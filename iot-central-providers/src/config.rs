// IoT Central Providers - Source adapters and telemetry sink
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for the providers

use iot_central::conversion::DEFAULT_ALTITUDE_M;
use iot_central::ConfigError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default polling interval for the HTTP providers (free-tier friendly)
pub const DEFAULT_HTTP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Default polling interval for the local sensor
pub const DEFAULT_SENSOR_INTERVAL: Duration = Duration::from_secs(60);

/// Default HTTP request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenWeather One Call endpoint
pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/onecall";
/// Finnhub quote endpoint
pub const FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1/quote";
/// Adafruit IO REST API root
pub const ADAFRUIT_BASE_URL: &str = "https://io.adafruit.com/api/v2";

/// Symbols tracked when none are configured
pub const DEFAULT_SYMBOLS: &[&str] = &["COINBASE:BTC-USD", "KRAKEN:USDTZUSD", "QQQ", "IONQ", "TSLA"];

/// Feed prefix used by the environmental sensor
pub const DEFAULT_FEED_PREFIX: &str = "mbr";

/// Feed prefix for the air-quality and light readings
pub const DEFAULT_INDOOR_PREFIX: &str = "indoor-env";

/// How often the sensors are sampled between two polls
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// Placeholder shown instead of secrets in `Debug` output
const REDACTED: &str = "<redacted>";

fn require(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key.to_string()));
    }
    Ok(())
}

/// OpenWeather One Call configuration
#[derive(Clone)]
pub struct WeatherConfig {
    /// API key (`appid`)
    pub api_key: String,

    /// Latitude in degrees, -90 to 90
    pub latitude: f64,

    /// Longitude in degrees, -180 to 180
    pub longitude: f64,

    /// `metric`, `imperial` or `standard`
    pub units: String,

    /// Endpoint, overridable for tests and proxies
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl WeatherConfig {
    /// Metric units against the public endpoint
    pub fn new(api_key: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            api_key: api_key.into(),
            latitude,
            longitude,
            units: "metric".to_string(),
            base_url: OPENWEATHER_BASE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Use another unit system
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Use another endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Check the key, the coordinates and the unit system
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("OPEN_WEATHER_KEY", &self.api_key)?;
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::Invalid {
                key: "OPEN_WEATHER_LAT".to_string(),
                reason: format!("{} is outside [-90, 90]", self.latitude),
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::Invalid {
                key: "OPEN_WEATHER_LON".to_string(),
                reason: format!("{} is outside [-180, 180]", self.longitude),
            });
        }
        match self.units.as_str() {
            "metric" | "imperial" | "standard" => Ok(()),
            other => Err(ConfigError::Invalid {
                key: "units".to_string(),
                reason: format!("unknown unit system {other:?}"),
            }),
        }
    }
}

impl fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("api_key", &REDACTED)
            .field("latitude", &self.latitude)
            .field("longitude", &self.longitude)
            .field("units", &self.units)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Finnhub quote configuration
#[derive(Clone)]
pub struct FinanceConfig {
    /// API key, sent as `X-Finnhub-Token`
    pub api_key: String,

    /// Ticker symbols, e.g. `QQQ` or `COINBASE:BTC-USD`
    pub symbols: Vec<String>,

    /// Endpoint, overridable for tests and proxies
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl FinanceConfig {
    /// Track [`DEFAULT_SYMBOLS`]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_symbols(api_key, DEFAULT_SYMBOLS.iter().copied())
    }

    /// Track the given symbols
    pub fn with_symbols<I, S>(api_key: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            api_key: api_key.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
            base_url: FINNHUB_BASE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Use another endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Check the key and that no symbol is blank
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("FINNHUB_API_KEY", &self.api_key)?;
        if self.symbols.is_empty() {
            return Err(ConfigError::Missing("FINNHUB_SYMBOLS".to_string()));
        }
        if let Some(blank) = self.symbols.iter().position(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                key: "FINNHUB_SYMBOLS".to_string(),
                reason: format!("symbol #{blank} is empty"),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for FinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinanceConfig")
            .field("api_key", &REDACTED)
            .field("symbols", &self.symbols)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Environmental sensor (Linux IIO) configuration
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// IIO device directory, e.g. `/sys/bus/iio/devices/iio:device0`
    pub device: PathBuf,

    /// Prefix for every feed name
    pub feed_prefix: String,

    /// Station altitude for the sea-level pressure correction
    pub altitude_m: f64,

    /// SGP30 IIO directory (CO2 equivalent and TVOC), if fitted
    pub air_quality_device: Option<PathBuf>,

    /// TSL2591 IIO directory (illuminance), if fitted
    pub light_device: Option<PathBuf>,

    /// Prefix for the air-quality and light feeds
    pub indoor_prefix: String,

    /// Background sampling period; each poll publishes the window average.
    /// `None` takes one sample per poll.
    pub sample_period: Option<Duration>,
}

impl SensorConfig {
    /// BME280 only, sampled every [`DEFAULT_SAMPLE_PERIOD`]
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            feed_prefix: DEFAULT_FEED_PREFIX.to_string(),
            altitude_m: DEFAULT_ALTITUDE_M,
            air_quality_device: None,
            light_device: None,
            indoor_prefix: DEFAULT_INDOOR_PREFIX.to_string(),
            sample_period: Some(DEFAULT_SAMPLE_PERIOD),
        }
    }

    /// Use another prefix for the BME280 feeds
    pub fn with_feed_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.feed_prefix = prefix.into();
        self
    }

    /// Set the station altitude in meters
    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = altitude_m;
        self
    }

    /// Also read an SGP30 air-quality sensor
    pub fn with_air_quality_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.air_quality_device = Some(device.into());
        self
    }

    /// Also read a TSL2591 light sensor
    pub fn with_light_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.light_device = Some(device.into());
        self
    }

    /// Use another prefix for the air-quality and light feeds
    pub fn with_indoor_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.indoor_prefix = prefix.into();
        self
    }

    /// Change or disable (`None`) background sampling
    pub fn with_sample_period(mut self, period: Option<Duration>) -> Self {
        self.sample_period = period;
        self
    }

    /// Check the device path, prefixes, altitude and sample period
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.as_os_str().is_empty() {
            return Err(ConfigError::Missing("SENSOR_DEVICE".to_string()));
        }
        require("feed prefix", &self.feed_prefix)?;
        require("indoor feed prefix", &self.indoor_prefix)?;
        if !self.altitude_m.is_finite() {
            return Err(ConfigError::Invalid {
                key: "altitude".to_string(),
                reason: "must be a finite number of meters".to_string(),
            });
        }
        if self.sample_period == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid {
                key: "sample period".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Every configured IIO directory, BME280 first
    pub fn devices(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.device)
            .chain(self.air_quality_device.as_ref())
            .chain(self.light_device.as_ref())
    }
}

/// Adafruit IO sink configuration
#[derive(Clone)]
pub struct AdafruitConfig {
    /// Account name, part of every feed URL
    pub username: String,

    /// AIO key, sent as `X-AIO-Key`
    pub key: String,

    /// API root, overridable for tests and proxies
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl AdafruitConfig {
    /// Credentials against the public API
    pub fn new(username: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            key: key.into(),
            base_url: ADAFRUIT_BASE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Use another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Check that both credentials are present
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("IO_USERNAME", &self.username)?;
        require("IO_KEY", &self.key)
    }
}

impl fmt::Debug for AdafruitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdafruitConfig")
            .field("username", &self.username)
            .field("key", &REDACTED)
            .field("base_url", &self.base_url)
            .finish()
    }
}
