// IoT Central Providers - Source adapters and telemetry sink
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Indoor environment sensors via Linux IIO
//!
//! The kernel drivers expose processed readings as sysfs files under each
//! device directory:
//!
//! | Driver    | File                          | Unit        |
//! |-----------|-------------------------------|-------------|
//! | `bmp280`  | `in_temp_input`               | milli °C    |
//! | `bmp280`  | `in_pressure_input`           | kPa         |
//! | `bmp280`  | `in_humidityrelative_input`   | milli %RH   |
//! | `sgp30`   | `in_concentration_co2_input`  | percent     |
//! | `sgp30`   | `in_concentration_voc_input`  | percent     |
//! | `tsl2591` | `in_illuminance_input`        | lux         |
//!
//! The BME280 is required. A BMP280 has no humidity channel, and the SGP30
//! and TSL2591 are optional; any absent channel only omits its feeds.
//!
//! ## Sampling
//!
//! With a sample period configured, `init()` starts a background task that
//! reads every sensor once per period into a [`Window`]. Each `poll()` adds
//! one fresh sample and publishes the window average, so a 60 s poll
//! interval with a 1 s period reports the mean of about sixty readings.

use crate::config::SensorConfig;
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use iot_central::conversion::{
    celsius_to_fahrenheit, hpa_to_inhg, raw_pressure_to_sealevel, relative_humidity_to_absolute,
};
use iot_central::{Batch, Metric, Source, SourceError};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const TEMPERATURE_FILE: &str = "in_temp_input";
const PRESSURE_FILE: &str = "in_pressure_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";
const CO2_FILE: &str = "in_concentration_co2_input";
const VOC_FILE: &str = "in_concentration_voc_input";
const ILLUMINANCE_FILE: &str = "in_illuminance_input";

const PPM_PER_PERCENT: f64 = 1e4;
const PPB_PER_PERCENT: f64 = 1e7;

/// CO2 equivalent the SGP30 reports while its baseline settles
const SGP30_WARMUP_CO2_PPM: f64 = 400.0;

/// Absolute humidity assumed until the BME280 has reported, in g/m³
pub const DEFAULT_ABS_HUMIDITY: f64 = 10.5;

/// BME280 sample, in SI-ish units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvReading {
    pub celsius: f64,
    pub pressure_hpa: f64,
    pub humidity: Option<f64>,
}

/// SGP30 sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AirReading {
    /// CO2 equivalent, ppm
    pub co2_ppm: Option<f64>,

    /// Total volatile organic compounds, ppb
    pub tvoc_ppb: Option<f64>,
}

/// One reading of every configured sensor, or the average of several
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub env: EnvReading,
    pub air: AirReading,
    pub lux: Option<f64>,
}

/// Read one IIO channel, `None` if the device has no such channel
async fn read_channel(device: &Path, file: &str) -> Result<Option<f64>> {
    let path = device.join(file);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ProviderError::Reading {
            path,
            value: trimmed.to_string(),
        })
}

async fn require_channel(device: &Path, file: &str) -> Result<f64> {
    read_channel(device, file).await?.ok_or_else(|| {
        ProviderError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("{} has no {file}", device.display()),
        ))
    })
}

/// Read temperature, pressure and (if present) humidity
pub async fn read_env(device: &Path) -> Result<EnvReading> {
    let celsius = require_channel(device, TEMPERATURE_FILE).await? / 1000.0;
    let pressure_hpa = require_channel(device, PRESSURE_FILE).await? * 10.0;
    let humidity = read_channel(device, HUMIDITY_FILE)
        .await?
        .map(|milli| milli / 1000.0);

    Ok(EnvReading {
        celsius,
        pressure_hpa,
        humidity,
    })
}

/// Read CO2 equivalent and TVOC
///
/// `abs_humidity` is the latest BME280 absolute humidity; it is logged with
/// the sample so drifting readings can be matched against the air moisture.
pub async fn read_air_quality(device: &Path, abs_humidity: f64) -> Result<AirReading> {
    let reading = AirReading {
        co2_ppm: read_channel(device, CO2_FILE)
            .await?
            .map(|percent| percent * PPM_PER_PERCENT),
        tvoc_ppb: read_channel(device, VOC_FILE)
            .await?
            .map(|percent| percent * PPB_PER_PERCENT),
    };
    debug!(co2_ppm = ?reading.co2_ppm, tvoc_ppb = ?reading.tvoc_ppb, abs_humidity, "SGP30 sample");
    Ok(reading)
}

/// Read illuminance in lux
pub async fn read_light(device: &Path) -> Result<Option<f64>> {
    read_channel(device, ILLUMINANCE_FILE).await
}

/// Read every configured sensor once
///
/// Only the BME280 is required; a failing optional sensor is logged and
/// left out of the sample.
pub async fn read_sample(config: &SensorConfig, abs_humidity: f64) -> Result<Sample> {
    let env = read_env(&config.device).await?;

    let air = match &config.air_quality_device {
        Some(device) => read_air_quality(device, abs_humidity)
            .await
            .unwrap_or_else(|e| {
                warn!(device = %device.display(), error = %e, "SGP30 read failed");
                AirReading::default()
            }),
        None => AirReading::default(),
    };
    let lux = match &config.light_device {
        Some(device) => read_light(device).await.unwrap_or_else(|e| {
            warn!(device = %device.display(), error = %e, "TSL2591 read failed");
            None
        }),
        None => None,
    };

    Ok(Sample { env, air, lux })
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}

/// Running averages between two polls
///
/// The SGP30 warm-up CO2 value and a zero TVOC are left out, and so is a
/// non-finite lux.
#[derive(Debug)]
pub struct Window {
    celsius: Mean,
    pressure_hpa: Mean,
    humidity: Mean,
    co2_ppm: Mean,
    tvoc_ppb: Mean,
    lux: Mean,
    abs_humidity: f64,
}

impl Default for Window {
    fn default() -> Self {
        Self::with_abs_humidity(DEFAULT_ABS_HUMIDITY)
    }
}

impl Window {
    fn with_abs_humidity(abs_humidity: f64) -> Self {
        Self {
            celsius: Mean::default(),
            pressure_hpa: Mean::default(),
            humidity: Mean::default(),
            co2_ppm: Mean::default(),
            tvoc_ppb: Mean::default(),
            lux: Mean::default(),
            abs_humidity,
        }
    }

    /// Fold one sample into the averages
    pub fn add(&mut self, sample: &Sample) {
        let env = &sample.env;
        self.celsius.add(env.celsius);
        self.pressure_hpa.add(env.pressure_hpa);
        if let Some(humidity) = env.humidity {
            self.humidity.add(humidity);
            self.abs_humidity = relative_humidity_to_absolute(humidity, env.celsius);
        }

        if let Some(co2) = sample.air.co2_ppm.filter(|&ppm| ppm != SGP30_WARMUP_CO2_PPM) {
            self.co2_ppm.add(co2);
        }
        if let Some(tvoc) = sample.air.tvoc_ppb.filter(|&ppb| ppb != 0.0) {
            self.tvoc_ppb.add(tvoc);
        }
        if let Some(lux) = sample.lux.filter(|lux| lux.is_finite()) {
            self.lux.add(lux);
        }
    }

    /// BME280 samples collected so far
    pub fn samples(&self) -> u32 {
        self.celsius.count
    }

    /// Latest absolute humidity, carried across windows
    pub fn abs_humidity(&self) -> f64 {
        self.abs_humidity
    }

    /// Averages since the last call; `None` if nothing was sampled
    pub fn take(&mut self) -> Option<Sample> {
        let done = std::mem::replace(self, Self::with_abs_humidity(self.abs_humidity));
        Some(Sample {
            env: EnvReading {
                celsius: done.celsius.value()?,
                pressure_hpa: done.pressure_hpa.value()?,
                humidity: done.humidity.value(),
            },
            air: AirReading {
                co2_ppm: done.co2_ppm.value(),
                tvoc_ppb: done.tvoc_ppb.value(),
            },
            lux: done.lux.value(),
        })
    }
}

fn lock(window: &Mutex<Window>) -> MutexGuard<'_, Window> {
    window.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raw and derived BME280 feeds for one reading
pub fn reading_metrics(reading: &EnvReading, prefix: &str, altitude_m: f64) -> Vec<Metric> {
    let raw = format!("{prefix}-bme280");
    let mut batch = Batch::new();

    batch.reading(format!("{raw}.temperature"), reading.celsius);
    if let Some(humidity) = reading.humidity {
        batch.nonzero(format!("{raw}.humidity"), humidity);
    }
    batch.nonzero(format!("{raw}.pressure"), reading.pressure_hpa);

    batch.reading(
        format!("{prefix}.temperature"),
        celsius_to_fahrenheit(reading.celsius),
    );
    if let Some(humidity) = reading.humidity {
        batch.nonzero(format!("{prefix}.humidity"), humidity);
        batch.nonzero(
            format!("{prefix}.abs-humidity"),
            relative_humidity_to_absolute(humidity, reading.celsius),
        );
    }
    let sealevel = raw_pressure_to_sealevel(reading.pressure_hpa, reading.celsius, altitude_m);
    batch.nonzero(format!("{prefix}.pressure"), hpa_to_inhg(sealevel));

    batch.into_metrics()
}

/// Air-quality and light feeds
pub fn indoor_metrics(air: &AirReading, lux: Option<f64>, prefix: &str) -> Vec<Metric> {
    let mut batch = Batch::new();
    if let Some(co2) = air.co2_ppm {
        batch.nonzero(format!("{prefix}.co2"), co2);
    }
    if let Some(tvoc) = air.tvoc_ppb {
        batch.nonzero(format!("{prefix}.tvoc"), tvoc);
    }
    // a dark room reads 0 lux
    if let Some(lux) = lux {
        batch.reading(format!("{prefix}.lux"), lux);
    }
    batch.into_metrics()
}

/// Every feed for one (averaged) sample
pub fn sample_metrics(sample: &Sample, config: &SensorConfig) -> Vec<Metric> {
    let mut metrics = reading_metrics(&sample.env, &config.feed_prefix, config.altitude_m);
    metrics.extend(indoor_metrics(&sample.air, sample.lux, &config.indoor_prefix));
    metrics
}

async fn sample_loop(config: SensorConfig, period: Duration, window: Arc<Mutex<Window>>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let abs_humidity = lock(&window).abs_humidity();
        match read_sample(&config, abs_humidity).await {
            Ok(sample) => lock(&window).add(&sample),
            Err(e) => debug!(source = "sensors", error = %e, "Sample skipped"),
        }
    }
}

/// Environmental sensors on the local IIO bus
#[derive(Debug)]
pub struct EnvSensorSource {
    config: SensorConfig,
    window: Arc<Mutex<Window>>,
    sampler: Option<JoinHandle<()>>,
}

impl EnvSensorSource {
    /// Source over the devices in `config`; nothing is read until `init()`
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            window: Arc::new(Mutex::new(Window::default())),
            sampler: None,
        }
    }

    /// The configuration this source reads with
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }
}

impl Drop for EnvSensorSource {
    fn drop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }
    }
}

#[async_trait]
impl Source for EnvSensorSource {
    fn name(&self) -> &str {
        "sensors"
    }

    async fn init(&mut self) -> std::result::Result<(), SourceError> {
        self.config
            .validate()
            .map_err(|e| SourceError::Setup(e.to_string()))?;

        let device = &self.config.device;
        let is_dir = tokio::fs::metadata(device)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(SourceError::Setup(format!(
                "sensor device {} not found",
                device.display()
            )));
        }

        for device in self.config.devices() {
            match tokio::fs::read_to_string(device.join("name")).await {
                Ok(name) => {
                    info!(source = "sensors", device = %device.display(), driver = %name.trim(), "Sensor ready")
                }
                Err(e) => {
                    warn!(source = "sensors", device = %device.display(), error = %e, "Sensor driver unknown")
                }
            }
        }

        if let Some(period) = self.config.sample_period.filter(|_| self.sampler.is_none()) {
            debug!(source = "sensors", ?period, "Starting sampler");
            self.sampler = Some(tokio::spawn(sample_loop(
                self.config.clone(),
                period,
                self.window.clone(),
            )));
        }
        Ok(())
    }

    async fn poll(&mut self) -> std::result::Result<Vec<Metric>, SourceError> {
        let abs_humidity = lock(&self.window).abs_humidity();
        let failed = match read_sample(&self.config, abs_humidity).await {
            Ok(sample) => {
                lock(&self.window).add(&sample);
                None
            }
            Err(e) => Some(e),
        };

        let (averaged, samples) = {
            let mut window = lock(&self.window);
            let samples = window.samples();
            (window.take(), samples)
        };

        match (averaged, failed) {
            (Some(sample), failed) => {
                if let Some(e) = failed {
                    warn!(source = "sensors", error = %e, samples, "Read failed, publishing earlier samples");
                }
                debug!(
                    source = "sensors",
                    samples,
                    celsius = sample.env.celsius,
                    pressure_hpa = sample.env.pressure_hpa,
                    humidity = ?sample.env.humidity,
                    "Sensor window"
                );
                Ok(sample_metrics(&sample, &self.config))
            }
            (None, Some(e)) => Err(e.into()),
            (None, None) => Ok(Vec::new()),
        }
    }
}
