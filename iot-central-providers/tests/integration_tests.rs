// IoT Central Providers - Integration Tests
//
// Runs the real adapters through the core orchestrator. The sensor is faked
// with a temporary IIO sysfs directory; HTTP providers point at a closed
// local port so every request fails fast.

use iot_central::{FetcherConfig, MemorySink, Orchestrator, Source, SourceError};
use iot_central_providers::{
    EnvSensorSource, FinanceConfig, FinanceSource, SensorConfig, WeatherConfig, WeatherSource,
    DEFAULT_SENSOR_INTERVAL,
};
use std::path::Path;
use tempfile::TempDir;

const CLOSED_PORT: &str = "http://127.0.0.1:9";

fn bme280(dir: &Path, milli_celsius: &str, kpa: &str, milli_rh: &str) {
    std::fs::write(dir.join("name"), "bme280\n").unwrap();
    std::fs::write(dir.join("in_temp_input"), milli_celsius).unwrap();
    std::fs::write(dir.join("in_pressure_input"), kpa).unwrap();
    std::fs::write(dir.join("in_humidityrelative_input"), milli_rh).unwrap();
}

// ============================================================================
// Sensor through the pipeline
// ============================================================================

#[tokio::test]
async fn test_sensor_metrics_reach_sink() {
    let device = TempDir::new().unwrap();
    bme280(device.path(), "22000", "101.325", "40000");

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(
            EnvSensorSource::new(SensorConfig::new(device.path())),
            FetcherConfig::every(DEFAULT_SENSOR_INTERVAL),
        )
        .unwrap();
    orchestrator.shutdown_signal().trigger();

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert_eq!(report.dispatcher.published, 7);
    assert_eq!(sink.values_for("mbr-bme280.temperature"), vec!["22.000000"]);
    assert_eq!(sink.values_for("mbr-bme280.humidity"), vec!["40.000000"]);
    assert_eq!(sink.values_for("mbr.temperature"), vec!["71.600000"]);
    assert_eq!(sink.values_for("mbr-bme280.pressure"), vec!["1013.250000"]);
}

#[tokio::test]
async fn test_two_sensors_share_one_sink() {
    let indoor = TempDir::new().unwrap();
    let outdoor = TempDir::new().unwrap();
    bme280(indoor.path(), "21000", "100.0", "45000");
    bme280(outdoor.path(), "-3000", "100.0", "80000");

    let mut orchestrator = Orchestrator::new();
    for (dir, prefix) in [(&indoor, "indoor"), (&outdoor, "outdoor")] {
        let config = SensorConfig::new(dir.path()).with_feed_prefix(prefix);
        orchestrator
            .add_source(
                EnvSensorSource::new(config),
                FetcherConfig::every(DEFAULT_SENSOR_INTERVAL),
            )
            .unwrap();
    }
    orchestrator.shutdown_signal().trigger();

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert_eq!(report.metrics_sent(), 14);
    assert_eq!(sink.values_for("outdoor-bme280.temperature"), vec!["-3.000000"]);
    assert_eq!(sink.values_for("indoor-bme280.temperature"), vec!["21.000000"]);
}

#[tokio::test]
async fn test_missing_device_does_not_stop_other_sources() {
    let present = TempDir::new().unwrap();
    bme280(present.path(), "20000", "100.0", "50000");
    let absent = present.path().join("iio:device9");

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(
            EnvSensorSource::new(SensorConfig::new(present.path())),
            FetcherConfig::every(DEFAULT_SENSOR_INTERVAL),
        )
        .unwrap();
    orchestrator
        .add_source(
            EnvSensorSource::new(SensorConfig::new(&absent).with_feed_prefix("gone")),
            FetcherConfig::every(DEFAULT_SENSOR_INTERVAL),
        )
        .unwrap();
    orchestrator.shutdown_signal().trigger();

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    let failed: Vec<_> = report.fetchers.iter().filter(|f| f.setup_failed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].polls, 0);
    assert_eq!(report.dispatcher.published, 7);
    assert!(sink.published().iter().all(|m| !m.name.starts_with("gone")));
}

#[tokio::test]
async fn test_indoor_sensors_reach_sink() {
    let bme = TempDir::new().unwrap();
    let sgp = TempDir::new().unwrap();
    let tsl = TempDir::new().unwrap();
    bme280(bme.path(), "21000", "100.0", "45000");
    std::fs::write(sgp.path().join("in_concentration_co2_input"), "0.0612").unwrap();
    std::fs::write(sgp.path().join("in_concentration_voc_input"), "0.0000087").unwrap();
    std::fs::write(tsl.path().join("in_illuminance_input"), "0").unwrap();

    let config = SensorConfig::new(bme.path())
        .with_air_quality_device(sgp.path())
        .with_light_device(tsl.path());
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(
            EnvSensorSource::new(config),
            FetcherConfig::every(DEFAULT_SENSOR_INTERVAL),
        )
        .unwrap();
    orchestrator.shutdown_signal().trigger();

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert_eq!(report.dispatcher.published, 10);
    assert_eq!(sink.values_for("indoor-env.co2"), vec!["612.000000"]);
    assert_eq!(sink.values_for("indoor-env.tvoc"), vec!["87.000000"]);
    assert_eq!(sink.values_for("indoor-env.lux"), vec!["0.000000"]);
}

// ============================================================================
// HTTP sources against an unreachable endpoint
// ============================================================================

#[tokio::test]
async fn test_unreachable_weather_counts_poll_failure() {
    let config = WeatherConfig::new("key", 51.5, -0.12).with_base_url(CLOSED_PORT);
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(
            WeatherSource::new(config).unwrap(),
            FetcherConfig::every(DEFAULT_SENSOR_INTERVAL),
        )
        .unwrap();
    orchestrator.shutdown_signal().trigger();

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    let weather = report.fetcher("weather").unwrap();
    assert_eq!(weather.polls, 1);
    assert_eq!(weather.poll_failures, 1);
    assert!(sink.published().is_empty());
    assert!(report.dispatcher.stopped_cleanly);
}

#[tokio::test]
async fn test_finance_without_symbols_fails_setup() {
    let none: [&str; 0] = [];
    let mut source = FinanceSource::new(FinanceConfig::with_symbols("key", none)).unwrap();
    let err = source.init().await.unwrap_err();
    assert!(matches!(err, SourceError::Setup(ref msg) if msg.contains("FINNHUB_SYMBOLS")));
}

#[tokio::test]
async fn test_source_names() {
    let weather = WeatherSource::new(WeatherConfig::new("k", 0.0, 0.0)).unwrap();
    let finance = FinanceSource::new(FinanceConfig::new("k")).unwrap();
    let sensor = EnvSensorSource::new(SensorConfig::new("/nonexistent"));

    assert_eq!(weather.name(), "weather");
    assert_eq!(finance.name(), "finance");
    assert_eq!(sensor.name(), "sensors");
}
