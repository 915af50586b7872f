// IoT Central Daemon - Collection daemon and self-metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! One-shot polling of a single source

use crate::cli::{Args, Command};
use crate::error::DaemonError;
use iot_central::{ConfigError, Metric, Source};
use iot_central_providers::{EnvSensorSource, FinanceSource, WeatherSource};
use std::io::Write;
use tracing::info;

/// Build the source selected by `command` from the arguments
pub fn source_for(args: &Args, command: Command) -> Result<Box<dyn Source>, DaemonError> {
    Ok(match command {
        Command::Weather => Box::new(WeatherSource::new(args.weather_config()?)?),
        Command::Finance => Box::new(FinanceSource::new(args.finance_config()?)?),
        Command::Sensors => Box::new(EnvSensorSource::new(args.sensor_config()?)),
        Command::Run => {
            return Err(ConfigError::Invalid {
                key: "command".to_string(),
                reason: "run is not a one-shot source".to_string(),
            }
            .into())
        }
    })
}

/// Set up and poll `source` once
pub async fn poll_once(source: &mut dyn Source) -> Result<Vec<Metric>, DaemonError> {
    source.init().await?;
    let metrics = source.poll().await?;
    info!(source = %source.name(), count = metrics.len(), "Polled once");
    Ok(metrics)
}

/// Print metrics as `name=value` lines
pub fn print_metrics(out: &mut impl Write, metrics: &[Metric]) -> std::io::Result<()> {
    for metric in metrics {
        writeln!(out, "{metric}")?;
    }
    Ok(())
}

/// Entry point for `iot-central weather|finance|sensors`
pub async fn run(args: &Args, command: Command) -> Result<(), DaemonError> {
    let mut source = source_for(args, command)?;
    let metrics = poll_once(source.as_mut()).await?;
    print_metrics(&mut std::io::stdout().lock(), &metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::cli::parse_without_env;
    use iot_central::SourceError;

    struct Fixed {
        ready: bool,
    }

    #[async_trait]
    impl Source for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn init(&mut self) -> Result<(), SourceError> {
            self.ready = true;
            Ok(())
        }

        async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
            if !self.ready {
                return Err(SourceError::Setup("not initialised".to_string()));
            }
            Ok(vec![Metric::reading("weather.temp", 3.5), Metric::new("note", "ok")])
        }
    }

    #[tokio::test]
    async fn test_poll_once_initialises_first() {
        let mut source = Fixed { ready: false };
        let metrics = poll_once(&mut source).await.unwrap();
        assert_eq!(metrics.len(), 2);
    }

    #[test]
    fn test_print_metrics() {
        let mut out = Vec::new();
        let metrics = vec![Metric::reading("weather.temp", 3.5), Metric::new("note", "ok")];
        print_metrics(&mut out, &metrics).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "weather.temp=3.500000\nnote=ok\n");
    }

    #[test]
    fn test_run_is_not_a_one_shot_command() {
        let args = parse_without_env(&[]).unwrap();
        assert!(matches!(
            source_for(&args, Command::Run),
            Err(DaemonError::Config(ConfigError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_missing_config_is_reported() {
        let args = parse_without_env(&["sensors"]).unwrap();
        let err = source_for(&args, Command::Sensors).err().unwrap();
        assert!(err.to_string().contains("SENSOR_DEVICE"));
    }

    #[tokio::test]
    async fn test_missing_device_fails_poll() {
        let args =
            parse_without_env(&["sensors", "--sensor-device", "/nonexistent/iio:device0"]).unwrap();
        let mut source = source_for(&args, Command::Sensors).unwrap();
        let err = poll_once(source.as_mut()).await.unwrap_err();
        assert!(matches!(err, DaemonError::Poll(SourceError::Setup(_))));
    }
}
