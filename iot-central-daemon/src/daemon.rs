// IoT Central Daemon - Collection daemon and self-metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! The long-running collector

use crate::cli::Args;
use crate::error::DaemonError;
use crate::metrics::{InstrumentedSink, InstrumentedSource, SelfMetrics};
use crate::server::{AppState, MetricsServer};
use iot_central::{ConfigError, LogSink, Orchestrator, ShutdownReport, ShutdownSignal};
use iot_central_providers::{AdafruitSink, EnvSensorSource, FinanceSource, WeatherSource};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Treat a missing value as "source disabled"; anything else is fatal
fn optional<T>(result: Result<T, ConfigError>, source: &str) -> Result<Option<T>, DaemonError> {
    match result {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::Missing(key)) => {
            info!(source, missing = %key, "Source disabled");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Register every source whose configuration is complete
pub fn build_orchestrator(
    args: &Args,
    metrics: &Arc<SelfMetrics>,
) -> Result<Orchestrator, DaemonError> {
    let mut orchestrator = Orchestrator::with_config(args.orchestrator_config());

    if let Some(config) = optional(args.sensor_config(), "sensors")? {
        orchestrator.add_source(
            InstrumentedSource::new(EnvSensorSource::new(config), metrics.clone()),
            args.fetcher_config(args.pipeline.sensor_interval),
        )?;
    }
    if let Some(config) = optional(args.weather_config(), "weather")? {
        orchestrator.add_source(
            InstrumentedSource::new(WeatherSource::new(config)?, metrics.clone()),
            args.fetcher_config(args.pipeline.weather_interval),
        )?;
    }
    if let Some(config) = optional(args.finance_config(), "finance")? {
        orchestrator.add_source(
            InstrumentedSource::new(FinanceSource::new(config)?, metrics.clone()),
            args.fetcher_config(args.pipeline.finance_interval),
        )?;
    }

    if orchestrator.source_count() == 0 {
        return Err(DaemonError::NoSources);
    }
    metrics.sources.set(orchestrator.source_count() as i64);
    Ok(orchestrator)
}

/// Resolve on SIGINT or SIGTERM
async fn wait_for_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}

/// Bridge OS signals to the pipeline's shutdown signal
fn spawn_signal_handler(signal: ShutdownSignal) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => info!(signal = name, "Received shutdown signal"),
            Err(e) => error!(error = %e, "Failed to install signal handler, shutting down"),
        }
        if !signal.trigger() {
            warn!("Shutdown already in progress");
        }
    });
}

fn log_report(report: &ShutdownReport) {
    for fetcher in &report.fetchers {
        info!(
            source = %fetcher.name,
            polls = fetcher.polls,
            failures = fetcher.poll_failures,
            sent = fetcher.metrics_sent,
            dropped = fetcher.metrics_dropped,
            setup_failed = fetcher.setup_failed,
            panicked = fetcher.panicked,
            "Fetcher summary"
        );
    }
    info!(
        published = report.dispatcher.published,
        failed = report.dispatcher.failed,
        rejected = report.dispatcher.rejected,
        clean = report.dispatcher.stopped_cleanly,
        "Dispatcher summary"
    );
}

/// Run the pipeline against the configured sink until both phases finish
async fn collect(
    args: &Args,
    orchestrator: Orchestrator,
    metrics: &Arc<SelfMetrics>,
) -> Result<ShutdownReport, DaemonError> {
    let report = if args.pipeline.dry_run {
        info!("Dry run, metrics are only logged");
        orchestrator
            .run(InstrumentedSink::new(LogSink, metrics.clone()))
            .await?
    } else {
        let sink = AdafruitSink::new(args.adafruit_config()?)?;
        orchestrator
            .run(InstrumentedSink::new(sink, metrics.clone()))
            .await?
    };
    Ok(report)
}

/// Entry point for `iot-central run`
pub async fn run(args: &Args) -> Result<(), DaemonError> {
    let metrics = Arc::new(SelfMetrics::new()?);
    let orchestrator = build_orchestrator(args, &metrics)?;

    let server = match args.pipeline.listen {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| DaemonError::Bind { addr, source })?;
            Some(MetricsServer::spawn(listener, AppState::new(metrics.clone())))
        }
        None => None,
    };

    spawn_signal_handler(orchestrator.shutdown_signal());

    let result = collect(args, orchestrator, &metrics).await;
    if let Ok(report) = &result {
        log_report(report);
    }

    // the pipeline has drained, so the counters are final
    if let Some(server) = server {
        server.stop().await;
    }
    result?;
    info!("Shutdown complete");
    Ok(())
}
