// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Orchestrator and two-phase shutdown
//!
//! The [`Orchestrator`] owns the metric channel, the shutdown signal and
//! the completion counter, wires N fetchers and one dispatcher together,
//! and stops them in order:
//!
//! 1. Every fetcher is registered with the counter; fetchers and the
//!    dispatcher start concurrently.
//! 2. When the shutdown signal fires, fetchers stop at their next wait
//!    point. In-flight polls are not cancelled.
//! 3. Phase 1: wait until the counter is back to zero. No more metrics
//!    can be produced after this point.
//! 4. Register the dispatcher and enqueue the stop marker carrying its
//!    token (exactly once).
//! 5. Phase 2: wait until the counter is zero again, i.e. the dispatcher
//!    drained the channel and consumed the stop marker.
//!
//! The dispatcher outlives every fetcher, so a fetcher blocked on a full
//! channel always gets unblocked.

use crate::channel::channel;
use crate::completion::CompletionCounter;
use crate::dispatcher::Dispatcher;
use crate::error::{ConfigError, Result};
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::shutdown::ShutdownSignal;
use crate::sink::Sink;
use crate::source::Source;
use crate::stats::{DispatcherReport, FetcherReport, ShutdownReport};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Default metric channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Orchestrator-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Bound of the shared metric channel; producers wait when it is full
    pub channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    /// Create a configuration with a custom channel capacity
    pub fn with_channel_capacity(channel_capacity: usize) -> Self {
        Self { channel_capacity }
    }

    /// Check the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

struct Registration {
    source: Box<dyn Source>,
    config: FetcherConfig,
}

/// Wires fetchers and the dispatcher and runs the shutdown protocol
pub struct Orchestrator {
    config: OrchestratorConfig,
    sources: Vec<Registration>,
    shutdown: ShutdownSignal,
}

impl Orchestrator {
    /// Create an orchestrator with default configuration
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    /// Create an orchestrator with custom configuration
    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Register a source with its schedule
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule is invalid (zero interval or zero
    /// poll timeout).
    pub fn add_source(&mut self, source: impl Source, config: FetcherConfig) -> Result<()> {
        self.add_boxed_source(Box::new(source), config)
    }

    /// Register an already boxed source
    pub fn add_boxed_source(
        &mut self,
        source: Box<dyn Source>,
        config: FetcherConfig,
    ) -> Result<()> {
        config.validate(source.name())?;
        info!(source = %source.name(), interval = ?config.interval, "Source registered");
        self.sources.push(Registration { source, config });
        Ok(())
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Handle that starts the shutdown when triggered
    ///
    /// Can be cloned and triggered from anywhere (a signal handler, a
    /// test) any number of times; only the first trigger has an effect.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run the pipeline until the shutdown signal, then stop it in two phases
    ///
    /// # Errors
    ///
    /// Returns an error only for invalid configuration; failures of
    /// individual fetchers or of the sink are logged and reported.
    pub async fn run<K: Sink>(self, sink: K) -> Result<ShutdownReport> {
        self.config.validate()?;

        let Orchestrator {
            config,
            sources,
            shutdown,
        } = self;

        let (tx, rx) = channel(config.channel_capacity);
        let counter = CompletionCounter::new();

        let dispatcher = tokio::spawn(Dispatcher::new(sink, rx).run());

        let mut fetchers: Vec<(String, JoinHandle<FetcherReport>)> =
            Vec::with_capacity(sources.len());
        for Registration { source, config } in sources {
            let name = source.name().to_string();
            let token = counter.register(name.clone());
            let fetcher = Fetcher::new(source, config, tx.clone(), shutdown.listener(), token);
            fetchers.push((name, tokio::spawn(fetcher.run())));
        }
        info!(fetchers = fetchers.len(), "Pipeline started");

        shutdown.listener().triggered().await;
        info!("Shutdown initiated, stopping fetchers");

        // Phase 1: every fetcher reaches Stopped.
        counter.wait_idle().await;
        let mut reports = Vec::with_capacity(fetchers.len());
        for (name, handle) in fetchers {
            reports.push(match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!(source = %name, error = %e, "Fetcher task failed");
                    FetcherReport {
                        panicked: true,
                        ..FetcherReport::new(name)
                    }
                }
            });
        }
        info!("All fetchers stopped, stopping dispatcher");

        // Phase 2: the dispatcher drains the channel and consumes the stop marker.
        if !tx.send_stop(counter.register("dispatcher")).await {
            error!("Dispatcher already gone before stop marker");
        }
        drop(tx);
        counter.wait_idle().await;

        let dispatcher = match dispatcher.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Dispatcher task failed");
                DispatcherReport::default()
            }
        };
        info!(
            published = dispatcher.published,
            failed = dispatcher.failed,
            "Shutdown complete"
        );

        Ok(ShutdownReport {
            fetchers: reports,
            dispatcher,
        })
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("sources", &self.sources.len())
            .field("shutdown_triggered", &self.shutdown.is_triggered())
            .finish()
    }
}
