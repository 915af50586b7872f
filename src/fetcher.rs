// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Periodic fetcher
//!
//! One [`Fetcher`] drives one [`Source`]. Its lifecycle:
//!
//! ```text
//! Starting ──init ok──▶ Polling ──▶ Waiting ──tick──▶ Polling ...
//!     │                               │
//!     └──init failed──▶ Stopped ◀──shutdown
//! ```
//!
//! - The first poll happens immediately, not after one interval.
//! - In `Waiting`, shutdown and the timer are raced with shutdown checked
//!   first, so no poll starts once shutdown has been observed.
//! - A poll in progress is never cancelled. Shutdown latency is bounded by
//!   the in-flight poll (and its send backpressure), not by the interval.
//! - On `Stopped` the fetcher releases its completion token exactly once.

use crate::channel::{ChannelClosed, MetricSender};
use crate::completion::CompletionToken;
use crate::error::{ConfigError, SourceError};
use crate::shutdown::ShutdownListener;
use crate::source::Source;
use crate::stats::FetcherReport;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Per-fetcher schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Time between polls
    pub interval: Duration,

    /// Abandon a poll that takes longer than this (none by default)
    pub poll_timeout: Option<Duration>,
}

impl FetcherConfig {
    /// Poll at a fixed interval with no timeout
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            poll_timeout: None,
        }
    }

    /// Treat polls longer than `timeout` as failures
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Check the schedule for the named source
    pub fn validate(&self, source: &str) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval(source.to_string()));
        }
        if self.poll_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid {
                key: format!("{source}.poll_timeout"),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Fetcher lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherState {
    /// Running one-time source setup
    Starting,
    /// Idle until the next tick or shutdown
    Waiting,
    /// Calling the source and forwarding its metrics
    Polling,
    /// Terminal
    Stopped,
}

/// Periodic producer bound to one source
pub struct Fetcher {
    source: Box<dyn Source>,
    config: FetcherConfig,
    tx: MetricSender,
    shutdown: ShutdownListener,
    token: CompletionToken,
    report: FetcherReport,
}

impl Fetcher {
    /// Bind a source to the shared channel and the shutdown broadcast
    pub fn new(
        source: Box<dyn Source>,
        config: FetcherConfig,
        tx: MetricSender,
        shutdown: ShutdownListener,
        token: CompletionToken,
    ) -> Self {
        let report = FetcherReport::new(source.name());
        Self {
            source,
            config,
            tx,
            shutdown,
            token,
            report,
        }
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.report.name
    }

    /// Run until shutdown, then release the completion token
    pub async fn run(mut self) -> FetcherReport {
        info!(
            source = %self.report.name,
            interval = ?self.config.interval,
            "Fetcher starting"
        );

        let mut ticker = time::interval_at(
            Instant::now() + self.config.interval,
            self.config.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = FetcherState::Starting;
        while state != FetcherState::Stopped {
            let next = match state {
                FetcherState::Starting => match self.source.init().await {
                    Ok(()) => {
                        // Count the first interval from the end of setup.
                        ticker.reset();
                        FetcherState::Polling
                    }
                    Err(e) => {
                        error!(source = %self.report.name, error = %e, "Source setup failed");
                        self.report.setup_failed = true;
                        FetcherState::Stopped
                    }
                },
                FetcherState::Polling => {
                    self.poll_once().await;
                    FetcherState::Waiting
                }
                FetcherState::Waiting => {
                    tokio::select! {
                        biased;
                        _ = self.shutdown.triggered() => FetcherState::Stopped,
                        _ = ticker.tick() => FetcherState::Polling,
                    }
                }
                FetcherState::Stopped => FetcherState::Stopped,
            };
            debug!(source = %self.report.name, from = ?state, to = ?next, "Fetcher transition");
            state = next;
        }

        info!(
            source = %self.report.name,
            polls = self.report.polls,
            sent = self.report.metrics_sent,
            "Fetcher stopped"
        );

        let Fetcher { token, report, .. } = self;
        token.complete();
        report
    }

    async fn poll_once(&mut self) {
        self.report.polls += 1;

        let result = match self.config.poll_timeout {
            Some(limit) => match time::timeout(limit, self.source.poll()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(limit)),
            },
            None => self.source.poll().await,
        };

        let metrics = match result {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(source = %self.report.name, error = %e, "Poll failed");
                self.report.poll_failures += 1;
                return;
            }
        };
        debug!(source = %self.report.name, count = metrics.len(), "Poll complete");

        for metric in metrics {
            if !metric.is_publishable() {
                warn!(source = %self.report.name, value = %metric.value, "Dropping metric with empty name");
                self.report.metrics_dropped += 1;
                continue;
            }
            match self.tx.send(metric).await {
                Ok(()) => self.report.metrics_sent += 1,
                Err(ChannelClosed(metric)) => {
                    error!(source = %self.report.name, feed = %metric.name, "Dispatcher gone, dropping metric");
                    self.report.metrics_dropped += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("name", &self.report.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel, Envelope, MetricReceiver};
    use crate::completion::CompletionCounter;
    use crate::metric::Metric;
    use crate::shutdown::ShutdownSignal;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Replays scripted poll results, then returns an empty batch forever
    struct Scripted {
        name: String,
        script: VecDeque<Result<Vec<Metric>, SourceError>>,
        fail_init: bool,
    }

    impl Scripted {
        fn new(name: &str, script: Vec<Result<Vec<Metric>, SourceError>>) -> Self {
            Self {
                name: name.to_string(),
                script: script.into(),
                fail_init: false,
            }
        }
    }

    #[async_trait]
    impl Source for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn init(&mut self) -> Result<(), SourceError> {
            if self.fail_init {
                Err(SourceError::Setup("no bus".to_string()))
            } else {
                Ok(())
            }
        }

        async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn drain(rx: &mut MetricReceiver) -> Vec<Metric> {
        let mut out = Vec::new();
        while let Some(Envelope::Metric(m)) = rx.try_recv() {
            out.push(m);
        }
        out
    }

    fn spawn_fetcher(
        source: Scripted,
        config: FetcherConfig,
        capacity: usize,
    ) -> (
        tokio::task::JoinHandle<FetcherReport>,
        MetricReceiver,
        ShutdownSignal,
        CompletionCounter,
    ) {
        let (tx, rx) = channel(capacity);
        let signal = ShutdownSignal::new();
        let counter = CompletionCounter::new();
        let fetcher = Fetcher::new(
            Box::new(source),
            config,
            tx,
            signal.listener(),
            counter.register("test"),
        );
        (tokio::spawn(fetcher.run()), rx, signal, counter)
    }

    #[test]
    fn test_config_validation() {
        assert!(FetcherConfig::every(Duration::from_secs(1))
            .validate("a")
            .is_ok());
        assert_eq!(
            FetcherConfig::every(Duration::ZERO).validate("a"),
            Err(ConfigError::ZeroInterval("a".to_string()))
        );
        assert!(FetcherConfig::every(Duration::from_secs(1))
            .with_poll_timeout(Duration::ZERO)
            .validate("a")
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_first_poll() {
        let source = Scripted::new("a", vec![Ok(vec![Metric::new("a.temp", "1")])]);
        let (handle, mut rx, signal, counter) =
            spawn_fetcher(source, FetcherConfig::every(Duration::from_secs(600)), 8);

        // Well before the first tick.
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(drain(&mut rx), vec![Metric::new("a.temp", "1")]);

        signal.trigger();
        let report = handle.await.unwrap();
        assert_eq!(report.polls, 1);
        assert_eq!(counter.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_does_not_stop_loop() {
        let source = Scripted::new(
            "a",
            vec![
                Err(SourceError::Transport("refused".to_string())),
                Ok(vec![Metric::new("a.temp", "2")]),
            ],
        );
        let (handle, mut rx, signal, _counter) =
            spawn_fetcher(source, FetcherConfig::every(Duration::from_secs(1)), 8);

        time::sleep(Duration::from_millis(1500)).await;
        signal.trigger();
        let report = handle.await.unwrap();

        assert_eq!(drain(&mut rx), vec![Metric::new("a.temp", "2")]);
        assert_eq!(report.polls, 2);
        assert_eq!(report.poll_failures, 1);
        assert_eq!(report.metrics_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_name_dropped() {
        let source = Scripted::new(
            "a",
            vec![Ok(vec![Metric::new("", "1"), Metric::new("a.ok", "2")])],
        );
        let (handle, mut rx, signal, _counter) =
            spawn_fetcher(source, FetcherConfig::every(Duration::from_secs(60)), 8);

        time::sleep(Duration::from_millis(10)).await;
        signal.trigger();
        let report = handle.await.unwrap();

        assert_eq!(drain(&mut rx), vec![Metric::new("a.ok", "2")]);
        assert_eq!(report.metrics_dropped, 1);
        assert_eq!(report.metrics_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_failure_stops_and_releases() {
        let mut source = Scripted::new("bus", vec![Ok(vec![Metric::new("x", "1")])]);
        source.fail_init = true;
        let (handle, mut rx, _signal, counter) =
            spawn_fetcher(source, FetcherConfig::every(Duration::from_secs(1)), 8);

        let report = handle.await.unwrap();
        assert!(report.setup_failed);
        assert_eq!(report.polls, 0);
        assert_eq!(counter.pending(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_counts_as_failure() {
        struct Hung;

        #[async_trait]
        impl Source for Hung {
            fn name(&self) -> &str {
                "hung"
            }

            async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
                time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![Metric::new("late", "1")])
            }
        }

        let (tx, mut rx) = channel(4);
        let signal = ShutdownSignal::new();
        let counter = CompletionCounter::new();
        let fetcher = Fetcher::new(
            Box::new(Hung),
            FetcherConfig::every(Duration::from_secs(60))
                .with_poll_timeout(Duration::from_secs(5)),
            tx,
            signal.listener(),
            counter.register("hung"),
        );
        let handle = tokio::spawn(fetcher.run());

        time::sleep(Duration::from_secs(10)).await;
        signal.trigger();
        let report = handle.await.unwrap();

        assert_eq!(report.polls, 1);
        assert_eq!(report.poll_failures, 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backpressure_waits_instead_of_dropping() {
        let metrics: Vec<Metric> = (0..5).map(|i| Metric::new("a.n", i.to_string())).collect();
        let source = Scripted::new("a", vec![Ok(metrics)]);
        let (handle, mut rx, signal, counter) =
            spawn_fetcher(source, FetcherConfig::every(Duration::from_secs(60)), 1);

        time::sleep(Duration::from_millis(10)).await;
        signal.trigger();
        // Blocked on a full channel: still registered.
        assert_eq!(counter.pending(), 1);

        let mut values = Vec::new();
        while values.len() < 5 {
            if let Some(Envelope::Metric(m)) = rx.recv().await {
                values.push(m.value);
            }
        }
        let report = handle.await.unwrap();

        assert_eq!(values, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(report.metrics_sent, 5);
        assert_eq!(report.metrics_dropped, 0);
    }
}
