// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Pipeline statistics
//!
//! Each fetcher and the dispatcher count what they did during their
//! lifetime and hand the counts back when they stop. The orchestrator
//! gathers them into a [`ShutdownReport`].

/// Lifetime counters of one fetcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetcherReport {
    /// Source name
    pub name: String,
    /// Completed poll calls (successful or not)
    pub polls: u64,
    /// Polls that returned an error or timed out
    pub poll_failures: u64,
    /// Metrics handed to the channel
    pub metrics_sent: u64,
    /// Metrics dropped (empty name, channel closed)
    pub metrics_dropped: u64,
    /// The source failed its one-time setup and never polled
    pub setup_failed: bool,
    /// The fetcher task panicked; counters are unknown
    pub panicked: bool,
}

impl FetcherReport {
    /// Create an empty report for the named source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Polls that produced a result
    pub fn successful_polls(&self) -> u64 {
        self.polls - self.poll_failures
    }
}

/// Lifetime counters of the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherReport {
    /// Metrics accepted by the sink
    pub published: u64,
    /// Metrics the sink failed to accept (dropped, not retried)
    pub failed: u64,
    /// Metrics refused before reaching the sink (empty name)
    pub rejected: u64,
    /// The dispatcher stopped on the stop marker (rather than a closed channel)
    pub stopped_cleanly: bool,
}

impl DispatcherReport {
    /// Every metric the dispatcher took off the channel
    pub fn received(&self) -> u64 {
        self.published + self.failed + self.rejected
    }
}

/// Outcome of a full run, returned after phase 2
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// One entry per fetcher, in registration order
    pub fetchers: Vec<FetcherReport>,
    /// Dispatcher counters
    pub dispatcher: DispatcherReport,
}

impl ShutdownReport {
    /// Report for the named fetcher
    pub fn fetcher(&self, name: &str) -> Option<&FetcherReport> {
        self.fetchers.iter().find(|f| f.name == name)
    }

    /// Metrics all fetchers put on the channel
    pub fn metrics_sent(&self) -> u64 {
        self.fetchers.iter().map(|f| f.metrics_sent).sum()
    }
}
