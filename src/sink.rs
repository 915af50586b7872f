// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Telemetry sink abstraction
//!
//! The dispatcher forwards every metric to a [`Sink`]. Feed selection is
//! part of `publish`: implementations that model the downstream service as
//! feed-scoped bind to `name` before sending `value`.
//!
//! Two in-process sinks are provided:
//!
//! - [`MemorySink`] records what was published and can be told to reject
//!   given feeds. Clones share the same record.
//! - [`LogSink`] only logs each metric.

use crate::error::SinkError;
use crate::metric::Metric;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Downstream telemetry service
#[async_trait]
pub trait Sink: Send + 'static {
    /// Publish one value to the named feed
    async fn publish(&mut self, name: &str, value: &str) -> Result<(), SinkError>;
}

#[async_trait]
impl<K: Sink + ?Sized> Sink for Box<K> {
    async fn publish(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        (**self).publish(name, value).await
    }
}

#[derive(Debug, Default)]
struct MemoryRecord {
    published: Vec<Metric>,
    attempts: usize,
}

/// In-memory sink for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    record: Arc<Mutex<MemoryRecord>>,
    failing: Arc<HashSet<String>>,
}

impl MemorySink {
    /// Create a sink that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that rejects the given feeds
    pub fn failing_on<I, S>(feeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            record: Arc::default(),
            failing: Arc::new(feeds.into_iter().map(Into::into).collect()),
        }
    }

    /// Metrics accepted so far, in publish order
    pub fn published(&self) -> Vec<Metric> {
        self.lock().published.clone()
    }

    /// Values accepted for one feed, in publish order
    pub fn values_for(&self, name: &str) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.value.clone())
            .collect()
    }

    /// Number of publish calls, accepted or not
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryRecord> {
        // A poisoned record is still readable; the panicking writer only
        // pushed or counted.
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn publish(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        let mut record = self.lock();
        record.attempts += 1;
        if self.failing.contains(name) {
            return Err(SinkError::Rejected {
                feed: name.to_string(),
                status: 500,
            });
        }
        record.published.push(Metric::new(name, value));
        Ok(())
    }
}

/// Sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn publish(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        info!(feed = %name, value = %value, "Metric");
        Ok(())
    }
}
