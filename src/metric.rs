// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Metric types
//!
//! A [`Metric`] is a named, string-valued telemetry sample. Names are
//! dot-namespaced feed identifiers such as `weather.temp` or
//! `mbr-bme280.humidity`.
//!
//! Adapters build their output with a [`Batch`], which applies the reading
//! filter policy in one place:
//!
//! - [`Batch::reading`] skips NaN and infinite values
//! - [`Batch::nonzero`] also skips an exact `0.0`, for quantities where
//!   zero means the provider had no data (quotes, humidity, pressure)
//! - [`Batch::raw`] skips empty pre-serialized values

use std::fmt;
use tracing::debug;

/// A named telemetry sample
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metric {
    /// Dot-namespaced feed name
    pub name: String,
    /// Serialized reading
    pub value: String,
}

impl Metric {
    /// Create a metric from an already serialized value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a metric from a numeric reading (six decimals)
    pub fn reading(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, format_reading(value))
    }

    /// Whether this metric can be published (non-empty name)
    pub fn is_publishable(&self) -> bool {
        !self.name.is_empty()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Render a reading the way the upstream feeds expect it
pub fn format_reading(value: f64) -> String {
    format!("{:.6}", value)
}

/// Ordered collection of metrics produced by one poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    metrics: Vec<Metric>,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numeric reading, skipping non-finite values
    pub fn reading(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        let name = name.into();
        if value.is_finite() {
            self.metrics.push(Metric::reading(name, value));
        } else {
            debug!(feed = %name, value, "Skipping non-finite reading");
        }
        self
    }

    /// Add a numeric reading, skipping non-finite values and exact zero
    pub fn nonzero(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        let name = name.into();
        if value == 0.0 {
            debug!(feed = %name, "Skipping zero-valued reading");
            return self;
        }
        self.reading(name, value)
    }

    /// Add a pre-serialized value, skipping empty strings
    pub fn raw(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if value.trim().is_empty() {
            debug!(feed = %name, "Skipping empty value");
        } else {
            self.metrics.push(Metric::new(name, value));
        }
        self
    }

    /// Number of metrics kept so far
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Consume the batch, yielding the metrics in insertion order
    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }
}

impl From<Batch> for Vec<Metric> {
    fn from(batch: Batch) -> Self {
        batch.into_metrics()
    }
}
