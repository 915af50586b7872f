// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Source adapter contract
//!
//! A [`Source`] wraps one external data provider behind a uniform `poll()`.
//! The core never looks inside: it calls `init()` once, then `poll()` on a
//! schedule, and forwards whatever metrics come back.
//!
//! # Error handling
//!
//! - An error from `init()` is a setup failure. The fetcher logs it and
//!   stops; other fetchers keep running.
//! - An error from `poll()` is transient. That tick contributes no metrics
//!   and the fetcher waits for the next tick.
//! - Readings that are clearly invalid (a zero quote, a NaN) should be
//!   filtered by the adapter, usually through [`Batch`](crate::Batch).

use crate::error::SourceError;
use crate::metric::Metric;
use async_trait::async_trait;

/// Periodically polled data provider
#[async_trait]
pub trait Source: Send + 'static {
    /// Identifier used in logs and reports
    fn name(&self) -> &str;

    /// One-time setup before the first poll (open a bus, check a device)
    async fn init(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Fetch the current readings
    ///
    /// Should complete well within the fetch interval; this is not enforced
    /// unless the fetcher is configured with a poll timeout.
    async fn poll(&mut self) -> Result<Vec<Metric>, SourceError>;
}

#[async_trait]
impl<S: Source + ?Sized> Source for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn init(&mut self) -> Result<(), SourceError> {
        (**self).init().await
    }

    async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
        (**self).poll().await
    }
}
