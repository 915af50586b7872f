// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Shared metric channel
//!
//! A bounded FIFO between the fetchers (many producers) and the dispatcher
//! (single consumer). Ordering is preserved per producer; items from
//! different producers interleave arbitrarily.
//!
//! Fetchers only ever see a [`MetricSender`], which can enqueue metrics but
//! not the stop marker. The stop marker is [`Envelope::Stop`], enqueued
//! once by the orchestrator after every fetcher has stopped.

use crate::completion::CompletionToken;
use crate::metric::Metric;
use tokio::sync::mpsc;

/// Item travelling on the metric channel
#[derive(Debug)]
pub enum Envelope {
    /// A metric to publish
    Metric(Metric),
    /// No more metrics will follow; carries the dispatcher's phase-2 token
    Stop(CompletionToken),
}

/// Error returned when the consumer side is gone
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Metric channel closed, dropped {0}")]
pub struct ChannelClosed(pub Metric);

/// Create a bounded metric channel
///
/// `capacity` must be at least 1 (tokio panics on zero; the orchestrator
/// validates it first).
pub fn channel(capacity: usize) -> (MetricSender, MetricReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (MetricSender { tx }, MetricReceiver { rx })
}

/// Send-only handle for producers
#[derive(Debug, Clone)]
pub struct MetricSender {
    tx: mpsc::Sender<Envelope>,
}

impl MetricSender {
    /// Enqueue a metric, waiting while the channel is full
    pub async fn send(&self, metric: Metric) -> Result<(), ChannelClosed> {
        match self.tx.reserve().await {
            Ok(permit) => {
                permit.send(Envelope::Metric(metric));
                Ok(())
            }
            Err(_) => Err(ChannelClosed(metric)),
        }
    }

    /// Enqueue the stop marker
    ///
    /// If the consumer is gone the token comes back inside the error and is
    /// released when dropped, so the caller never waits on a dead consumer.
    pub(crate) async fn send_stop(&self, token: CompletionToken) -> bool {
        self.tx.send(Envelope::Stop(token)).await.is_ok()
    }

    /// Whether the consumer side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receive-only handle for the single consumer
#[derive(Debug)]
pub struct MetricReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl MetricReceiver {
    /// Receive the next item; `None` once every sender is gone and the
    /// queue is drained
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Take the next item if one is queued right now
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}
