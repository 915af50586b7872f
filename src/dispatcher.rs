// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Dispatcher (single consumer)
//!
//! Takes metrics off the shared channel in receipt order and publishes each
//! one to the [`Sink`]. A failed publish is logged and the metric dropped;
//! the loop never retries and never stops because of a sink error.
//!
//! The loop ends on [`Envelope::Stop`]. Since the stop marker is enqueued
//! only after every producer has stopped, everything queued before it has
//! already been published when the dispatcher exits.

use crate::channel::{Envelope, MetricReceiver};
use crate::sink::Sink;
use crate::stats::DispatcherReport;
use tracing::{debug, info, warn};

/// Forwards metrics from the channel to the telemetry sink
pub struct Dispatcher<K: Sink> {
    sink: K,
    rx: MetricReceiver,
    report: DispatcherReport,
}

impl<K: Sink> Dispatcher<K> {
    /// Create a dispatcher over the receive side of the metric channel
    pub fn new(sink: K, rx: MetricReceiver) -> Self {
        Self {
            sink,
            rx,
            report: DispatcherReport::default(),
        }
    }

    /// Run until the stop marker (or until every sender is gone)
    pub async fn run(mut self) -> DispatcherReport {
        info!("Dispatcher starting");

        loop {
            match self.rx.recv().await {
                Some(Envelope::Metric(metric)) => {
                    if !metric.is_publishable() {
                        warn!(value = %metric.value, "Refusing metric with empty name");
                        self.report.rejected += 1;
                        continue;
                    }
                    debug!(feed = %metric.name, value = %metric.value, "Publishing");
                    match self.sink.publish(&metric.name, &metric.value).await {
                        Ok(()) => self.report.published += 1,
                        Err(e) => {
                            warn!(feed = %metric.name, error = %e, "Publish failed, dropping metric");
                            self.report.failed += 1;
                        }
                    }
                }
                Some(Envelope::Stop(token)) => {
                    self.report.stopped_cleanly = true;
                    info!(
                        published = self.report.published,
                        failed = self.report.failed,
                        "Dispatcher stopped"
                    );
                    token.complete();
                    break;
                }
                None => {
                    warn!(
                        published = self.report.published,
                        "Metric channel closed without stop marker, dispatcher exiting"
                    );
                    break;
                }
            }
        }

        self.report
    }
}
