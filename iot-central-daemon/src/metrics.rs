// IoT Central Daemon - Collection daemon and self-metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus self-metrics.
//!
//! The pipeline itself knows nothing about Prometheus. Every source and the
//! sink are wrapped in decorators that count what passes through them.

use async_trait::async_trait;
use iot_central::{Metric, Sink, SinkError, Source, SourceError};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Counters exposed on `/metrics`
pub struct SelfMetrics {
    registry: Registry,

    /// Polls started, labeled by source.
    pub polls: IntCounterVec,

    /// Polls that returned an error, labeled by source.
    pub poll_failures: IntCounterVec,

    /// Metrics returned by successful polls, labeled by source.
    pub metrics_collected: IntCounterVec,

    /// Metrics accepted by the sink.
    pub published: IntCounter,

    /// Metrics the sink refused or could not reach.
    pub publish_failures: IntCounter,

    /// Sources enabled at startup.
    pub sources: IntGauge,

    build_info: IntGaugeVec,
}

impl SelfMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let polls = IntCounterVec::new(
            Opts::new("iot_central_polls_total", "Polls started per source"),
            &["source"],
        )?;
        let poll_failures = IntCounterVec::new(
            Opts::new("iot_central_poll_failures_total", "Failed polls per source"),
            &["source"],
        )?;
        let metrics_collected = IntCounterVec::new(
            Opts::new(
                "iot_central_metrics_collected_total",
                "Metrics produced by successful polls per source",
            ),
            &["source"],
        )?;
        let published = IntCounter::new(
            "iot_central_published_total",
            "Metrics accepted by the telemetry sink",
        )?;
        let publish_failures = IntCounter::new(
            "iot_central_publish_failures_total",
            "Metrics the telemetry sink rejected or could not reach",
        )?;
        let sources = IntGauge::new("iot_central_sources", "Sources enabled at startup")?;
        let build_info = IntGaugeVec::new(
            Opts::new("iot_central_build_info", "Build information"),
            &["version"],
        )?;

        registry.register(Box::new(polls.clone()))?;
        registry.register(Box::new(poll_failures.clone()))?;
        registry.register(Box::new(metrics_collected.clone()))?;
        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(publish_failures.clone()))?;
        registry.register(Box::new(sources.clone()))?;
        registry.register(Box::new(build_info.clone()))?;

        build_info
            .with_label_values(&[iot_central::VERSION])
            .set(1);

        Ok(Self {
            registry,
            polls,
            poll_failures,
            metrics_collected,
            published,
            publish_failures,
            sources,
            build_info,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for SelfMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfMetrics")
            .field("published", &self.published.get())
            .field("publish_failures", &self.publish_failures.get())
            .field("sources", &self.sources.get())
            .field("build_info", &self.build_info.with_label_values(&[iot_central::VERSION]).get())
            .finish_non_exhaustive()
    }
}

/// Source decorator counting polls and their outcome
pub struct InstrumentedSource<S> {
    inner: S,
    metrics: Arc<SelfMetrics>,
}

impl<S: Source> InstrumentedSource<S> {
    pub fn new(inner: S, metrics: Arc<SelfMetrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<S: Source> Source for InstrumentedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn init(&mut self) -> Result<(), SourceError> {
        self.inner.init().await
    }

    async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
        let name = self.inner.name().to_string();
        self.metrics.polls.with_label_values(&[name.as_str()]).inc();

        let result = self.inner.poll().await;
        match &result {
            Ok(metrics) => self
                .metrics
                .metrics_collected
                .with_label_values(&[name.as_str()])
                .inc_by(metrics.len() as u64),
            Err(_) => self.metrics.poll_failures.with_label_values(&[name.as_str()]).inc(),
        }
        result
    }
}

/// Sink decorator counting publish outcomes
pub struct InstrumentedSink<K> {
    inner: K,
    metrics: Arc<SelfMetrics>,
}

impl<K: Sink> InstrumentedSink<K> {
    pub fn new(inner: K, metrics: Arc<SelfMetrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<K: Sink> Sink for InstrumentedSink<K> {
    async fn publish(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        let result = self.inner.publish(name, value).await;
        match result {
            Ok(()) => self.metrics.published.inc(),
            Err(_) => self.metrics.publish_failures.inc(),
        }
        result
    }
}
