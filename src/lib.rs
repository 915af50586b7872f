//! # IoT Central - Telemetry collection pipeline
//!
//! Periodically polls independent data sources (environmental sensors,
//! weather, financial quotes), turns every sample into a named metric and
//! forwards everything to a single telemetry sink.
//!
//! ## Key Features
//!
//! - **Fan-in**: N independent fetchers publish into one bounded channel
//! - **Single sender**: one dispatcher owns the downstream connection
//! - **Backpressure**: fetchers wait on a full channel instead of dropping
//! - **Two-phase shutdown**: all producers stop before the consumer is told to
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use iot_central::{
//!     Batch, FetcherConfig, MemorySink, Metric, Orchestrator, Source, SourceError,
//! };
//! use std::time::Duration;
//!
//! struct Thermometer;
//!
//! #[async_trait]
//! impl Source for Thermometer {
//!     fn name(&self) -> &str {
//!         "thermometer"
//!     }
//!
//!     async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
//!         let mut batch = Batch::new();
//!         batch.reading("office.temp", 21.5);
//!         Ok(batch.into_metrics())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> iot_central::Result<()> {
//! let mut orchestrator = Orchestrator::new();
//! orchestrator.add_source(Thermometer, FetcherConfig::every(Duration::from_secs(60)))?;
//!
//! // Normally triggered from a Ctrl+C handler.
//! orchestrator.shutdown_signal().trigger();
//!
//! let sink = MemorySink::new();
//! let report = orchestrator.run(sink.clone()).await?;
//! assert_eq!(sink.values_for("office.temp"), vec!["21.500000"]);
//! assert_eq!(report.dispatcher.published, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌─────────┐   ┌─────────┐
//! │ Fetcher │   │ Fetcher │   │ Fetcher │   one per Source
//! │ sensor  │   │ weather │   │ finance │
//! └────┬────┘   └────┬────┘   └────┬────┘
//!      └─────────────┼─────────────┘
//!                    ▼
//!            ┌───────────────┐
//!            │ metric channel│   bounded FIFO
//!            └───────┬───────┘
//!                    ▼
//!            ┌───────────────┐
//!            │  Dispatcher   │ ──▶ Sink (Adafruit IO, ...)
//!            └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`metric`]: Metric and the adapter-side [`Batch`] filter
//! - [`source`] / [`sink`]: the two external seams
//! - [`fetcher`]: periodic producer state machine
//! - [`dispatcher`]: single consumer
//! - [`orchestrator`]: wiring and two-phase shutdown
//! - [`channel`], [`shutdown`], [`completion`]: coordination primitives
//! - [`conversion`]: unit conversions
//! - [`stats`]: per-run reports

// Modules
pub mod channel;
pub mod completion;
pub mod conversion;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod metric;
pub mod orchestrator;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod stats;

// Re-exports for convenient access
pub use channel::{channel, ChannelClosed, Envelope, MetricReceiver, MetricSender};
pub use completion::{CompletionCounter, CompletionToken};
pub use dispatcher::Dispatcher;
pub use error::{CentralError, ConfigError, Result, SinkError, SourceError};
pub use fetcher::{Fetcher, FetcherConfig, FetcherState};
pub use metric::{format_reading, Batch, Metric};
pub use orchestrator::{Orchestrator, OrchestratorConfig, DEFAULT_CHANNEL_CAPACITY};
pub use shutdown::{ShutdownListener, ShutdownSignal};
pub use sink::{LogSink, MemorySink, Sink};
pub use source::Source;
pub use stats::{DispatcherReport, FetcherReport, ShutdownReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
