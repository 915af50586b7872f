// IoT Central - Pipeline integration tests
//
// End-to-end runs of the orchestrator with scripted sources and the
// in-memory sink. All tests run on a paused clock, so intervals are exact.
// The tests are organized into categories:
// 1. Startup and scheduling
// 2. Shutdown protocol
// 3. Failure handling

use async_trait::async_trait;
use iot_central::{
    Batch, FetcherConfig, MemorySink, Metric, Orchestrator, OrchestratorConfig, Sink, SinkError,
    Source, SourceError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{self, Instant};

/// Emits `{name}.batch=<n>` and `{name}.at=<ms since start>` on every poll
struct Counting {
    name: String,
    polls: Arc<AtomicU64>,
    started: Instant,
    slow_poll: Option<(u64, Duration)>,
}

impl Counting {
    fn new(name: &str) -> (Self, Arc<AtomicU64>) {
        let polls = Arc::new(AtomicU64::new(0));
        (
            Self {
                name: name.to_string(),
                polls: Arc::clone(&polls),
                started: Instant::now(),
                slow_poll: None,
            },
            polls,
        )
    }

    /// Make poll number `n` (1-based) take `delay`
    fn slow_on(mut self, n: u64, delay: Duration) -> Self {
        self.slow_poll = Some((n, delay));
        self
    }
}

#[async_trait]
impl Source for Counting {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((slow, delay)) = self.slow_poll {
            if slow == n {
                time::sleep(delay).await;
            }
        }
        Ok(vec![
            Metric::new(format!("{}.batch", self.name), n.to_string()),
            Metric::new(
                format!("{}.at", self.name),
                self.started.elapsed().as_millis().to_string(),
            ),
        ])
    }
}

/// Sink that records the instant of every publish
#[derive(Clone, Default)]
struct TimedSink {
    log: Arc<Mutex<Vec<(Metric, Instant)>>>,
}

#[async_trait]
impl Sink for TimedSink {
    async fn publish(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        self.log
            .lock()
            .unwrap()
            .push((Metric::new(name, value), Instant::now()));
        Ok(())
    }
}

fn trigger_after(orchestrator: &Orchestrator, after: Duration) {
    let signal = orchestrator.shutdown_signal();
    tokio::spawn(async move {
        time::sleep(after).await;
        signal.trigger();
    });
}

// ============================================================================
// Startup and scheduling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fast_and_slow_fetchers() {
    let (a, _) = Counting::new("a");
    let (b, _) = Counting::new("b");

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(a, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    orchestrator
        .add_source(b, FetcherConfig::every(Duration::from_secs(10)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(1500));

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    // A: startup + one tick. B: startup only.
    assert_eq!(sink.values_for("a.batch"), vec!["1", "2"]);
    assert_eq!(sink.values_for("b.batch"), vec!["1"]);
    assert_eq!(sink.values_for("a.at"), vec!["0", "1000"]);
    assert_eq!(sink.values_for("b.at"), vec!["0"]);

    assert_eq!(report.fetcher("a").map(|f| f.polls), Some(2));
    assert_eq!(report.fetcher("b").map(|f| f.polls), Some(1));
    assert_eq!(report.dispatcher.published, 6);
    assert_eq!(report.metrics_sent(), report.dispatcher.received());
    assert!(report.dispatcher.stopped_cleanly);
}

#[tokio::test(start_paused = true)]
async fn test_first_poll_is_immediate() {
    let (a, _) = Counting::new("a");

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(a, FetcherConfig::every(Duration::from_secs(600)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(1));

    let sink = TimedSink::default();
    let start = Instant::now();
    orchestrator.run(sink.clone()).await.unwrap();

    let log = sink.log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[0].1.duration_since(start) < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_per_source_order_preserved() {
    let mut orchestrator = Orchestrator::with_config(OrchestratorConfig::with_channel_capacity(1));
    for name in ["a", "b", "c"] {
        let (source, _) = Counting::new(name);
        orchestrator
            .add_source(source, FetcherConfig::every(Duration::from_secs(1)))
            .unwrap();
    }
    trigger_after(&orchestrator, Duration::from_millis(4500));

    let sink = MemorySink::new();
    orchestrator.run(sink.clone()).await.unwrap();

    for name in ["a", "b", "c"] {
        let batches: Vec<u64> = sink
            .values_for(&format!("{name}.batch"))
            .iter()
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(batches, vec![1, 2, 3, 4, 5], "source {name}");
    }
}

// ============================================================================
// Shutdown protocol
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_in_flight_poll_is_not_lost() {
    // Poll 2 starts at t=1s and takes 5s; shutdown arrives at t=1.5s.
    let (a, polls) = Counting::new("a");
    let a = a.slow_on(2, Duration::from_secs(5));

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(a, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(1500));

    let sink = MemorySink::new();
    let start = Instant::now();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(6));
    assert_eq!(polls.load(Ordering::SeqCst), 2);
    assert_eq!(sink.values_for("a.batch"), vec!["1", "2"]);
    assert_eq!(report.dispatcher.published, 4);
}

#[tokio::test(start_paused = true)]
async fn test_dispatcher_drains_backlog_after_fetchers_stop() {
    // A slow sink makes the channel back up; nothing queued may be lost.
    #[derive(Clone, Default)]
    struct SlowSink(MemorySink);

    #[async_trait]
    impl Sink for SlowSink {
        async fn publish(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
            time::sleep(Duration::from_millis(400)).await;
            self.0.publish(name, value).await
        }
    }

    let mut orchestrator = Orchestrator::with_config(OrchestratorConfig::with_channel_capacity(2));
    for name in ["a", "b"] {
        let (source, _) = Counting::new(name);
        orchestrator
            .add_source(source, FetcherConfig::every(Duration::from_secs(1)))
            .unwrap();
    }
    trigger_after(&orchestrator, Duration::from_millis(2500));

    let sink = SlowSink::default();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert_eq!(report.metrics_sent(), report.dispatcher.published);
    assert_eq!(
        sink.0.published().len() as u64,
        report.dispatcher.published
    );
    for fetcher in &report.fetchers {
        assert_eq!(fetcher.metrics_dropped, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_double_trigger_is_harmless() {
    let (a, _) = Counting::new("a");

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(a, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();

    let signal = orchestrator.shutdown_signal();
    let sink = MemorySink::new();
    let running = tokio::spawn(orchestrator.run(sink.clone()));

    time::sleep(Duration::from_millis(500)).await;
    assert!(signal.trigger());
    assert!(!signal.trigger());
    assert!(!signal.clone().trigger());

    let report = running.await.unwrap().unwrap();

    assert_eq!(report.fetchers.len(), 1);
    assert_eq!(sink.values_for("a.batch"), vec!["1"]);
    assert!(report.dispatcher.stopped_cleanly);
}

// ============================================================================
// Failure handling
// ============================================================================

/// Fails every other poll
struct Flaky {
    polls: u64,
}

#[async_trait]
impl Source for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
        self.polls += 1;
        if self.polls % 2 == 1 {
            return Err(SourceError::Transport("connection reset".to_string()));
        }
        let mut batch = Batch::new();
        batch.reading("flaky.value", self.polls as f64);
        Ok(batch.into_metrics())
    }
}

#[tokio::test(start_paused = true)]
async fn test_poll_errors_yield_no_metrics() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(Flaky { polls: 0 }, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(3500));

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    let flaky = report.fetcher("flaky").unwrap();
    assert_eq!(flaky.polls, 4);
    assert_eq!(flaky.poll_failures, 2);
    assert_eq!(
        sink.values_for("flaky.value"),
        vec!["2.000000", "4.000000"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_publish_errors_do_not_block_later_metrics() {
    let (a, _) = Counting::new("a");

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(a, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(2500));

    let sink = MemorySink::failing_on(["a.at"]);
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert_eq!(sink.values_for("a.batch"), vec!["1", "2", "3"]);
    assert_eq!(report.dispatcher.published, 3);
    assert_eq!(report.dispatcher.failed, 3);
    assert_eq!(sink.attempts(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_zero_humidity_filtered_by_adapter() {
    struct Room;

    #[async_trait]
    impl Source for Room {
        fn name(&self) -> &str {
            "x"
        }

        async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
            let mut batch = Batch::new();
            batch.raw("x.temp", "20.0").nonzero("x.humidity", 0.0);
            Ok(batch.into_metrics())
        }
    }

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(Room, FetcherConfig::every(Duration::from_secs(60)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(10));

    let sink = MemorySink::new();
    orchestrator.run(sink.clone()).await.unwrap();

    assert_eq!(sink.published(), vec![Metric::new("x.temp", "20.0")]);
}

#[tokio::test(start_paused = true)]
async fn test_setup_failure_isolated_to_one_fetcher() {
    struct NoBus;

    #[async_trait]
    impl Source for NoBus {
        fn name(&self) -> &str {
            "sensor"
        }

        async fn init(&mut self) -> Result<(), SourceError> {
            Err(SourceError::Setup("/dev/i2c-1 not found".to_string()))
        }

        async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
            Ok(vec![Metric::new("sensor.temp", "1")])
        }
    }

    let (a, _) = Counting::new("a");
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(NoBus, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    orchestrator
        .add_source(a, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(1500));

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert!(report.fetcher("sensor").unwrap().setup_failed);
    assert!(sink.values_for("sensor.temp").is_empty());
    assert_eq!(sink.values_for("a.batch"), vec!["1", "2"]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_fetcher_does_not_hang_shutdown() {
    struct Explodes;

    #[async_trait]
    impl Source for Explodes {
        fn name(&self) -> &str {
            "explodes"
        }

        async fn poll(&mut self) -> Result<Vec<Metric>, SourceError> {
            panic!("adapter bug");
        }
    }

    let (a, _) = Counting::new("a");
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .add_source(Explodes, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    orchestrator
        .add_source(a, FetcherConfig::every(Duration::from_secs(1)))
        .unwrap();
    trigger_after(&orchestrator, Duration::from_millis(500));

    let sink = MemorySink::new();
    let report = orchestrator.run(sink.clone()).await.unwrap();

    assert!(report.fetcher("explodes").unwrap().panicked);
    assert_eq!(sink.values_for("a.batch"), vec!["1"]);
    assert!(report.dispatcher.stopped_cleanly);
}
