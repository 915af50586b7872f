// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Completion counter (wait-group)
//!
//! The orchestrator registers every participant of a shutdown phase with a
//! [`CompletionCounter`] and blocks in [`CompletionCounter::wait_idle`]
//! until all of them have released their [`CompletionToken`].
//!
//! A token releases its slot exactly once: either explicitly through
//! [`CompletionToken::complete`], which consumes it, or when it is dropped
//! without having been completed (for example when the owning task
//! panicked).

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Tracks how many registered participants have not finished yet
#[derive(Debug, Clone)]
pub struct CompletionCounter {
    pending: Arc<watch::Sender<usize>>,
}

impl CompletionCounter {
    /// Create a counter with no registered participants
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0usize);
        Self {
            pending: Arc::new(tx),
        }
    }

    /// Register one participant and hand out its token
    pub fn register(&self, label: impl Into<String>) -> CompletionToken {
        self.pending.send_modify(|n| *n += 1);
        CompletionToken {
            label: label.into(),
            pending: Some(Arc::clone(&self.pending)),
        }
    }

    /// Number of participants that have not released their token
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every registered participant has released its token
    pub async fn wait_idle(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for CompletionCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot registration handle returned by [`CompletionCounter::register`]
#[derive(Debug)]
#[must_use = "dropping a token releases its slot immediately"]
pub struct CompletionToken {
    label: String,
    pending: Option<Arc<watch::Sender<usize>>>,
}

impl CompletionToken {
    /// Label given at registration (source name or "dispatcher")
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Release the slot; the token cannot be used again
    pub fn complete(mut self) {
        self.release();
    }

    fn release(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.send_modify(|n| *n = n.saturating_sub(1));
                true
            }
            None => false,
        }
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if self.pending.is_some() {
            warn!(participant = %self.label, "Completion token dropped without completing");
            self.release();
        }
    }
}
