// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Shutdown broadcast
//!
//! [`ShutdownSignal`] is the write side owned by the orchestrator (and
//! cloned into whatever reacts to OS signals). [`ShutdownListener`] is the
//! read-only side handed to fetchers. Triggering is idempotent.

use tokio::sync::watch;

/// Broadcast "stop fetching" notification
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Trigger the shutdown
    ///
    /// Returns `true` for the call that actually flipped the signal and
    /// `false` for every later call.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        })
    }

    /// Whether the signal has been triggered
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create a read-only listener
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`ShutdownSignal`]
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Whether the signal has been triggered
    ///
    /// A listener whose signal was dropped reports `true`.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once the signal is triggered (or dropped)
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
