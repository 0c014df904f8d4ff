//! One-shot, close-once notifications between the coordinator and the service adapter

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A one-shot notification with "close once" semantics.
///
/// Any number of producers may raise it; only the first call changes
/// anything. Waiting after it was raised completes immediately, so a late
/// consumer never misses it and a second producer never blocks.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Create a signal that has not been raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` only for the call that raised it first.
    pub fn raise(&self) -> bool {
        if self.raised.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Whether the signal has been raised
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Wait until the signal is raised
    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    /// Wait at most `timeout`; returns whether the signal was raised in time
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

/// The three notifications exchanged during one run
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignals {
    /// Raised by OS-signal delivery or the service adapter; consumed by the coordinator
    pub quit_requested: ShutdownSignal,
    /// Raised by the coordinator once the child is gone; consumed by the adapter
    pub quit_acknowledged: ShutdownSignal,
    /// Raised when the service session has fully returned; consumed by the coordinator
    pub adapter_stopped: ShutdownSignal,
}

impl ShutdownSignals {
    /// Fresh, unraised signals
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the coordinator to shut down
    pub fn request_quit(&self) -> bool {
        self.quit_requested.raise()
    }
}
