//! OS termination signals (SIGINT, SIGTERM)
//!
//! Handlers are registered up front so a signal delivered while the child is
//! still starting is queued rather than lost.

use crate::{CoreError, Result};
use schema::OsSignal;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

/// Registered listeners for the termination signals
#[derive(Debug)]
pub struct OsSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl OsSignals {
    /// Install the SIGINT and SIGTERM listeners
    pub fn register() -> Result<Self> {
        let interrupt = signal(SignalKind::interrupt()).map_err(|e| {
            CoreError::InitializationError(format!("install SIGINT handler: {}", e))
        })?;
        let terminate = signal(SignalKind::terminate()).map_err(|e| {
            CoreError::InitializationError(format!("install SIGTERM handler: {}", e))
        })?;
        debug!("Termination signal handlers installed");
        Ok(Self {
            interrupt,
            terminate,
        })
    }

    /// Wait for the next termination signal
    pub async fn recv(&mut self) -> OsSignal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => OsSignal::Interrupt,
            Some(()) = self.terminate.recv() => OsSignal::Terminate,
            else => std::future::pending().await,
        }
    }
}
