//! Running the adapter under a dispatcher in the background

use super::{AdapterConfig, ServiceAdapter, ServiceDispatcher, StopOutcome};
use crate::shutdown::ShutdownSignals;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A service adapter running in the background
///
/// "Adapter stopped" is raised when the dispatcher returns, whatever the
/// outcome, so the coordinator's handshake never waits on a dead session
/// longer than its bound.
#[derive(Debug)]
pub struct ServiceSession {
    name: String,
    task: JoinHandle<Option<StopOutcome>>,
}

impl ServiceSession {
    /// Service name this session runs as
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the session to end
    ///
    /// `None` when the dispatcher failed or the task panicked.
    pub async fn join(self) -> Option<StopOutcome> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(service = %self.name, error = %e, "Service session task failed");
                None
            }
        }
    }
}

/// Start the service adapter when running under a service manager
///
/// Returns `None`, and starts nothing, for an interactive launch.
pub fn start_session(
    dispatcher: Arc<dyn ServiceDispatcher>,
    name: impl Into<String>,
    signals: ShutdownSignals,
    config: AdapterConfig,
) -> Option<ServiceSession> {
    if !dispatcher.is_service() {
        return None;
    }

    let name = name.into();
    let task_name = name.clone();
    let task = tokio::spawn(async move {
        let name = task_name;
        let mut adapter = ServiceAdapter::new(name.clone(), signals.clone(), config);

        info!(service = %name, "Starting {} service", name);
        let outcome = match dispatcher.run(&name, &mut adapter).await {
            Ok(outcome) => {
                info!(service = %name, outcome = ?outcome, "{} service stopped", name);
                Some(outcome)
            }
            Err(e) => {
                warn!(service = %name, error = %e, "{} service failed", name);
                None
            }
        };

        info!(service = %name, "Service: send signal done");
        signals.adapter_stopped.raise();
        outcome
    });

    Some(ServiceSession { name, task })
}
