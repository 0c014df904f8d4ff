//! Run mode: supervise the executable until a shutdown trigger

use crate::Result;
use launch_core::service::{start_session, AdapterConfig, ServiceDispatcher, SystemdDispatcher};
use launch_core::shutdown::{Coordinator, CoordinatorConfig, OsSignals, ShutdownReport, ShutdownSignals};
use launch_core::supervisor::{launch, OutputSinks, UnixProcessAdapter};
use launch_core::LaunchConfig;
use schema::OsSignal;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Supervise `config` with the real OS signals and service manager
pub async fn run(config: &LaunchConfig) -> Result<ShutdownReport> {
    // Registered before the child starts so an early SIGTERM is not lost
    let mut os_signals = OsSignals::register()?;
    let dispatcher: Arc<dyn ServiceDispatcher> = Arc::new(SystemdDispatcher::from_env());

    supervise(config, dispatcher, async move { os_signals.recv().await }).await
}

/// Start the child and the service session, then coordinate shutdown
pub async fn supervise<F>(
    config: &LaunchConfig,
    dispatcher: Arc<dyn ServiceDispatcher>,
    os_signal: F,
) -> Result<ShutdownReport>
where
    F: Future<Output = OsSignal>,
{
    config.validate()?;

    let signals = ShutdownSignals::new();
    let session = start_session(
        dispatcher,
        config.app_name.clone(),
        signals.clone(),
        AdapterConfig::default(),
    );
    if session.is_none() {
        info!(app = %config.app_name, "No service manager detected, running interactively");
    }

    let sinks = OutputSinks::tracing(&config.app_name);
    let process = match launch(&UnixProcessAdapter::new(), config, sinks) {
        Ok(process) => process,
        Err(e) => {
            // Nothing to kill; let the service session report Stopped
            signals.quit_acknowledged.raise();
            if let Some(session) = session {
                session.join().await;
            }
            return Err(e.into());
        }
    };

    let coordinator_config = CoordinatorConfig {
        exit_with_child: config.exit_with_child,
        ..CoordinatorConfig::default()
    };
    let coordinator = Coordinator::new(
        config.app_name.clone(),
        process,
        signals,
        coordinator_config,
    )
    .with_service_session(session.is_some());

    let report = coordinator.run(os_signal).await;

    if let Some(session) = session {
        if report.adapter_stopped_in_time == Some(true) {
            session.join().await;
        } else {
            warn!(service = %session.name(), "Leaving service session behind");
        }
    }

    info!(
        app = %config.app_name,
        trigger = %report.trigger,
        outcome = ?report.outcome,
        "Supervision ended"
    );
    Ok(report)
}
