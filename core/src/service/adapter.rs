//! The lifecycle callback: status reporting and control-request handling

use super::{ControlRequest, ServiceHandler, StatusSink};
use crate::shutdown::ShutdownSignals;
use async_trait::async_trait;
use schema::{AcceptedCommands, ControlCommand, ServiceState, ServiceStatus};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Pause between reporting `StartPending` and `Running`
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on waiting for the coordinator to acknowledge quit
pub const QUIT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing knobs for the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Delay between `StartPending` and `Running`
    pub settle_delay: Duration,
    /// How long to wait for "quit acknowledged" before giving up
    pub quit_ack_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            quit_ack_timeout: QUIT_ACK_TIMEOUT,
        }
    }
}

/// How the adapter's control loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The coordinator acknowledged quit and `Stopped` was reported
    Acknowledged,
    /// No acknowledgement within the bound; `Stopped` was not reported
    TimedOut,
}

/// Implements the service manager's lifecycle contract for the supervisor
#[derive(Debug)]
pub struct ServiceAdapter {
    name: String,
    signals: ShutdownSignals,
    config: AdapterConfig,
    state: Option<ServiceState>,
}

impl ServiceAdapter {
    /// Create an adapter for service `name`
    pub fn new(name: impl Into<String>, signals: ShutdownSignals, config: AdapterConfig) -> Self {
        Self {
            name: name.into(),
            signals,
            config,
            state: None,
        }
    }

    /// Last state reported, if any
    pub fn state(&self) -> Option<ServiceState> {
        self.state
    }

    fn report(&mut self, sink: &dyn StatusSink, status: ServiceStatus) {
        debug!(service = %self.name, state = %status.state, "Reporting service status");
        if let Err(e) = sink.report(status) {
            warn!(service = %self.name, state = %status.state, error = %e, "Reporting service status failed");
        }
        self.state = Some(status.state);
    }

    /// Serve requests until Stop/Shutdown, the end of the stream, or a
    /// shutdown that already happened through another path
    async fn serve(&mut self, requests: &mut mpsc::Receiver<ControlRequest>, sink: &dyn StatusSink) {
        let running = ServiceStatus::accepting(ServiceState::Running, AcceptedCommands::STANDARD);
        let paused = ServiceStatus::accepting(ServiceState::Paused, AcceptedCommands::STANDARD);

        loop {
            let request = tokio::select! {
                request = requests.recv() => request,
                _ = self.signals.quit_acknowledged.wait() => {
                    info!(service = %self.name, "Supervisor already shut down, leaving control loop");
                    return;
                }
            };

            let Some(request) = request else {
                info!(service = %self.name, "Control request stream closed, stopping");
                return;
            };

            match request.command {
                ControlCommand::Interrogate => self.report(sink, request.current_status),
                ControlCommand::Stop | ControlCommand::Shutdown => {
                    info!(service = %self.name, command = %request.command, "Service stop requested");
                    return;
                }
                ControlCommand::Pause => self.report(sink, paused),
                ControlCommand::Continue => self.report(sink, running),
                ControlCommand::Other(code) => {
                    error!(service = %self.name, "Service: unexpected control request #{}", code);
                }
            }
        }
    }
}

#[async_trait]
impl ServiceHandler for ServiceAdapter {
    async fn execute(
        &mut self,
        mut requests: mpsc::Receiver<ControlRequest>,
        status: &dyn StatusSink,
    ) -> StopOutcome {
        self.report(status, ServiceStatus::new(ServiceState::StartPending));
        tokio::time::sleep(self.config.settle_delay).await;
        self.report(
            status,
            ServiceStatus::accepting(ServiceState::Running, AcceptedCommands::STANDARD),
        );

        self.serve(&mut requests, status).await;

        self.report(status, ServiceStatus::new(ServiceState::StopPending));
        info!(service = %self.name, "Service: send signal quit");
        self.signals.request_quit();
        info!(service = %self.name, "Service: sent signal quit, wait quited");

        if self
            .signals
            .quit_acknowledged
            .wait_timeout(self.config.quit_ack_timeout)
            .await
        {
            self.report(status, ServiceStatus::new(ServiceState::Stopped));
            info!(service = %self.name, "Service: received signal quited");
            StopOutcome::Acknowledged
        } else {
            warn!(
                service = %self.name,
                timeout = ?self.config.quit_ack_timeout,
                "Service: wait quited timeout, quitting itself"
            );
            StopOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<ServiceStatus>>,
    }

    impl RecordingSink {
        fn states(&self) -> Vec<ServiceState> {
            self.reports.lock().unwrap().iter().map(|s| s.state).collect()
        }
    }

    impl StatusSink for RecordingSink {
        fn report(&self, status: ServiceStatus) -> Result<()> {
            self.reports.lock().unwrap().push(status);
            Ok(())
        }
    }

    fn request(command: ControlCommand) -> ControlRequest {
        ControlRequest {
            command,
            current_status: ServiceStatus::accepting(
                ServiceState::Running,
                AcceptedCommands::STANDARD,
            ),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_lifecycle() {
        let signals = ShutdownSignals::new();
        let mut adapter = ServiceAdapter::new("svc", signals.clone(), AdapterConfig::default());
        let sink = RecordingSink::default();
        let (tx, rx) = mpsc::channel(8);

        // Stand-in coordinator acknowledging quit
        let coordinator = signals.clone();
        tokio::spawn(async move {
            coordinator.quit_requested.wait().await;
            coordinator.quit_acknowledged.raise();
        });

        tx.send(request(ControlCommand::Interrogate)).await.unwrap();
        tx.send(request(ControlCommand::Pause)).await.unwrap();
        tx.send(request(ControlCommand::Continue)).await.unwrap();
        tx.send(request(ControlCommand::Stop)).await.unwrap();

        let outcome = adapter.execute(rx, &sink).await;

        assert_eq!(outcome, StopOutcome::Acknowledged);
        assert_eq!(
            sink.states(),
            vec![
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::Running, // interrogate echo
                ServiceState::Paused,
                ServiceState::Running,
                ServiceState::StopPending,
                ServiceState::Stopped,
            ]
        );
        assert!(signals.quit_requested.is_raised());
        assert_eq!(adapter.state(), Some(ServiceState::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_accepts_standard_commands() {
        let signals = ShutdownSignals::new();
        signals.quit_acknowledged.raise();
        let mut adapter = ServiceAdapter::new("svc", signals, AdapterConfig::default());
        let sink = RecordingSink::default();
        let (_tx, rx) = mpsc::channel(1);

        adapter.execute(rx, &sink).await;

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports[0].accepts, AcceptedCommands::NONE);
        assert_eq!(reports[1].state, ServiceState::Running);
        assert_eq!(reports[1].accepts, AcceptedCommands::STANDARD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_command_is_ignored() {
        let signals = ShutdownSignals::new();
        let mut adapter = ServiceAdapter::new("svc", signals.clone(), AdapterConfig::default());
        let sink = RecordingSink::default();
        let (tx, rx) = mpsc::channel(8);

        let coordinator = signals.clone();
        tokio::spawn(async move {
            coordinator.quit_requested.wait().await;
            coordinator.quit_acknowledged.raise();
        });

        tx.send(request(ControlCommand::Other(128))).await.unwrap();
        tx.send(request(ControlCommand::Pause)).await.unwrap();
        tx.send(request(ControlCommand::Shutdown)).await.unwrap();

        adapter.execute(rx, &sink).await;
        assert_eq!(
            sink.states(),
            vec![
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::Paused,
                ServiceState::StopPending,
                ServiceState::Stopped,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_ack_timeout_skips_stopped() {
        let signals = ShutdownSignals::new();
        let mut adapter = ServiceAdapter::new("svc", signals.clone(), AdapterConfig::default());
        let sink = RecordingSink::default();
        let (tx, rx) = mpsc::channel(1);
        tx.send(request(ControlCommand::Stop)).await.unwrap();

        let started = Instant::now();
        let outcome = adapter.execute(rx, &sink).await;

        assert_eq!(outcome, StopOutcome::TimedOut);
        assert!(started.elapsed() >= QUIT_ACK_TIMEOUT);
        assert!(started.elapsed() < QUIT_ACK_TIMEOUT + Duration::from_secs(1));
        assert_eq!(*sink.states().last().unwrap(), ServiceState::StopPending);
        assert!(signals.quit_requested.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_stops() {
        let signals = ShutdownSignals::new();
        let mut adapter = ServiceAdapter::new("svc", signals.clone(), AdapterConfig::default());
        let sink = RecordingSink::default();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);

        let coordinator = signals.clone();
        tokio::spawn(async move {
            coordinator.quit_requested.wait().await;
            coordinator.quit_acknowledged.raise();
        });

        assert_eq!(adapter.execute(rx, &sink).await, StopOutcome::Acknowledged);
    }
}
