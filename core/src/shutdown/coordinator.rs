//! Shutdown coordinator
//!
//! Owns the supervised process for the whole run and merges the shutdown
//! triggers into a single graceful-shutdown sequence:
//!
//! ```text
//! Running ──(first of: OS signal | quit requested | child exit)──▶ ShuttingDown
//! ShuttingDown ──(kill, wait, service handshake)──▶ Terminated
//! ```
//!
//! Only the first trigger is acted upon. Every wait after that point is
//! bounded, so the coordinator always reaches `Terminated`.

use super::signal::ShutdownSignals;
use crate::supervisor::ManagedProcess;
use schema::{CoordinatorState, ExitOutcome, OsSignal, ShutdownTrigger};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Upper bound on waiting for the service adapter to finish after quit was acknowledged
pub const ADAPTER_STOP_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on waiting for the child to exit once it has been killed
pub const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long to wait for the service adapter's "fully stopped" notification
    pub adapter_stop_timeout: Duration,
    /// How long to wait for the child to exit after `terminate`
    pub exit_wait_timeout: Duration,
    /// Treat the child exiting on its own as a shutdown trigger
    pub exit_with_child: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            adapter_stop_timeout: ADAPTER_STOP_TIMEOUT,
            exit_wait_timeout: EXIT_WAIT_TIMEOUT,
            exit_with_child: false,
        }
    }
}

/// What happened during the shutdown sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The trigger that started the shutdown
    pub trigger: ShutdownTrigger,
    /// How the child ended, if that could be observed
    pub outcome: Option<ExitOutcome>,
    /// Whether `terminate` was attempted (false only when the child's own exit was the trigger)
    pub terminate_attempted: bool,
    /// `Some(true)` if the service adapter stopped in time, `Some(false)` on
    /// timeout, `None` when not running under a service manager
    pub adapter_stopped_in_time: Option<bool>,
    /// Time from trigger to `Terminated`
    pub elapsed: Duration,
}

/// Coordinates the single graceful shutdown of the supervised process
pub struct Coordinator {
    app: String,
    state: CoordinatorState,
    state_tx: watch::Sender<CoordinatorState>,
    process: Box<dyn ManagedProcess>,
    signals: ShutdownSignals,
    service_session: bool,
    config: CoordinatorConfig,
    /// The trigger that started the shutdown, once one has
    trigger: Option<ShutdownTrigger>,
    /// Set once the child's exit has been observed
    exited: Option<ExitOutcome>,
    /// Set when waiting on the child failed while still running
    wait_broken: bool,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("app", &self.app)
            .field("state", &self.state)
            .field("pid", &self.process.pid())
            .field("service_session", &self.service_session)
            .finish()
    }
}

impl Coordinator {
    /// Create a coordinator owning `process`
    pub fn new(
        app: impl Into<String>,
        process: Box<dyn ManagedProcess>,
        signals: ShutdownSignals,
        config: CoordinatorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(CoordinatorState::Running);
        Self {
            app: app.into(),
            state: CoordinatorState::Running,
            state_tx,
            process,
            signals,
            service_session: false,
            config,
            trigger: None,
            exited: None,
            wait_broken: false,
        }
    }

    /// Mark that a service session is active, enabling the completion handshake
    pub fn with_service_session(mut self, active: bool) -> Self {
        self.service_session = active;
        self
    }

    /// Current state
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state_tx.subscribe()
    }

    /// Supervise until a shutdown trigger arrives, then run the shutdown sequence.
    ///
    /// `os_signal` resolves when the OS asks the supervisor to terminate.
    pub async fn run<F>(mut self, os_signal: F) -> ShutdownReport
    where
        F: Future<Output = OsSignal>,
    {
        tokio::pin!(os_signal);
        debug!(app = %self.app, pid = self.process.pid(), "Waiting for shutdown trigger");

        let trigger = loop {
            let watch_child = self.exited.is_none() && !self.wait_broken;

            tokio::select! {
                signal = &mut os_signal => {
                    break ShutdownTrigger::OsSignal { signal };
                }
                _ = self.signals.quit_requested.wait() => {
                    break ShutdownTrigger::QuitRequested;
                }
                result = self.process.wait(), if watch_child => {
                    match result {
                        Ok(outcome) => {
                            self.exited = Some(outcome);
                            if self.config.exit_with_child {
                                break ShutdownTrigger::ChildExited { outcome };
                            }
                            warn!(
                                app = %self.app,
                                outcome = %outcome,
                                "Executable exited before shutdown was requested, waiting for a shutdown signal"
                            );
                        }
                        Err(e) => {
                            warn!(app = %self.app, error = %e, "Waiting on executable failed");
                            self.wait_broken = true;
                        }
                    }
                }
            }
        };

        self.shut_down(trigger).await
    }

    /// Move to `ShuttingDown` on the first trigger and return the trigger in
    /// effect. Later triggers are logged and dropped.
    fn begin_shutdown(&mut self, trigger: ShutdownTrigger) -> ShutdownTrigger {
        if let Some(accepted) = self.trigger {
            debug!(app = %self.app, %trigger, "Ignoring shutdown trigger, already {:?}", self.state);
            return accepted;
        }
        info!(app = %self.app, %trigger, "Shutdown Service...");
        self.trigger = Some(trigger);
        self.set_state(CoordinatorState::ShuttingDown);
        trigger
    }

    fn set_state(&mut self, state: CoordinatorState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    async fn shut_down(mut self, trigger: ShutdownTrigger) -> ShutdownReport {
        let started = Instant::now();
        let trigger = self.begin_shutdown(trigger);

        // The group is killed even when the leader is gone, so nothing it forked outlives us
        let (outcome, terminate_attempted) = match trigger {
            ShutdownTrigger::ChildExited { outcome } => {
                debug!(app = %self.app, "Executable exited on its own, nothing to kill");
                (Some(outcome), false)
            }
            _ => (self.kill_and_wait().await, true),
        };

        let adapter_stopped_in_time = if self.service_session {
            Some(self.service_handshake().await)
        } else {
            None
        };

        self.set_state(CoordinatorState::Terminated);
        let elapsed = started.elapsed();
        info!(
            app = %self.app,
            elapsed = %humantime::format_duration(round_to_millis(elapsed)),
            "Shutdown sequence complete"
        );

        ShutdownReport {
            trigger,
            outcome,
            terminate_attempted,
            adapter_stopped_in_time,
            elapsed,
        }
    }

    /// Kill the child and wait (bounded) for it to go away. Never fails.
    async fn kill_and_wait(&mut self) -> Option<ExitOutcome> {
        match self.process.terminate() {
            Ok(()) => info!(app = %self.app, "Shutdown executable success"),
            Err(e) => warn!(app = %self.app, error = %e, "Shutdown executable error"),
        }

        if let Some(outcome) = self.exited {
            debug!(app = %self.app, outcome = %outcome, "Executable had already exited");
            return Some(outcome);
        }
        if self.wait_broken {
            return None;
        }

        match tokio::time::timeout(self.config.exit_wait_timeout, self.process.wait()).await {
            Ok(Ok(outcome)) => {
                self.exited = Some(outcome);
                match outcome {
                    ExitOutcome::Success | ExitOutcome::Signaled { .. } => info!(
                        app = %self.app,
                        outcome = %outcome,
                        "Executable process finished"
                    ),
                    ExitOutcome::Failure { .. } => error!(
                        app = %self.app,
                        outcome = %outcome,
                        "Executable process finished with error"
                    ),
                }
                Some(outcome)
            }
            Ok(Err(e)) => {
                error!(app = %self.app, error = %e, "Executable process finished with error");
                None
            }
            Err(_) => {
                error!(
                    app = %self.app,
                    timeout = ?self.config.exit_wait_timeout,
                    "Executable did not exit after kill, giving up on it"
                );
                None
            }
        }
    }

    /// Tell the adapter the child is gone and wait (bounded) for it to finish
    async fn service_handshake(&self) -> bool {
        self.signals.quit_acknowledged.raise();
        debug!(app = %self.app, "Quit acknowledged, waiting for service adapter");

        let stopped = self
            .signals
            .adapter_stopped
            .wait_timeout(self.config.adapter_stop_timeout)
            .await;
        if stopped {
            debug!(app = %self.app, "Service adapter stopped");
        } else {
            warn!(
                app = %self.app,
                timeout = ?self.config.adapter_stop_timeout,
                "Service adapter did not stop in time, exiting anyway"
            );
        }
        stopped
    }
}

fn round_to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
