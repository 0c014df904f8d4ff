//! Process adapters for abstracting process management
//!
//! The shutdown coordinator only talks to a [`ManagedProcess`]; how the
//! process was created is the business of a [`ProcessAdapter`]. This keeps the
//! coordinator testable against [`MockProcessAdapter`] without spawning real
//! executables.

use super::output::{spawn_drain, OutputSinks, OutputStream};
use crate::config::LaunchConfig;
use crate::Result;
use async_trait::async_trait;
use schema::ExitOutcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to wait for the output drains after the child has exited.
///
/// A grandchild that inherited the pipes can keep them open indefinitely.
pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for starting the supervised executable
pub trait ProcessAdapter: Send + Sync {
    /// Start the executable described by `config`, streaming its output into `sinks`
    fn start(&self, config: &LaunchConfig, sinks: OutputSinks) -> Result<Box<dyn ManagedProcess>>;
}

/// Trait representing the running supervised process
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> u32;

    /// Forcefully kill the process; returns without waiting for it to exit
    fn terminate(&mut self) -> Result<()>;

    /// Wait for the process to exit.
    ///
    /// Must be cancel safe: the coordinator races it against shutdown triggers
    /// and calls it again afterwards.
    async fn wait(&mut self) -> Result<ExitOutcome>;
}

/// Unix process adapter using process-group spawning
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct UnixProcessAdapter;

#[cfg(unix)]
impl UnixProcessAdapter {
    /// Create a new Unix process adapter
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl ProcessAdapter for UnixProcessAdapter {
    fn start(&self, config: &LaunchConfig, sinks: OutputSinks) -> Result<Box<dyn ManagedProcess>> {
        use crate::process::unix;

        let args: Vec<&str> = config.args.iter().map(String::as_str).collect();
        let mut child = unix::spawn(&config.executable, &args, &config.working_dir)?;

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.take_stdout() {
            drains.push(spawn_drain(stdout, OutputStream::Stdout, sinks.stdout));
        }
        if let Some(stderr) = child.take_stderr() {
            drains.push(spawn_drain(stderr, OutputStream::Stderr, sinks.stderr));
        }

        Ok(Box::new(UnixManagedProcess { child, drains }))
    }
}

/// Unix managed process implementation
#[cfg(unix)]
struct UnixManagedProcess {
    child: crate::process::unix::ChildProcess,
    drains: Vec<JoinHandle<()>>,
}

#[cfg(unix)]
impl UnixManagedProcess {
    /// Let the drain tasks flush the tail of the output, bounded
    async fn join_output(&mut self) {
        let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_TIMEOUT;
        while let Some(mut drain) = self.drains.pop() {
            if tokio::time::timeout_at(deadline, &mut drain).await.is_err() {
                warn!(
                    "Output of process {} still open {:?} after exit, detaching reader",
                    self.child.pid(),
                    OUTPUT_DRAIN_TIMEOUT
                );
                drain.abort();
            }
        }
    }
}

#[cfg(unix)]
#[async_trait]
impl ManagedProcess for UnixManagedProcess {
    fn pid(&self) -> u32 {
        self.child.pid()
    }

    fn terminate(&mut self) -> Result<()> {
        crate::process::unix::signal_kill_group(&self.child)
    }

    async fn wait(&mut self) -> Result<ExitOutcome> {
        use std::os::unix::process::ExitStatusExt;

        let status = self.child.wait().await?;
        self.join_output().await;

        let outcome = ExitOutcome::from_parts(status.code(), status.signal());
        debug!("Process {} {}", self.child.pid(), outcome);
        Ok(outcome)
    }
}

/// Mock process adapter for testing
#[derive(Debug, Clone, Default)]
pub struct MockProcessAdapter {
    instruction: MockInstruction,
    started: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<MockProcessProbe>>>,
}

/// Instructions for mock process behavior
#[derive(Debug, Clone, Copy)]
pub struct MockInstruction {
    /// Exit on its own after this long (None means run until killed)
    pub exit_after: Option<Duration>,
    /// Outcome when exiting on its own
    pub natural_outcome: ExitOutcome,
    /// Whether `terminate` reports an error instead of killing
    pub terminate_fails: bool,
    /// Whether `wait` reports an error once the process is gone
    pub wait_fails: bool,
    /// Whether `start` fails as if the executable were missing
    pub fail_to_start: bool,
}

impl Default for MockInstruction {
    fn default() -> Self {
        Self {
            exit_after: None,
            natural_outcome: ExitOutcome::Success,
            terminate_fails: false,
            wait_fails: false,
            fail_to_start: false,
        }
    }
}

/// Observation handle onto a mock process, shared with the test
#[derive(Debug, Clone, Default)]
pub struct MockProcessProbe {
    terminate_calls: Arc<AtomicUsize>,
    exits_observed: Arc<AtomicUsize>,
}

impl MockProcessProbe {
    /// How many times `terminate` was called
    pub fn terminate_calls(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }

    /// How many times a live → exited transition was observed
    pub fn exits_observed(&self) -> usize {
        self.exits_observed.load(Ordering::SeqCst)
    }
}

impl MockProcessAdapter {
    /// Create a mock adapter whose processes run until killed
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock adapter with the given behaviour
    pub fn with_instruction(instruction: MockInstruction) -> Self {
        Self {
            instruction,
            ..Self::default()
        }
    }

    /// Number of processes started
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Probe of the most recently started process
    pub fn last_probe(&self) -> Option<MockProcessProbe> {
        self.last.lock().ok().and_then(|p| p.clone())
    }

    /// Build a standalone mock process, bypassing `start`
    pub fn process(&self) -> (Box<dyn ManagedProcess>, MockProcessProbe) {
        let probe = MockProcessProbe::default();
        let (exit_tx, exit_rx) = watch::channel(None);
        let process = MockProcess {
            pid: 4242 + self.started.fetch_add(1, Ordering::SeqCst) as u32,
            instruction: self.instruction,
            exit_tx,
            exit_rx,
            deadline: self
                .instruction
                .exit_after
                .map(|d| tokio::time::Instant::now() + d),
            probe: probe.clone(),
        };
        if let Ok(mut last) = self.last.lock() {
            *last = Some(probe.clone());
        }
        (Box::new(process), probe)
    }
}

impl ProcessAdapter for MockProcessAdapter {
    fn start(&self, config: &LaunchConfig, _sinks: OutputSinks) -> Result<Box<dyn ManagedProcess>> {
        if self.instruction.fail_to_start {
            return Err(crate::CoreError::ProcessSpawn(format!(
                "starting executable '{}' failed: No such file or directory",
                config.executable.display()
            )));
        }
        Ok(self.process().0)
    }
}

struct MockProcess {
    pid: u32,
    instruction: MockInstruction,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
    deadline: Option<tokio::time::Instant>,
    probe: MockProcessProbe,
}

impl MockProcess {
    fn exit(&self, outcome: ExitOutcome) {
        let first = self.exit_tx.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(outcome);
                true
            } else {
                false
            }
        });
        if first {
            self.probe.exits_observed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ManagedProcess for MockProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> Result<()> {
        self.probe.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if self.instruction.terminate_fails {
            return Err(crate::CoreError::ProcessSignal(format!(
                "Failed to send SIGKILL to process group {}: EINVAL",
                self.pid
            )));
        }
        self.exit(ExitOutcome::Signaled { signal: 9 });
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitOutcome> {
        loop {
            if let Some(outcome) = *self.exit_rx.borrow() {
                if self.instruction.wait_fails {
                    return Err(crate::CoreError::ProcessWait(format!(
                        "Failed to wait for process {}: ECHILD",
                        self.pid
                    )));
                }
                return Ok(outcome);
            }

            match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = self.exit_rx.changed() => {}
                        _ = tokio::time::sleep_until(deadline) => {
                            self.exit(self.instruction.natural_outcome);
                        }
                    }
                }
                None => {
                    let _ = self.exit_rx.changed().await;
                }
            }
        }
    }
}
