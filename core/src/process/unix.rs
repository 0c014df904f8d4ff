//! Unix process management with safe spawn/kill using process groups
//!
//! The supervised executable is spawned as the leader of a new session (via
//! `setsid()`), so a kill aimed at its process group also reaches anything it
//! forked. Its stdout and stderr are piped back for draining; stdin is closed.
//!
//! ## Process Groups
//!
//! When a process calls `setsid()`, it:
//! - Creates a new session and becomes the session leader
//! - Creates a new process group and becomes the process group leader
//! - Has no controlling terminal, so a terminal Ctrl+C reaches only the
//!   supervisor, which then decides how to stop the child

// Allow unsafe code for this module since process management requires libc::setsid() calls
#![allow(unsafe_code)]

use crate::{CoreError, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
#[allow(unused_imports)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error};

/// A child process managed with Unix process groups
#[derive(Debug)]
pub struct ChildProcess {
    /// The process ID of the spawned process
    pid: Pid,
    /// The underlying Child handle for waiting and status checking
    child: Child,
}

impl ChildProcess {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Get the process group ID (same as PID for session leaders)
    pub fn pgid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Wait for the process to exit and return its exit status (async)
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ProcessWait(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }

    /// Take the stdout handle for async reading, if available
    pub fn take_stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr handle for async reading, if available
    pub fn take_stderr(&mut self) -> Option<tokio::process::ChildStderr> {
        self.child.stderr.take()
    }
}

/// Spawn `executable` in `working_dir` as the leader of a new process group
///
/// The working directory is checked up front so a bad `-workdir` is reported
/// as such instead of as a generic "No such file or directory" from `exec`.
///
/// ## Example
///
/// ```rust,no_run
/// use launch_core::process::unix::spawn;
///
/// # async fn demo() -> launch_core::Result<()> {
/// let child = spawn("/bin/sleep".as_ref(), &["30"], "/tmp".as_ref())?;
/// println!("Spawned process with PID: {}", child.pid());
/// # Ok(())
/// # }
/// ```
pub fn spawn(executable: &Path, args: &[&str], working_dir: &Path) -> Result<ChildProcess> {
    debug!(
        "Spawning process: {} {:?} in {}",
        executable.display(),
        args,
        working_dir.display()
    );

    if !working_dir.is_dir() {
        return Err(CoreError::ProcessSpawn(format!(
            "working directory '{}' does not exist or is not a directory",
            working_dir.display()
        )));
    }

    let mut command = Command::new(executable);
    command.args(args);
    command.current_dir(working_dir);
    command.stdin(Stdio::null());
    // Pipe stdout/stderr so we can capture logs asynchronously
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    // Safety: setsid() is async-signal-safe and appropriate for use in pre_exec
    #[deny(unsafe_op_in_unsafe_fn)]
    unsafe {
        command.pre_exec(|| {
            // Create a new session and process group
            let result = libc::setsid();
            if result == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", executable.display(), e);
        CoreError::ProcessSpawn(format!(
            "starting executable '{}' failed: {}",
            executable.display(),
            e
        ))
    })?;

    // tokio::process::Child::id() may return Option on some platforms
    let raw_pid = child
        .id()
        .ok_or_else(|| CoreError::ProcessSpawn("Spawned child did not have a PID".to_string()))?;
    let pid = Pid::from_raw(raw_pid as i32);
    debug!("Successfully spawned process {} in new process group", pid);

    Ok(ChildProcess { pid, child })
}

/// Send SIGKILL to the process group for forceful termination
///
/// Does not wait for the process to exit.
///
/// ## Error Handling
///
/// - `ESRCH` (No such process) is treated as success since it means the process
///   group has already exited
/// - `EPERM` is treated the same way: the group leader is gone and the pid
///   may have been reused by someone else
/// - Other errors are propagated as `ProcessSignal` errors
pub fn signal_kill_group(child: &ChildProcess) -> Result<()> {
    debug!("Sending SIGKILL to process group {}", child.pid);

    match killpg(child.pid, Signal::SIGKILL) {
        Ok(()) => {
            debug!("Successfully sent SIGKILL to process group {}", child.pid);
            Ok(())
        }
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} already exited", child.pid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                child.pid
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "Failed to send SIGKILL to process group {}: {}",
                child.pid, e
            );
            Err(CoreError::ProcessSignal(format!(
                "Failed to send SIGKILL to process group {}: {}",
                child.pid, e
            )))
        }
    }
}
