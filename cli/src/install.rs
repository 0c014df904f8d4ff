//! systemd unit management: install, uninstall, start and stop
//!
//! The installed unit runs this binary in run mode with the same
//! `-appname`, `-executable` and `-workdir`, as a `Type=notify` service so the
//! supervisor can report its lifecycle back to systemd.

use crate::{CliError, Result};
use launch_core::LaunchConfig;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Where unit files are installed
pub const UNIT_DIR: &str = "/etc/systemd/system";

/// The `systemctl` binary used to drive systemd
pub const SYSTEMCTL: &str = "systemctl";

/// Fail unless running as root
pub fn require_root() -> Result<()> {
    if nix::unistd::geteuid().is_root() {
        Ok(())
    } else {
        Err(CliError::PermissionDenied(
            "managing system services requires root, re-run with sudo".to_string(),
        ))
    }
}

/// Path of the running launch binary, written into `ExecStart`
pub fn current_launcher() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| CliError::InvalidArgument(format!("read executable failed: {}", e)))?;
    if exe.is_dir() {
        return Err(CliError::InvalidArgument(format!(
            "executable {} is a directory",
            exe.display()
        )));
    }
    Ok(exe)
}

/// Everything that goes into a unit file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    /// Service name
    pub app_name: String,
    /// The launch binary
    pub launcher: PathBuf,
    /// The supervised executable
    pub executable: PathBuf,
    /// Its working directory
    pub working_dir: PathBuf,
    /// Pass `-enable-log-file`
    pub enable_log_file: bool,
    /// Pass `-exit-with-child`
    pub exit_with_child: bool,
    /// Arguments for the executable
    pub args: Vec<String>,
}

impl UnitSpec {
    /// Unit for `config`, run by `launcher`
    pub fn from_config(config: &LaunchConfig, launcher: PathBuf) -> Self {
        Self {
            app_name: config.app_name.clone(),
            launcher,
            executable: config.executable.clone(),
            working_dir: config.working_dir.clone(),
            enable_log_file: config.enable_log_file,
            exit_with_child: config.exit_with_child,
            args: config.args.clone(),
        }
    }

    /// The `ExecStart=` command line
    pub fn exec_start(&self) -> String {
        let mut argv = vec![
            self.launcher.display().to_string(),
            format!("-appname={}", self.app_name),
            format!("-executable={}", self.executable.display()),
            format!("-workdir={}", self.working_dir.display()),
        ];
        if self.enable_log_file {
            argv.push("-enable-log-file".to_string());
        }
        if self.exit_with_child {
            argv.push("-exit-with-child".to_string());
        }
        if !self.args.is_empty() {
            argv.push("--".to_string());
            argv.extend(self.args.iter().cloned());
        }

        argv.iter()
            .map(|arg| quote_exec_arg(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render the unit file
    pub fn render(&self) -> String {
        format!(
            "[Unit]\n\
             Description=Running {name} via Launch\n\
             After=network.target\n\
             \n\
             [Service]\n\
             Type=notify\n\
             NotifyAccess=main\n\
             ExecStart={exec}\n\
             KillMode=mixed\n\
             TimeoutStopSec=120\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n",
            name = self.app_name,
            exec = self.exec_start(),
        )
    }
}

/// Quote one `ExecStart` word; `%` and `$` are escaped for systemd
fn quote_exec_arg(arg: &str) -> String {
    let escaped = arg.replace('%', "%%").replace('$', "$$");
    let needs_quotes = escaped.is_empty()
        || escaped
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\' || c == ';');
    if !needs_quotes {
        return escaped;
    }
    let inner = escaped.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", inner)
}

/// A unit's `ActiveState`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveState {
    /// Started
    Active,
    /// Reloading its configuration
    Reloading,
    /// Not running
    Inactive,
    /// Not running, last run failed
    Failed,
    /// Starting up
    Activating,
    /// Shutting down
    Deactivating,
    /// Anything newer systemd versions report
    Other(String),
}

impl ActiveState {
    /// Parse `systemctl show -p ActiveState --value` output
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "active" => ActiveState::Active,
            "reloading" => ActiveState::Reloading,
            "inactive" => ActiveState::Inactive,
            "failed" => ActiveState::Failed,
            "activating" => ActiveState::Activating,
            "deactivating" => ActiveState::Deactivating,
            other => ActiveState::Other(other.to_string()),
        }
    }

    /// Whether the unit is in transition
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ActiveState::Activating | ActiveState::Deactivating | ActiveState::Reloading
        )
    }

    /// Whether the unit is not running
    pub fn is_stopped(&self) -> bool {
        matches!(self, ActiveState::Inactive | ActiveState::Failed)
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActiveState::Active => "active",
            ActiveState::Reloading => "reloading",
            ActiveState::Inactive => "inactive",
            ActiveState::Failed => "failed",
            ActiveState::Activating => "activating",
            ActiveState::Deactivating => "deactivating",
            ActiveState::Other(s) => s,
        };
        f.write_str(s)
    }
}

/// systemd driven through `systemctl`
#[derive(Debug, Clone)]
pub struct Systemd {
    unit_dir: PathBuf,
    systemctl: PathBuf,
}

impl Default for Systemd {
    fn default() -> Self {
        Self::new()
    }
}

impl Systemd {
    /// The system instance
    pub fn new() -> Self {
        Self::with_paths(UNIT_DIR, SYSTEMCTL)
    }

    /// Custom unit directory and `systemctl` binary
    pub fn with_paths(unit_dir: impl Into<PathBuf>, systemctl: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            systemctl: systemctl.into(),
        }
    }

    /// Unit file path for `app_name`
    pub fn unit_path(&self, app_name: &str) -> PathBuf {
        self.unit_dir.join(unit_name(app_name))
    }

    /// Write and enable the unit; fails if it already exists
    pub fn install(&self, unit: &UnitSpec) -> Result<()> {
        info!(service = %unit.app_name, "Installing service");
        let path = self.unit_path(&unit.app_name);
        if path.exists() {
            return Err(CliError::ServiceCommand(format!(
                "service {} already exist",
                unit.app_name
            )));
        }

        fs::write(&path, unit.render())?;
        debug!(unit = %path.display(), "Unit file written");

        let registered = self
            .systemctl(&["daemon-reload"])
            .and_then(|_| self.systemctl(&["enable", &unit_name(&unit.app_name)]));
        if let Err(e) = registered {
            // Leave nothing half-installed
            let _ = fs::remove_file(&path);
            let _ = self.systemctl(&["daemon-reload"]);
            return Err(e);
        }

        info!(service = %unit.app_name, unit = %path.display(), "Service installed");
        Ok(())
    }

    /// Stop, disable and remove the unit
    pub fn uninstall(&self, app_name: &str) -> Result<()> {
        info!(service = %app_name, "Uninstalling service");
        let path = self.require_unit(app_name)?;

        self.stop_unit(app_name)?;
        self.systemctl(&["disable", &unit_name(app_name)])?;
        fs::remove_file(&path).map_err(|e| {
            CliError::ServiceCommand(format!("remove service failed {}: {}", app_name, e))
        })?;
        self.systemctl(&["daemon-reload"])?;

        info!(service = %app_name, "Service uninstalled");
        Ok(())
    }

    /// Start the service unless it already runs
    pub fn start(&self, app_name: &str) -> Result<()> {
        info!(service = %app_name, "Starting service");
        self.require_unit(app_name)?;

        let state = self.active_state(app_name)?;
        if state.is_pending() {
            return Err(CliError::ServiceCommand(format!(
                "service {} in pending state ({})",
                app_name, state
            )));
        }
        if state == ActiveState::Active {
            debug!(service = %app_name, "Service already running");
            return Ok(());
        }

        self.systemctl(&["start", &unit_name(app_name)])?;
        Ok(())
    }

    /// Stop the service unless it is already stopped
    pub fn stop(&self, app_name: &str) -> Result<()> {
        info!(service = %app_name, "Stopping service");
        self.require_unit(app_name)?;
        self.stop_unit(app_name)
    }

    /// Current `ActiveState` of the unit
    pub fn active_state(&self, app_name: &str) -> Result<ActiveState> {
        let out = self.systemctl(&["show", "-p", "ActiveState", "--value", &unit_name(app_name)])?;
        Ok(ActiveState::parse(&out))
    }

    fn stop_unit(&self, app_name: &str) -> Result<()> {
        let state = self.active_state(app_name)?;
        if state.is_pending() {
            return Err(CliError::ServiceCommand(format!(
                "service {} in pending state ({})",
                app_name, state
            )));
        }
        if state.is_stopped() {
            debug!(service = %app_name, state = %state, "Service not running");
            return Ok(());
        }

        self.systemctl(&["stop", &unit_name(app_name)])?;
        Ok(())
    }

    fn require_unit(&self, app_name: &str) -> Result<PathBuf> {
        let path = self.unit_path(app_name);
        if !path.exists() {
            return Err(CliError::ServiceCommand(format!(
                "open service failed: {} not found",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Run `systemctl`, returning its stdout
    fn systemctl(&self, args: &[&str]) -> Result<String> {
        debug!(command = %display_command(&self.systemctl, args), "Running systemctl");
        let output = Command::new(&self.systemctl).args(args).output().map_err(|e| {
            CliError::ServiceCommand(format!(
                "{}: {}",
                display_command(&self.systemctl, args),
                e
            ))
        })?;

        if !output.status.success() {
            return Err(CliError::ServiceCommand(format!(
                "{}: {}: {}",
                display_command(&self.systemctl, args),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn unit_name(app_name: &str) -> String {
    format!("{}.service", app_name)
}

fn display_command(program: &Path, args: &[&str]) -> String {
    let mut s = program.display().to_string();
    for arg in args {
        s.push(' ');
        s.push_str(arg);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> UnitSpec {
        UnitSpec {
            app_name: "foo".to_string(),
            launcher: PathBuf::from("/usr/local/bin/launch"),
            executable: PathBuf::from("/opt/foo/foo"),
            working_dir: PathBuf::from("/opt/foo"),
            enable_log_file: true,
            exit_with_child: false,
            args: Vec::new(),
        }
    }

    #[test]
    fn test_exec_start() {
        assert_eq!(
            spec().exec_start(),
            "/usr/local/bin/launch -appname=foo -executable=/opt/foo/foo -workdir=/opt/foo -enable-log-file"
        );
    }

    #[test]
    fn test_exec_start_quotes_and_passthrough() {
        let mut unit = spec();
        unit.enable_log_file = false;
        unit.working_dir = PathBuf::from("/opt/my foo");
        unit.args = vec!["--port".to_string(), "100%".to_string()];
        assert_eq!(
            unit.exec_start(),
            "/usr/local/bin/launch -appname=foo -executable=/opt/foo/foo \"-workdir=/opt/my foo\" -- --port 100%%"
        );
    }

    #[test]
    fn test_render_unit() {
        let text = spec().render();
        assert!(text.contains("Description=Running foo via Launch\n"));
        assert!(text.contains("Type=notify\n"));
        assert!(text.contains("ExecStart=/usr/local/bin/launch -appname=foo"));
        assert!(text.ends_with("WantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_active_state() {
        assert_eq!(ActiveState::parse("active\n"), ActiveState::Active);
        assert!(ActiveState::parse("deactivating").is_pending());
        assert!(ActiveState::parse("failed").is_stopped());
        assert_eq!(
            ActiveState::parse("maintenance"),
            ActiveState::Other("maintenance".to_string())
        );
        assert!(!ActiveState::parse("maintenance").is_pending());
    }
}
