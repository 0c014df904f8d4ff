//! Launch configuration and validation
//!
//! The command-line front end fills a [`LaunchConfig`]; the core only ever
//! sees a validated value. Validation errors name the offending flag and give
//! an example so they can be shown to an operator as-is.

use crate::{CoreError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory, relative to the working directory, holding the optional log file
pub const LOG_DIR_NAME: &str = "launch_log";

/// Default log level when neither `-log-level` nor `RUST_LOG` is given
pub const DEFAULT_LOG_LEVEL: &str = "debug";

/// Everything needed to supervise one executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Application name; doubles as the service name
    pub app_name: String,
    /// Executable to run
    pub executable: PathBuf,
    /// Arguments passed to the executable
    pub args: Vec<String>,
    /// Working directory for the executable
    pub working_dir: PathBuf,
    /// Also write logs to `<workdir>/launch_log/<appname>.log`
    pub enable_log_file: bool,
    /// Log filter directive
    pub log_level: String,
    /// End supervision when the child exits on its own
    pub exit_with_child: bool,
}

impl LaunchConfig {
    /// Create a configuration with default logging options
    pub fn new(
        app_name: impl Into<String>,
        executable: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            executable: executable.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            enable_log_file: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            exit_with_child: false,
        }
    }

    /// Check that every mandatory value is present
    pub fn validate(&self) -> Result<()> {
        validate_app_name(&self.app_name)?;

        if is_blank(&self.executable) {
            return Err(CoreError::ConfigurationError(
                "empty executable, -executable=/opt/myservice/myservice".to_string(),
            ));
        }

        if is_blank(&self.working_dir) {
            return Err(CoreError::ConfigurationError(
                "empty workdir, -workdir=/opt/myservice".to_string(),
            ));
        }

        if self.log_level.trim().is_empty() {
            return Err(CoreError::ConfigurationError(
                "empty log level, -log-level=info".to_string(),
            ));
        }

        debug!("Launch configuration validated for '{}'", self.app_name);
        Ok(())
    }

    /// Location of the log file written when `enable_log_file` is set
    pub fn log_file_path(&self) -> PathBuf {
        self.working_dir
            .join(LOG_DIR_NAME)
            .join(format!("{}.log", self.app_name))
    }
}

/// Validate an application name on its own (service management modes only need this)
pub fn validate_app_name(app_name: &str) -> Result<()> {
    if app_name.trim().is_empty() {
        return Err(CoreError::ConfigurationError(
            "empty appname, -appname=myservice".to_string(),
        ));
    }

    // The name becomes a unit file name and a log file name.
    if app_name.contains(['/', '\\']) || app_name.chars().any(char::is_whitespace) {
        return Err(CoreError::ConfigurationError(format!(
            "invalid appname '{}': must not contain path separators or whitespace",
            app_name
        )));
    }

    Ok(())
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty()
}
