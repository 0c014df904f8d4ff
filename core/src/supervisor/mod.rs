//! Child process handle
//!
//! Starting the supervised executable, streaming its output into the log,
//! killing it and classifying how it ended.
//!
//! ## Components
//!
//! - [`ProcessAdapter`]: starts the executable (real or mock)
//! - [`ManagedProcess`]: terminate / wait on the running process
//! - [`LineSink`]: where stdout and stderr lines go

use crate::config::LaunchConfig;
use crate::Result;
use tracing::{error, info};

pub mod adapters;
pub mod output;

pub use adapters::*;
pub use output::*;

/// Start the supervised executable and log that it is running.
///
/// Launch failures are logged here and returned unchanged; there is no
/// process to clean up in that case.
pub fn launch(
    adapter: &dyn ProcessAdapter,
    config: &LaunchConfig,
    sinks: OutputSinks,
) -> Result<Box<dyn ManagedProcess>> {
    match adapter.start(config, sinks) {
        Ok(process) => {
            info!(
                app = %config.app_name,
                executable = %config.executable.display(),
                args = ?config.args,
                workdir = %config.working_dir.display(),
                pid = process.pid(),
                "Executable started"
            );
            Ok(process)
        }
        Err(e) => {
            error!(
                app = %config.app_name,
                executable = %config.executable.display(),
                error = %e,
                "Starting executable failed"
            );
            Err(e)
        }
    }
}
