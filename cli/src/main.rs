//! launch binary
//!
//! Runs an executable as a supervised child, or manages its systemd unit.

use launch_core::logging;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let args = match cli::parse_from(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Kept alive until exit so the log file is flushed last
    let _log = match logging::init(&args.log_settings()) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            return ExitCode::FAILURE;
        }
    };

    info!(mode = ?args.mode(), "Launch Service");

    match panic::catch_unwind(AssertUnwindSafe(|| cli::execute(&args))) {
        Ok(Ok(())) => {
            info!("Finished");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(code = e.code(), error = %e, "Exited with error");
            ExitCode::FAILURE
        }
        Err(panic) => {
            error!(panic = %panic_message(&*panic), "Panic occurred");
            ExitCode::FAILURE
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
