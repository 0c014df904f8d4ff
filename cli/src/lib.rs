//! Command-line front end for launch
//!
//! Parses the flags, picks the mode (run, or one of the service management
//! actions) and hands over to [`run`] or [`install`].
//!
//! Flags follow the single-dash convention (`-appname=foo`); the double-dash
//! spelling and `-flag value` work too. [`normalize_args`] rewrites the
//! single-dash form before `clap` sees it.

use clap::{ArgGroup, Parser};
use launch_core::config::{validate_app_name, DEFAULT_LOG_LEVEL};
use launch_core::logging::LogSettings;
use launch_core::LaunchConfig;
use std::ffi::OsString;

pub mod error;
#[cfg(unix)]
pub mod install;
#[cfg(unix)]
pub mod run;

pub use error::{CliError, Result};

/// Flags taking a value
const VALUE_FLAGS: &[&str] = &["appname", "executable", "workdir", "log-level"];

/// Switches; `-flag=true` and `-flag=false` are accepted as well
const BOOL_FLAGS: &[&str] = &[
    "enable-log-file",
    "exit-with-child",
    "service-install",
    "service-uninstall",
    "service-start",
    "service-stop",
    "help",
    "version",
];

/// Command-line arguments
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "launch")]
#[command(about = "Run an executable as a supervised child process, optionally as a systemd service")]
#[command(version)]
#[command(group(
    ArgGroup::new("service")
        .args(["service_install", "service_uninstall", "service_start", "service_stop"])
        .multiple(false)
))]
pub struct Args {
    /// Application name (will be used as service name)
    #[arg(long, default_value = "")]
    pub appname: String,

    /// Executable file
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub executable: String,

    /// Working directory
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub workdir: String,

    /// Enable log to file (<workdir>/launch_log/<appname>.log)
    #[arg(long)]
    pub enable_log_file: bool,

    /// Log filter, e.g. `info` or `launch_core=debug,info` (RUST_LOG wins)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Stop supervising, and exit, when the executable exits on its own
    #[arg(long)]
    pub exit_with_child: bool,

    /// Service install
    #[arg(long)]
    pub service_install: bool,

    /// Service uninstall
    #[arg(long)]
    pub service_uninstall: bool,

    /// Service start
    #[arg(long)]
    pub service_start: bool,

    /// Service stop
    #[arg(long)]
    pub service_stop: bool,

    /// Arguments passed to the executable
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// What the invocation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Supervise the executable in the foreground (or as the service itself)
    Run,
    /// Install the systemd unit
    Install,
    /// Stop and remove the systemd unit
    Uninstall,
    /// Start the installed service
    Start,
    /// Stop the installed service
    Stop,
}

impl Args {
    /// The mode selected by the service management flags
    pub fn mode(&self) -> Mode {
        if self.service_install {
            Mode::Install
        } else if self.service_uninstall {
            Mode::Uninstall
        } else if self.service_start {
            Mode::Start
        } else if self.service_stop {
            Mode::Stop
        } else {
            Mode::Run
        }
    }

    /// Build the launch configuration described by the flags
    pub fn launch_config(&self) -> LaunchConfig {
        let mut config = LaunchConfig::new(
            self.appname.trim(),
            self.executable.trim(),
            self.workdir.trim(),
        );
        config.args = self.args.clone();
        config.enable_log_file = self.enable_log_file;
        config.log_level = self.log_level.clone();
        config.exit_with_child = self.exit_with_child;
        config
    }

    /// Check that the mandatory flags of the selected mode are present
    pub fn validate(&self) -> Result<()> {
        match self.mode() {
            Mode::Run | Mode::Install => self.launch_config().validate()?,
            Mode::Uninstall | Mode::Start | Mode::Stop => validate_app_name(self.appname.trim())?,
        }
        Ok(())
    }

    /// Logging setup for this invocation
    ///
    /// The log file is only used in run mode, and only once the flags it is
    /// derived from are valid.
    pub fn log_settings(&self) -> LogSettings {
        let config = self.launch_config();
        let file = (self.mode() == Mode::Run && self.enable_log_file && config.validate().is_ok())
            .then(|| config.log_file_path());
        LogSettings {
            level: self.log_level.clone(),
            file,
        }
    }
}

/// Parse command-line arguments, accepting single-dash long flags
pub fn parse_from<I, T>(args: I) -> std::result::Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    Args::try_parse_from(normalize_args(args))
}

/// Rewrite `-flag[=value]` into `--flag[=value]` for the known long flags
///
/// The program name and everything after `--` are left alone. A switch given
/// as `-flag=false` is dropped; `-flag=true` becomes `--flag`.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut iter = args.into_iter().map(Into::into);

    if let Some(program) = iter.next() {
        out.push(program);
    }

    let mut passthrough = false;
    for arg in iter {
        if passthrough {
            out.push(arg);
            continue;
        }
        if arg == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };

        let body = match text.strip_prefix("--") {
            Some(body) => body,
            None => match text.strip_prefix('-') {
                Some(body) => body,
                None => {
                    out.push(arg);
                    continue;
                }
            },
        };

        let (name, value) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        if VALUE_FLAGS.contains(&name) {
            out.push(OsString::from(format!("--{}", body)));
        } else if BOOL_FLAGS.contains(&name) {
            match value.map(parse_bool) {
                None | Some(Some(true)) => out.push(OsString::from(format!("--{}", name))),
                Some(Some(false)) => {}
                // Let clap report the malformed value
                Some(None) => out.push(OsString::from(format!("--{}", body))),
            }
        } else {
            out.push(arg);
        }
    }

    out
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Carry out the selected mode
///
/// Configuration errors are returned before anything is started.
#[cfg(unix)]
pub fn execute(args: &Args) -> Result<()> {
    args.validate()?;

    match args.mode() {
        Mode::Run => {
            let config = args.launch_config();
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run::run(&config))?;
            Ok(())
        }
        Mode::Install => {
            install::require_root()?;
            let launcher = install::current_launcher()?;
            let unit = install::UnitSpec::from_config(&args.launch_config(), launcher);
            install::Systemd::new().install(&unit)
        }
        Mode::Uninstall => {
            install::require_root()?;
            install::Systemd::new().uninstall(args.appname.trim())
        }
        Mode::Start => {
            install::require_root()?;
            install::Systemd::new().start(args.appname.trim())
        }
        Mode::Stop => {
            install::require_root()?;
            install::Systemd::new().stop(args.appname.trim())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.into_string().unwrap())
            .collect()
    }

    #[test]
    fn test_normalize_single_dash() {
        let out = strings(normalize_args([
            "launch",
            "-appname=foo",
            "-executable",
            "/bin/sleep",
            "--workdir=/tmp",
            "-enable-log-file",
        ]));
        assert_eq!(
            out,
            vec![
                "launch",
                "--appname=foo",
                "--executable",
                "/bin/sleep",
                "--workdir=/tmp",
                "--enable-log-file"
            ]
        );
    }

    #[test]
    fn test_normalize_bool_values() {
        let out = strings(normalize_args([
            "launch",
            "-enable-log-file=false",
            "-service-start=true",
            "-exit-with-child=maybe",
        ]));
        assert_eq!(
            out,
            vec!["launch", "--service-start", "--exit-with-child=maybe"]
        );
    }

    #[test]
    fn test_normalize_leaves_passthrough_alone() {
        let out = strings(normalize_args([
            "launch",
            "-appname=foo",
            "--",
            "-appname=child",
            "-v",
        ]));
        assert_eq!(out, vec!["launch", "--appname=foo", "--", "-appname=child", "-v"]);
    }

    #[test]
    fn test_normalize_unknown_flags_untouched() {
        let out = strings(normalize_args(["launch", "-x", "-bogus=1", "plain"]));
        assert_eq!(out, vec!["launch", "-x", "-bogus=1", "plain"]);
    }

    #[test]
    fn test_mode_selection() {
        let args = parse_from(["launch", "-appname=foo"]).unwrap();
        assert_eq!(args.mode(), Mode::Run);

        let args = parse_from(["launch", "-appname=foo", "-service-stop"]).unwrap();
        assert_eq!(args.mode(), Mode::Stop);

        assert!(parse_from(["launch", "-service-start", "-service-stop"]).is_err());
    }

    #[test]
    fn test_log_settings_file_only_in_valid_run_mode() {
        let args = parse_from([
            "launch",
            "-appname=foo",
            "-executable=/bin/true",
            "-workdir=/srv/foo",
            "-enable-log-file",
        ])
        .unwrap();
        assert_eq!(
            args.log_settings().file,
            Some(PathBuf::from("/srv/foo/launch_log/foo.log"))
        );

        let args = parse_from(["launch", "-appname=foo", "-enable-log-file"]).unwrap();
        assert_eq!(args.log_settings().file, None);
    }
}
