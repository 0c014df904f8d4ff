//! Logging context: console output plus an optional JSON log file
//!
//! [`init`] installs the process-wide `tracing` subscriber once and hands back
//! a [`LogContext`]. File output goes through a background writer thread and a
//! size-rotated [`RotatingFile`]; the context owns the writer's guard, so the
//! last events are flushed when it is dropped at the end of `main`.

use crate::{CoreError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Size at which the log file is rotated (5 MB)
pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

/// Number of rotated files kept next to the live one
pub const MAX_LOG_BACKUPS: usize = 50;

/// Rotated files older than this are removed (90 days)
pub const MAX_LOG_AGE: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// What to log and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Append JSON lines to this file in addition to the console
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: crate::config::DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Live logging setup; keep it alive for the whole run
pub struct LogContext {
    file: Option<PathBuf>,
    // Dropping the guard flushes whatever the writer thread still holds
    _guard: Option<WorkerGuard>,
}

impl std::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContext").field("file", &self.file).finish()
    }
}

impl LogContext {
    /// Path of the log file, if file logging is enabled
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Initialize tracing for the application
pub fn init(settings: &LogSettings) -> Result<LogContext> {
    let filter = build_filter(&settings.level)?;

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let writer = RotatingFile::open(path, RotationPolicy::default())?;
            let (non_blocking, guard) = tracing_appender::non_blocking(writer);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| CoreError::InitializationError(e.to_string()))?;

    match &settings.file {
        Some(path) => info!(
            level = %settings.level,
            log_file = %path.display(),
            "Tracing initialized"
        ),
        None => info!(level = %settings.level, "Tracing initialized"),
    }

    Ok(LogContext {
        file: settings.file.clone(),
        _guard: guard,
    })
}

/// `RUST_LOG` wins over the configured level
fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| {
        CoreError::ConfigurationError(format!("invalid log level '{}': {}", level, e))
    })
}

/// Open (creating parent directories) a log file in append mode
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::InitializationError(format!(
                    "create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            CoreError::InitializationError(format!("open log file {}: {}", path.display(), e))
        })
}

/// Limits for [`RotatingFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate before a write would take the live file past this size
    pub max_bytes: u64,
    /// Keep at most this many rotated files
    pub max_backups: usize,
    /// Remove rotated files older than this
    pub max_age: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_LOG_BYTES,
            max_backups: MAX_LOG_BACKUPS,
            max_age: MAX_LOG_AGE,
        }
    }
}

/// Append-only log file that rotates by size.
///
/// `foo.log` becomes `foo.log.1` when full, `foo.log.1` becomes `foo.log.2`
/// and so on up to `max_backups`. Meant to sit behind
/// `tracing_appender::non_blocking`, so rotation happens on the writer thread.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    policy: RotationPolicy,
}

impl RotatingFile {
    /// Open `path` for appending; existing content counts towards the size limit
    pub fn open(path: &Path, policy: RotationPolicy) -> Result<Self> {
        let file = open_log_file(path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        let rotating = Self {
            path: path.to_path_buf(),
            file,
            written,
            policy,
        };
        rotating.remove_expired();
        Ok(rotating)
    }

    /// Path of the `n`th rotated file
    pub fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        if self.policy.max_backups == 0 {
            self.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.policy.max_backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.policy.max_backups).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = open_log_file(&self.path)?;
        self.written = 0;
        self.remove_expired();
        Ok(())
    }

    fn remove_expired(&self) {
        for n in 1..=self.policy.max_backups {
            let path = self.backup_path(n);
            let expired = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .map_or(false, |age| age >= self.policy.max_age);
            if expired {
                let _ = fs::remove_file(&path);
            }
        }
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.policy.max_bytes {
            // Logging cannot log its own failure; keep writing to the current file
            if let Err(e) = self.rotate() {
                eprintln!("log rotation failed for {}: {}", self.path.display(), e);
            }
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
