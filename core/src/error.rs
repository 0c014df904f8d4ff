//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Process spawn error: {0}")]
    ProcessSpawn(String),

    #[error("Process signal error: {0}")]
    ProcessSignal(String),

    #[error("Process wait error: {0}")]
    ProcessWait(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::ServiceError(_) => "CORE004",
            CoreError::IoError(_) => "CORE005",
            CoreError::ProcessSpawn(_) => "CORE007",
            CoreError::ProcessSignal(_) => "CORE008",
            CoreError::ProcessWait(_) => "CORE009",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

