//! CLI error types

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Service command failed: {0}")]
    ServiceCommand(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Core(#[from] launch_core::CoreError),
}

impl CliError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CliError::InvalidArgument(_) => "CLI002",
            CliError::ServiceCommand(_) => "CLI006",
            CliError::IoError(_) => "CLI008",
            CliError::PermissionDenied(_) => "CLI009",
            CliError::Core(_) => "CLI010",
        }
    }
}

/// CLI-specific result type
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use launch_core::CoreError;

    #[test]
    fn test_error_codes() {
        assert_eq!(CliError::InvalidArgument("test".to_string()).code(), "CLI002");
        assert_eq!(CliError::ServiceCommand("test".to_string()).code(), "CLI006");
        assert_eq!(CliError::PermissionDenied("test".to_string()).code(), "CLI009");
        assert_eq!(
            CliError::Core(CoreError::ConfigurationError("x".into())).code(),
            "CLI010"
        );
    }

    #[test]
    fn test_error_display() {
        let error = CliError::ServiceCommand("systemctl start foo.service: exit status 5".to_string());
        assert_eq!(
            error.to_string(),
            "Service command failed: systemctl start foo.service: exit status 5"
        );

        // Core errors keep their own message
        let error: CliError = CoreError::ConfigurationError("empty appname".into()).into();
        assert_eq!(error.to_string(), "Configuration error: empty appname");
    }
}
