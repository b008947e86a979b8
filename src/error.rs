//! Error types for the globe quality controller and its daemon.
//!
//! The controller itself never fails: its inputs are numeric and clamped.
//! These enums cover the surfaces around it (tier names, configuration,
//! IPC and logging setup).

use thiserror::Error;

/// A tier name that is not one of low, medium, high or ultra.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid quality tier '{0}', expected one of: low, medium, high, ultra")]
pub struct ParseTierError(pub String);

/// Errors related to configuration management.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Errors related to IPC server operations.
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to bind socket at '{path}': {source}")]
    SocketBindFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid command received: {0}")]
    InvalidCommand(String),

    #[error("Failed to serialize response: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors related to logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Could not determine a data directory for log files")]
    DataDirectoryNotFound,

    #[error("Failed to create log directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file appender: {0}")]
    AppenderCreationFailed(String),
}

/// Top-level daemon errors.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier_error_lists_valid_names() {
        let err = ParseTierError("extreme".to_string());
        let msg = err.to_string();
        assert!(msg.contains("'extreme'"));
        assert!(msg.contains("low, medium, high, ultra"));
    }

    #[test]
    fn test_daemon_error_wraps_config_error() {
        let err: DaemonError = ConfigError::ValidationError("ema_alpha".to_string()).into();
        assert!(matches!(err, DaemonError::Config(_)));
        assert!(err.to_string().contains("ema_alpha"));
    }
}
