//! Error types for provreg.
//!
//! Expected absence (a target that is not installed, an optional key that
//! does not exist) is never an error; it is reported as `Ok(None)` or
//! [`Presence::Absent`](crate::probe::Presence). Everything in this module is
//! either a contract violation, a store failure, or a failure reported by a
//! registration callback.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the provreg library.
#[derive(Debug, Error)]
pub enum SetupError {
    // Contract violations
    #[error("Object disposed: {what}")]
    Disposed { what: &'static str },

    #[error("{message}")]
    Contract { message: String },

    #[error("Write attempted under read-only policy: {operation} on {path}")]
    ReadOnlyViolation { operation: &'static str, path: String },

    #[error("Direct native access is restricted: {path}")]
    RestrictedAccess { path: String },

    // Store errors
    #[error("Store error at {path}: {message}")]
    Store { message: String, path: String },

    #[error("Registry key not found: {path}")]
    NodeMissing { path: String },

    #[error("Registry value not found: {path}\\{name}")]
    ValueMissing { path: String, name: String },

    #[error("Access denied writing to {path}")]
    AccessDenied { path: String },

    // Registration callback errors
    #[error("{message}")]
    Operation { message: String },

    #[error("Failed to launch {program}: {message}")]
    Launch { program: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid version: {value}")]
    InvalidVersion { value: String },
}

/// Result type alias for provreg operations.
pub type Result<T> = std::result::Result<T, SetupError>;

impl From<std::io::Error> for SetupError {
    fn from(err: std::io::Error) -> Self {
        SetupError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SetupError {
    fn from(err: serde_json::Error) -> Self {
        SetupError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SetupError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SetupError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a callback failure whose message is shown to the user verbatim.
    pub fn operation(message: impl Into<String>) -> Self {
        SetupError::Operation {
            message: message.into(),
        }
    }

    /// Create a contract violation.
    pub fn contract(message: impl Into<String>) -> Self {
        SetupError::Contract {
            message: message.into(),
        }
    }

    /// True for errors that indicate a programming or configuration mistake
    /// rather than a condition of the machine being configured.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SetupError::Disposed { .. }
                | SetupError::Contract { .. }
                | SetupError::ReadOnlyViolation { .. }
                | SetupError::RestrictedAccess { .. }
        )
    }

    /// Convert to a process exit code.
    ///
    /// - 1: registration failure (store, callback, IO)
    /// - 2: configuration or usage error
    /// - 3: contract violation
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::Config { .. }
            | SetupError::Validation { .. }
            | SetupError::InvalidVersion { .. } => 2,

            _ if self.is_contract_violation() => 3,

            _ => 1,
        }
    }
}
