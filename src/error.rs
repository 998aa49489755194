//! Unified error types for servicekit

use std::time::Duration;
use thiserror::Error;

/// Main error type for service hosting operations
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A service-registry configuration call failed
    #[error("{context} (os error {code})")]
    Config { context: String, code: i32 },

    /// A process-token privilege could not be enabled
    #[error("Unable to acquire privilege '{privilege}' (os error {code})")]
    Privilege { privilege: String, code: i32 },

    /// Service did not reach the expected state in time
    #[error("Service '{service}' failed to reach state {expected} within {waited:?}")]
    Timeout {
        service: String,
        expected: String,
        waited: Duration,
    },

    /// Service is already registered with the supervisor
    #[error("The service '{0}' is already installed")]
    AlreadyInstalled(String),

    /// Service is not registered with the supervisor
    #[error("The service '{0}' is not installed")]
    NotInstalled(String),

    /// Caller lacks the administrative role and could not relaunch elevated
    #[error("The service can only be {operation} by an administrator")]
    NotElevated { operation: &'static str },

    /// Controller was started more than once
    #[error("Service worker already started")]
    AlreadyStarted,

    /// Stop was requested from the worker thread itself
    #[error("Service worker cannot stop itself; return from the work function instead")]
    StopFromWorker,

    /// Invalid service settings
    #[error("Invalid service settings: {0}")]
    InvalidSettings(String),

    /// Unrecognised logon account
    #[error("Invalid service account '{0}'")]
    InvalidAccount(String),

    /// Install/uninstall hook of the hosting application failed
    #[error("Application hook failed: {0:#}")]
    Hook(anyhow::Error),

    /// Operation needs the Windows service control manager
    #[error("{0} is only available on Windows")]
    Unsupported(&'static str),

    /// IO error (thread spawn, console, filesystem)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Service control manager error
    #[cfg(all(windows, feature = "service"))]
    #[error("Service control manager error: {0}")]
    Scm(#[from] windows_service::Error),
}

/// Result type alias for servicekit operations
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Create a configuration error with context
    pub fn config(context: impl Into<String>, code: i32) -> Self {
        Self::Config {
            context: context.into(),
            code,
        }
    }

    /// OS error code carried by this error, if any
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ServiceError::Config { code, .. } | ServiceError::Privilege { code, .. } => Some(*code),
            ServiceError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Check if this error aborts an install sequence
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Config { .. } | ServiceError::Privilege { .. }
        )
    }
}
