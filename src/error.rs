/*!
 * Error types for hookguard
 */

use hookguard_core_resilience::ResilienceError;
use hookguard_events::BusError;
use hookguard_lifecycle::{LifecycleError, StoreError};
use hookguard_sentinel::SentinelError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_REJECTED: i32 = 3;

#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration file missing values, malformed, or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading or writing a file the guard owns
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// One or more event handlers failed
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Sentinel(#[from] SentinelError),

    #[error(transparent)]
    Resilience(#[from] ResilienceError),
}

impl GuardError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        GuardError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Classify the error for reporting and exit codes
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::Config(_) => ErrorKind::Configuration,
            GuardError::Io { .. } => ErrorKind::Io,
            GuardError::Lifecycle(e) => match e {
                LifecycleError::InvalidTransition { .. } => ErrorKind::Validation,
                LifecycleError::Persistence(StoreError::Io { .. }) => ErrorKind::Io,
                LifecycleError::Persistence(_) | LifecycleError::Serialization(_) => {
                    ErrorKind::Configuration
                }
            },
            GuardError::Bus(_) => ErrorKind::ExternalDependency,
            GuardError::Sentinel(e) => match e {
                e if e.is_timeout() => ErrorKind::Timeout,
                SentinelError::Policy(_) => ErrorKind::Configuration,
                _ => ErrorKind::ExternalDependency,
            },
            GuardError::Resilience(e) if e.is_timeout() => ErrorKind::Timeout,
            GuardError::Resilience(_) => ErrorKind::ExternalDependency,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => EXIT_FATAL,
            ErrorKind::Validation => EXIT_REJECTED,
            ErrorKind::ExternalDependency | ErrorKind::Timeout | ErrorKind::Io => EXIT_FAILURE,
        }
    }

    /// Worth retrying later without changing anything
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::ExternalDependency | ErrorKind::Timeout)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A requested transition is not allowed
    Validation,
    /// A script or handler failed
    ExternalDependency,
    /// An external call exceeded its deadline
    Timeout,
    /// Malformed configuration or persisted data
    Configuration,
    /// Filesystem errors
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::ExternalDependency => write!(f, "external-dependency"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Io => write!(f, "io"),
        }
    }
}
