//! Error types for resilience primitives

use std::time::Duration;
use thiserror::Error;

/// Errors produced by (or routed through) resilience primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    /// The circuit is open; the dependency is known-bad and was not called
    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    /// The guarded call exceeded its deadline
    #[error("circuit '{name}' call timed out after {after:?}")]
    Timeout { name: String, after: Duration },

    /// The external dependency itself failed
    #[error("dependency failure: {0}")]
    Dependency(String),

    /// Failure that is not worth counting against the dependency
    #[error("permanent error: {0}")]
    Permanent(String),
}

impl ResilienceError {
    /// Wrap any displayable failure as a dependency failure
    pub fn dependency<E: std::fmt::Display>(err: E) -> Self {
        ResilienceError::Dependency(err.to_string())
    }

    /// Whether this outcome counts as a failure for breaker purposes
    pub fn should_trip_breaker(&self) -> bool {
        matches!(
            self,
            ResilienceError::Dependency(_) | ResilienceError::Timeout { .. }
        )
    }

    /// Whether the call was rejected without reaching the dependency
    pub fn is_rejection(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }
}
