//! Error types for lifecycle persistence and transitions

use crate::state::{LifecycleEvent, LifecycleState};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`PersistenceStore`](crate::store::PersistenceStore)
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error reading or writing the backing file
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stored bytes are not valid JSON
    #[error("Corrupt record for key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Key would escape the store directory
    #[error("Invalid store key: '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the lifecycle state machine
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// `(from, event)` is not declared in the transition table
    #[error("Invalid transition: '{event}' is not allowed from state '{from}'")]
    InvalidTransition {
        from: LifecycleState,
        event: LifecycleEvent,
    },

    /// Persisting the new state failed; the in-memory state is unchanged
    #[error("Failed to persist lifecycle state: {0}")]
    Persistence(#[from] StoreError),

    #[error("Failed to encode lifecycle state: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LifecycleError {
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, LifecycleError::InvalidTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = LifecycleError::InvalidTransition {
            from: LifecycleState::Stopped,
            event: LifecycleEvent::Start,
        };
        assert!(err.is_invalid_transition());
        assert_eq!(
            err.to_string(),
            "Invalid transition: 'start' is not allowed from state 'stopped'"
        );
    }
}
