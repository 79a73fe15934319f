//! Error types for event delivery

use crate::event::EventType;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Boxed error returned by event handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One handler's failure during a publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler: String,
    pub message: String,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.handler, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// At least one matched handler failed. Every matched handler still ran.
    #[error("{} handler(s) failed for {event_type} event {event_id}: {}", .failures.len(), join(.failures))]
    HandlersFailed {
        event_id: Uuid,
        event_type: EventType,
        failures: Vec<HandlerFailure>,
    },
}

impl BusError {
    pub fn failures(&self) -> &[HandlerFailure] {
        match self {
            BusError::HandlersFailed { failures, .. } => failures,
        }
    }
}

fn join(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
