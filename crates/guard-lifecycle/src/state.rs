//! Lifecycle states, events, and the persisted record

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle states of the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not started yet, or reset
    Idle,

    /// Gating commits normally
    Active,

    /// A blocking finding is outstanding
    Blocked,

    /// A dependency (heartbeat, supervisor) is unhealthy
    Degraded,

    /// An automatic recovery action is running
    Recovering,

    /// Shut down; only `reset` leaves this state
    Stopped,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 6] = [
        LifecycleState::Idle,
        LifecycleState::Active,
        LifecycleState::Blocked,
        LifecycleState::Degraded,
        LifecycleState::Recovering,
        LifecycleState::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Active => "active",
            LifecycleState::Blocked => "blocked",
            LifecycleState::Degraded => "degraded",
            LifecycleState::Recovering => "recovering",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LifecycleState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown lifecycle state: {}", s))
    }
}

/// Inputs that drive a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Start,
    Block,
    Unblock,
    Degrade,
    Recover,
    Recovered,
    Stop,
    Reset,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 8] = [
        LifecycleEvent::Start,
        LifecycleEvent::Block,
        LifecycleEvent::Unblock,
        LifecycleEvent::Degrade,
        LifecycleEvent::Recover,
        LifecycleEvent::Recovered,
        LifecycleEvent::Stop,
        LifecycleEvent::Reset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Start => "start",
            LifecycleEvent::Block => "block",
            LifecycleEvent::Unblock => "unblock",
            LifecycleEvent::Degrade => "degrade",
            LifecycleEvent::Recover => "recover",
            LifecycleEvent::Recovered => "recovered",
            LifecycleEvent::Stop => "stop",
            LifecycleEvent::Reset => "reset",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LifecycleEvent::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("unknown lifecycle event: {}", s))
    }
}

/// What lands on disk: `{"state":"active","updatedAt":1714557600000}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub state: LifecycleState,

    /// Milliseconds since the Unix epoch
    pub updated_at: i64,
}

impl PersistedState {
    pub fn new(state: LifecycleState, at: DateTime<Utc>) -> Self {
        Self {
            state,
            updated_at: at.timestamp_millis(),
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.updated_at).single()
    }
}
