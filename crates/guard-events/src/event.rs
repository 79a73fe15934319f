//! Domain events published by detectors and daemons
//!
//! Every event carries a strongly-typed payload. The payload enum is tagged with
//! a `type` field on the wire, so a serialized event looks like:
//!
//! ```json
//! {"id":"…","timestamp":"2024-05-01T10:00:00Z","payload":{"type":"commit-blocked","reason":"…","violations":3}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The closed set of event types. Used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    EvidenceStale,
    PolicyViolation,
    CriticalFinding,
    CommitBlocked,
    AnalysisCompleted,
    HeartbeatDegraded,
    RecoveryStarted,
    RecoveryCompleted,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::EvidenceStale,
        EventType::PolicyViolation,
        EventType::CriticalFinding,
        EventType::CommitBlocked,
        EventType::AnalysisCompleted,
        EventType::HeartbeatDegraded,
        EventType::RecoveryStarted,
        EventType::RecoveryCompleted,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EvidenceStale => "evidence-stale",
            EventType::PolicyViolation => "policy-violation",
            EventType::CriticalFinding => "critical-finding",
            EventType::CommitBlocked => "commit-blocked",
            EventType::AnalysisCompleted => "analysis-completed",
            EventType::HeartbeatDegraded => "heartbeat-degraded",
            EventType::RecoveryStarted => "recovery-started",
            EventType::RecoveryCompleted => "recovery-completed",
        }
    }

    /// Critical events demand operator attention or block the workflow
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            EventType::CriticalFinding | EventType::CommitBlocked | EventType::HeartbeatDegraded
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {}", s))
    }
}

/// Finding severity as reported by detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Event payload variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GuardEvent {
    /// The evidence artifact is missing or older than its threshold
    EvidenceStale {
        /// `None` when the artifact is missing or its timestamp unreadable
        age_seconds: Option<u64>,
        /// What noticed it (`startup`, `interval`, `manual`, ...)
        source: String,
    },

    /// A rule was violated; not necessarily blocking
    PolicyViolation {
        rule: String,
        file: Option<String>,
        severity: Severity,
    },

    /// A finding severe enough to block commits on its own
    CriticalFinding {
        rule: String,
        file: Option<String>,
        message: String,
    },

    /// A commit or push was refused
    CommitBlocked { reason: String, violations: u32 },

    /// An analysis pass finished
    AnalysisCompleted { files_analyzed: u32, violations: u32 },

    /// The guard's heartbeat is not healthy (`missing`, `stale`, `degraded`, ...)
    HeartbeatDegraded { reason: String },

    /// A scheduled recovery action began executing
    RecoveryStarted { key: String, attempt: u32 },

    /// A recovery action finished
    RecoveryCompleted { key: String, succeeded: bool },
}

impl GuardEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            GuardEvent::EvidenceStale { .. } => EventType::EvidenceStale,
            GuardEvent::PolicyViolation { .. } => EventType::PolicyViolation,
            GuardEvent::CriticalFinding { .. } => EventType::CriticalFinding,
            GuardEvent::CommitBlocked { .. } => EventType::CommitBlocked,
            GuardEvent::AnalysisCompleted { .. } => EventType::AnalysisCompleted,
            GuardEvent::HeartbeatDegraded { .. } => EventType::HeartbeatDegraded,
            GuardEvent::RecoveryStarted { .. } => EventType::RecoveryStarted,
            GuardEvent::RecoveryCompleted { .. } => EventType::RecoveryCompleted,
        }
    }
}

/// An immutable, uniquely identified event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    id: Uuid,
    timestamp: DateTime<Utc>,
    payload: GuardEvent,
}

impl DomainEvent {
    /// New event with a fresh id, stamped now
    pub fn new(payload: GuardEvent) -> Self {
        Self::from_parts(Uuid::new_v4(), Utc::now(), payload)
    }

    /// Rebuild an event whose identity was assigned elsewhere (replays, other daemons)
    pub fn from_parts(id: Uuid, timestamp: DateTime<Utc>, payload: GuardEvent) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &GuardEvent {
        &self.payload
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn is_critical(&self) -> bool {
        self.event_type().is_critical()
    }
}

impl From<GuardEvent> for DomainEvent {
    fn from(payload: GuardEvent) -> Self {
        DomainEvent::new(payload)
    }
}
