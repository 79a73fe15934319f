//! Notifications: fire-and-forget messages for the operator
//!
//! Producers hand a [`Notification`] to a [`NotificationSink`] and move on;
//! a sink never reports failure back. [`NotificationCenter`] is the throttling
//! sink: it collapses identical messages, applies per-type cooldowns and keeps
//! a bounded queue for a delivery loop to [`drain`](NotificationCenter::drain).

use crate::policy::NotificationPolicy;
use chrono::{DateTime, Utc};
use hookguard_core_resilience::{system_clock, Clock, SharedClock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warn,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warn => "warn",
            NotificationLevel::Error => "error",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    /// Throttling key, e.g. `evidence_error` or `auto_recovery_warn`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            kind: kind.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Receives notifications. Must not block and must not fail the caller.
pub trait NotificationSink: Send + Sync {
    fn enqueue(&self, notification: Notification);
}

/// Writes notifications to the log and nowhere else
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn enqueue(&self, n: Notification) {
        match n.level {
            NotificationLevel::Info => info!(kind = %n.kind, metadata = %n.metadata, "🔔 {}", n.message),
            NotificationLevel::Warn => warn!(kind = %n.kind, metadata = %n.metadata, "🔔 {}", n.message),
            NotificationLevel::Error => error!(kind = %n.kind, metadata = %n.metadata, "🔔 {}", n.message),
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn enqueue(&self, _notification: Notification) {}
}

/// What happened to a submitted notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    Deduplicated,
    CoolingDown,
    Dropped,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub enqueued: u64,
    pub deduplicated: u64,
    pub cooldown_skipped: u64,
    pub dropped: u64,
    pub delivered: u64,
}

#[derive(Debug, Default)]
struct CenterState {
    queue: VecDeque<Notification>,
    /// `(message, type, level)` -> last seen
    recent: HashMap<(String, String, NotificationLevel), DateTime<Utc>>,
    /// type -> last delivered
    last_delivered: HashMap<String, DateTime<Utc>>,
    stats: NotificationStats,
}

/// Throttling notification queue
#[derive(Debug)]
pub struct NotificationCenter {
    policy: NotificationPolicy,
    clock: SharedClock,
    state: Mutex<CenterState>,
}

impl NotificationCenter {
    pub fn new(policy: NotificationPolicy) -> Self {
        Self::with_clock(policy, system_clock())
    }

    pub fn with_clock(policy: NotificationPolicy, clock: SharedClock) -> Self {
        Self {
            policy,
            clock,
            state: Mutex::new(CenterState::default()),
        }
    }

    pub fn policy(&self) -> &NotificationPolicy {
        &self.policy
    }

    pub fn submit(&self, notification: Notification) -> EnqueueOutcome {
        if !self.policy.enabled {
            return EnqueueOutcome::Disabled;
        }

        let now = self.clock.now();
        let mut state = self.lock();

        if state.queue.len() >= self.policy.max_queue_size {
            state.stats.dropped += 1;
            warn!(message = %notification.message, "notification queue full, dropping");
            return EnqueueOutcome::Dropped;
        }

        let key = (
            notification.message.clone(),
            notification.kind.clone(),
            notification.level,
        );
        let window = self.policy.dedup_window();
        let duplicate = state
            .recent
            .get(&key)
            .is_some_and(|seen| elapsed(*seen, now) < window);
        state.recent.insert(key, now);
        if duplicate {
            state.stats.deduplicated += 1;
            debug!(kind = %notification.kind, "notification deduplicated");
            return EnqueueOutcome::Deduplicated;
        }
        if state.recent.len() >= 100 {
            state.recent.retain(|_, seen| elapsed(*seen, now) <= window * 2);
        }

        let cooldown = self.policy.cooldown_for(&notification.kind);
        let cooling = state
            .last_delivered
            .get(&notification.kind)
            .is_some_and(|sent| elapsed(*sent, now) < cooldown);
        if cooling {
            state.stats.cooldown_skipped += 1;
            debug!(kind = %notification.kind, "notification skipped (cooldown)");
            return EnqueueOutcome::CoolingDown;
        }

        state.queue.push_back(notification);
        state.stats.enqueued += 1;
        EnqueueOutcome::Enqueued
    }

    /// Take every pending notification, starting each type's cooldown
    pub fn drain(&self) -> Vec<Notification> {
        let now = self.clock.now();
        let mut state = self.lock();
        let drained: Vec<Notification> = state.queue.drain(..).collect();
        for n in &drained {
            state.last_delivered.insert(n.kind.clone(), now);
        }
        state.stats.delivered += drained.len() as u64;
        drained
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn stats(&self) -> NotificationStats {
        self.lock().stats.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CenterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSink for NotificationCenter {
    fn enqueue(&self, notification: Notification) {
        self.submit(notification);
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (now - since).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookguard_core_resilience::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn center() -> (NotificationCenter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (
            NotificationCenter::with_clock(NotificationPolicy::default(), clock.clone()),
            clock,
        )
    }

    fn stale() -> Notification {
        Notification::new("Evidence is stale", NotificationLevel::Warn, "evidence_stale")
    }

    #[test]
    fn test_identical_messages_collapse_within_window() {
        let (center, clock) = center();
        assert_eq!(center.submit(stale()), EnqueueOutcome::Enqueued);
        assert_eq!(center.submit(stale()), EnqueueOutcome::Deduplicated);

        clock.advance(Duration::from_secs(6));
        assert_eq!(center.submit(stale()), EnqueueOutcome::Enqueued);
        assert_eq!(center.stats().deduplicated, 1);
        assert_eq!(center.pending(), 2);
    }

    #[test]
    fn test_cooldown_starts_at_delivery() {
        let (center, clock) = center();
        center.submit(stale());
        assert_eq!(center.drain().len(), 1);

        clock.advance(Duration::from_secs(10));
        let other = Notification::new("Still stale", NotificationLevel::Warn, "evidence_stale");
        assert_eq!(center.submit(other.clone()), EnqueueOutcome::CoolingDown);

        clock.advance(Duration::from_secs(120));
        assert_eq!(center.submit(other), EnqueueOutcome::Enqueued);
        assert_eq!(center.stats().cooldown_skipped, 1);
    }

    #[test]
    fn test_bounded_queue() {
        let clock = Arc::new(ManualClock::new());
        let policy = NotificationPolicy {
            max_queue_size: 2,
            ..Default::default()
        };
        let center = NotificationCenter::with_clock(policy, clock);
        for i in 0..3 {
            center.enqueue(Notification::new(format!("m{}", i), NotificationLevel::Info, "generic"));
        }
        assert_eq!(center.pending(), 2);
        assert_eq!(center.stats().dropped, 1);
    }

    #[test]
    fn test_disabled() {
        let center = NotificationCenter::new(NotificationPolicy {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(center.submit(stale()), EnqueueOutcome::Disabled);
        assert!(center.drain().is_empty());
    }

    #[test]
    fn test_wire_shape() {
        let n = stale().with_metadata(serde_json::json!({"reason": "startup"}));
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "evidence_stale");
        assert_eq!(json["level"], "warn");
        assert_eq!(json["metadata"]["reason"], "startup");
    }
}
