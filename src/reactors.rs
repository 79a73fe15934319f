//! Bus subscribers that turn domain events into state changes
//!
//! | event                          | lifecycle   | recovery          | notification         |
//! |--------------------------------|-------------|-------------------|----------------------|
//! | `commit-blocked`               | `block`     |                   | `commit_blocked`     |
//! | `critical-finding`             | `block`     |                   | `critical_finding`   |
//! | `analysis-completed` (0 found) | `unblock`   |                   |                      |
//! | `heartbeat-degraded`           | `degrade`   | restart if listed | `heartbeat_degraded` |
//! | `recovery-started`             | `recover`   |                   |                      |
//! | `recovery-completed` ok        | `recovered` |                   |                      |
//! | `recovery-completed` failed    | `degrade`   |                   |                      |
//! | `evidence-stale`               |             |                   | `evidence_stale`     |
//!
//! Lifecycle events that do not apply in the current state are ignored.

use async_trait::async_trait;
use hookguard_events::{BoxError, DomainEvent, EventHandler, GuardEvent};
use hookguard_lifecycle::{LifecycleEvent, LifecycleStateMachine};
use hookguard_sentinel::{
    AutoRecoveryManager, HeartbeatPolicy, Notification, NotificationLevel, NotificationSink,
    RecoveryOutcome, RecoveryRequest, HEARTBEAT_RECOVERY_KEY,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Lifecycle event a domain event maps to, if any
pub fn lifecycle_event_for(payload: &GuardEvent) -> Option<LifecycleEvent> {
    match payload {
        GuardEvent::CommitBlocked { .. } | GuardEvent::CriticalFinding { .. } => {
            Some(LifecycleEvent::Block)
        }
        GuardEvent::AnalysisCompleted { violations: 0, .. } => Some(LifecycleEvent::Unblock),
        GuardEvent::HeartbeatDegraded { .. } => Some(LifecycleEvent::Degrade),
        GuardEvent::RecoveryStarted { .. } => Some(LifecycleEvent::Recover),
        GuardEvent::RecoveryCompleted { succeeded: true, .. } => Some(LifecycleEvent::Recovered),
        GuardEvent::RecoveryCompleted { succeeded: false, .. } => Some(LifecycleEvent::Degrade),
        GuardEvent::AnalysisCompleted { .. }
        | GuardEvent::EvidenceStale { .. }
        | GuardEvent::PolicyViolation { .. } => None,
    }
}

/// Drives the lifecycle state machine
pub struct LifecycleReactor {
    machine: Arc<Mutex<LifecycleStateMachine>>,
}

impl LifecycleReactor {
    pub fn new(machine: Arc<Mutex<LifecycleStateMachine>>) -> Self {
        Self { machine }
    }
}

#[async_trait]
impl EventHandler for LifecycleReactor {
    fn name(&self) -> &str {
        "lifecycle"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), BoxError> {
        let Some(lifecycle_event) = lifecycle_event_for(event.payload()) else {
            return Ok(());
        };

        let mut machine = self.machine.lock().await;
        match machine.apply_if_allowed(lifecycle_event)? {
            Some(transition) => debug!(
                event_id = %event.id(),
                trigger = %event.event_type(),
                from = %transition.from,
                to = %transition.to,
                "lifecycle moved"
            ),
            None => debug!(
                event_id = %event.id(),
                trigger = %event.event_type(),
                state = %machine.get_state(),
                lifecycle_event = %lifecycle_event,
                "lifecycle event does not apply"
            ),
        }
        Ok(())
    }
}

/// Schedules a supervisor restart when the heartbeat degrades
pub struct RecoveryReactor {
    medic: AutoRecoveryManager,
    policy: HeartbeatPolicy,
}

impl RecoveryReactor {
    pub fn new(medic: AutoRecoveryManager, policy: HeartbeatPolicy) -> Self {
        Self { medic, policy }
    }
}

#[async_trait]
impl EventHandler for RecoveryReactor {
    fn name(&self) -> &str {
        "recovery"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), BoxError> {
        let GuardEvent::HeartbeatDegraded { reason } = event.payload() else {
            return Ok(());
        };
        if !self.policy.should_restart(reason) {
            debug!(reason = %reason, "heartbeat reason does not warrant a restart");
            return Ok(());
        }

        let request = RecoveryRequest::new(HEARTBEAT_RECOVERY_KEY, format!("heartbeat-{}", reason))
            .with_context(json!({ "eventId": event.id().to_string(), "reason": reason }));
        match self.medic.recover(request).await {
            RecoveryOutcome::Scheduled { delay } => {
                info!(reason = %reason, delay_ms = delay.as_millis() as u64, "supervisor restart queued")
            }
            outcome => debug!(reason = %reason, ?outcome, "supervisor restart not queued"),
        }
        Ok(())
    }
}

/// Forwards what the operator should hear about to a notification sink
pub struct NotificationReactor {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationReactor {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }
}

/// Notification for a domain event, if it warrants one
pub fn notification_for(payload: &GuardEvent) -> Option<Notification> {
    let notification = match payload {
        GuardEvent::EvidenceStale {
            age_seconds: Some(age),
            source,
        } => Notification::new(
            format!("AI evidence is stale ({}s old, {})", age, source),
            NotificationLevel::Warn,
            "evidence_stale",
        ),
        GuardEvent::EvidenceStale {
            age_seconds: None,
            source,
        } => Notification::new(
            format!("AI evidence is missing or unreadable ({})", source),
            NotificationLevel::Warn,
            "evidence_stale",
        ),
        GuardEvent::HeartbeatDegraded { reason } => Notification::new(
            format!("Guard heartbeat degraded ({})", reason),
            NotificationLevel::Warn,
            "heartbeat_degraded",
        ),
        GuardEvent::CriticalFinding { rule, file, message } => Notification::new(
            match file {
                Some(file) => format!("{} in {}: {}", rule, file, message),
                None => format!("{}: {}", rule, message),
            },
            NotificationLevel::Error,
            "critical_finding",
        ),
        GuardEvent::CommitBlocked { reason, violations } => Notification::new(
            format!("Commit blocked: {} ({} violations)", reason, violations),
            NotificationLevel::Error,
            "commit_blocked",
        ),
        GuardEvent::PolicyViolation { .. }
        | GuardEvent::AnalysisCompleted { .. }
        | GuardEvent::RecoveryStarted { .. }
        | GuardEvent::RecoveryCompleted { .. } => return None,
    };
    Some(notification.with_metadata(serde_json::to_value(payload).unwrap_or_default()))
}

#[async_trait]
impl EventHandler for NotificationReactor {
    fn name(&self) -> &str {
        "notifications"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), BoxError> {
        if let Some(notification) = notification_for(event.payload()) {
            self.sink.enqueue(notification);
        }
        Ok(())
    }
}
