//! Medic: Auto-Recovery for a degraded guard
//!
//! Failure signals (a stale heartbeat, a dead supervisor) arrive as
//! [`RecoveryRequest`]s. The medic picks the first [`RecoveryStrategy`] whose
//! condition matches and arms a timer for it:
//!
//! ```text
//! recover(key) ──> strategy? ──no──> Ignored
//!                     │yes
//!                     v
//!             attempts >= max ──yes──> Skipped (+ warn notification)
//!                     │no
//!                     v
//!        delay = base * 2^attempts * (1 ± jitter)
//!        cancel pending timer for key, arm new one ──> Scheduled { delay }
//!                     │ (timer fires)
//!                     v
//!        attempts += 1, run action through the circuit breaker,
//!        log + notify success or failure
//! ```
//!
//! A failed action is not retried on its own; the next failure signal from the
//! outside drives the next, longer, backoff tier. [`AutoRecoveryManager::clear`]
//! resets a key once its condition is known to be resolved.

use crate::error::{Result, SentinelError};
use crate::metrics::RecoveryStats;
use crate::notify::{Notification, NotificationLevel, NotificationSink, TracingSink};
use crate::operation::{ExternalOperation, OperationOutput, ScriptOperation};
use crate::policy::RecoveryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hookguard_core_resilience::{
    system_clock, CircuitBreaker, CircuitBreakerConfig, Clock, ResilienceError, SharedClock,
};
use hookguard_events::{EventBus, GuardEvent};
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A request to heal whatever `key` identifies
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryRequest {
    /// Attempt counters and timers are tracked per key
    pub key: String,
    /// Why recovery is wanted, e.g. `heartbeat-stale`
    pub reason: String,
    pub context: Value,
}

impl RecoveryRequest {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
            context: Value::Null,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

/// A remediation the medic can schedule
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn id(&self) -> &str;

    fn matches(&self, reason: &str, context: &Value) -> bool;

    async fn run(&self, request: &RecoveryRequest) -> Result<OperationOutput>;
}

/// Restarts the guard supervisor for any `heartbeat-*` reason
pub struct SupervisorRestartStrategy {
    operation: Arc<dyn ExternalOperation>,
}

impl SupervisorRestartStrategy {
    pub const ID: &'static str = "guard-supervisor-restart";

    pub fn new(operation: Arc<dyn ExternalOperation>) -> Self {
        Self { operation }
    }
}

#[async_trait]
impl RecoveryStrategy for SupervisorRestartStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn matches(&self, reason: &str, _context: &Value) -> bool {
        reason.starts_with("heartbeat-")
    }

    async fn run(&self, request: &RecoveryRequest) -> Result<OperationOutput> {
        info!(
            key = %request.key,
            script = %self.operation.describe(),
            "🚑 Attempting guard-supervisor restart"
        );
        self.operation.run(&["restart".to_string()]).await
    }
}

/// Result of [`AutoRecoveryManager::recover`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No strategy matched the reason
    Ignored,
    /// The key has used up its attempts
    Skipped,
    /// A timer is armed and will run the action after `delay`
    Scheduled { delay: Duration },
}

/// `base * 2^attempts`, perturbed by up to `±jitter` of itself
pub fn backoff_delay(policy: &RecoveryPolicy, attempts: u32) -> Duration {
    let factor = if policy.jitter > 0.0 {
        1.0 + rand::rng().random_range(-policy.jitter..=policy.jitter)
    } else {
        1.0
    };
    scaled_backoff(policy.base_backoff(), attempts, factor)
}

fn scaled_backoff(base: Duration, attempts: u32, factor: f64) -> Duration {
    let exponential = base.as_millis() as f64 * 2f64.powi(attempts.min(32) as i32);
    Duration::from_millis((exponential * factor).round().max(0.0) as u64)
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct KeyState {
    attempts: u32,
    last_attempt_at: Option<DateTime<Utc>>,
    pending: Option<PendingTimer>,
}

struct Shared {
    policy: RecoveryPolicy,
    strategies: RwLock<Vec<Arc<dyn RecoveryStrategy>>>,
    keys: Mutex<HashMap<String, KeyState>>,
    generation: AtomicU64,
    breaker: CircuitBreaker,
    notifier: Arc<dyn NotificationSink>,
    bus: Option<EventBus>,
    clock: SharedClock,
    stats: std::sync::Mutex<RecoveryStats>,
}

impl Shared {
    fn stats(&self) -> std::sync::MutexGuard<'_, RecoveryStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, message: String, level: NotificationLevel, metadata: Value) {
        self.notifier.enqueue(
            Notification::new(message, level, format!("auto_recovery_{}", level)).with_metadata(metadata),
        );
    }

    async fn publish(&self, payload: GuardEvent) {
        if let Some(bus) = &self.bus {
            if let Err(e) = bus.emit(payload).await {
                warn!(error = %e, "recovery event delivery failed");
            }
        }
    }

    async fn fire(
        self: Arc<Self>,
        generation: u64,
        strategy: Arc<dyn RecoveryStrategy>,
        request: RecoveryRequest,
    ) {
        let attempt = {
            let mut keys = self.keys.lock().await;
            let Some(entry) = keys.get_mut(&request.key) else {
                return;
            };
            match &entry.pending {
                Some(pending) if pending.generation == generation => {}
                // Superseded or cleared after this timer elapsed
                _ => return,
            }
            entry.pending = None;
            entry.attempts += 1;
            entry.last_attempt_at = Some(self.clock.now());
            entry.attempts
        };
        self.stats().attempted += 1;

        self.publish(GuardEvent::RecoveryStarted {
            key: request.key.clone(),
            attempt,
        })
        .await;

        let (action, req) = (&strategy, &request);
        let result = self
            .breaker
            .call(move || async move {
                action.run(req).await.map_err(ResilienceError::dependency)
            })
            .await;

        let metadata = json!({ "key": request.key, "reason": request.reason, "attempt": attempt });
        let succeeded = match result {
            Ok(output) => {
                self.stats().succeeded += 1;
                info!(
                    key = %request.key,
                    reason = %request.reason,
                    strategy = strategy.id(),
                    attempt,
                    stdout = %output.stdout.trim(),
                    "✅ Recovery succeeded"
                );
                self.notify(
                    format!("Recovery succeeded for {}", request.key),
                    NotificationLevel::Info,
                    metadata,
                );
                true
            }
            Err(e) => {
                self.stats().failed += 1;
                error!(
                    key = %request.key,
                    reason = %request.reason,
                    strategy = strategy.id(),
                    attempt,
                    error = %e,
                    "❌ Recovery failed"
                );
                self.notify(
                    format!("Recovery failed for {}: {}", request.key, e),
                    NotificationLevel::Error,
                    metadata,
                );
                false
            }
        };

        self.publish(GuardEvent::RecoveryCompleted {
            key: request.key,
            succeeded,
        })
        .await;
    }
}

/// Builder for [`AutoRecoveryManager`]
pub struct AutoRecoveryBuilder {
    policy: RecoveryPolicy,
    strategies: Vec<Arc<dyn RecoveryStrategy>>,
    breaker: Option<CircuitBreaker>,
    notifier: Option<Arc<dyn NotificationSink>>,
    bus: Option<EventBus>,
    clock: Option<SharedClock>,
}

impl AutoRecoveryBuilder {
    pub fn strategy(mut self, strategy: Arc<dyn RecoveryStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Breaker guarding every action; defaults to one named `recovery`
    pub fn breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Publish `recovery-started` / `recovery-completed` on this bus
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Without strategies the supervisor restart via `policy.restart_script` is installed.
    pub fn build(self) -> Result<AutoRecoveryManager> {
        self.policy.validate().map_err(SentinelError::Policy)?;

        let clock = self.clock.unwrap_or_else(system_clock);
        let breaker = self.breaker.unwrap_or_else(|| {
            CircuitBreaker::with_clock("recovery", CircuitBreakerConfig::default(), clock.clone())
        });
        let mut strategies = self.strategies;
        if strategies.is_empty() {
            let script = ScriptOperation::new(self.policy.restart_script.clone());
            strategies.push(Arc::new(SupervisorRestartStrategy::new(Arc::new(script))));
        }

        Ok(AutoRecoveryManager {
            shared: Arc::new(Shared {
                policy: self.policy,
                strategies: RwLock::new(strategies),
                keys: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                breaker,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingSink)),
                bus: self.bus,
                clock,
                stats: std::sync::Mutex::new(RecoveryStats::default()),
            }),
        })
    }
}

/// Strategy-driven delayed remediation with per-key attempt caps
///
/// Cloning shares the same manager.
#[derive(Clone)]
pub struct AutoRecoveryManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AutoRecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoRecoveryManager")
            .field("policy", &self.shared.policy)
            .field("breaker", &self.shared.breaker.name())
            .finish_non_exhaustive()
    }
}

impl AutoRecoveryManager {
    pub fn builder(policy: RecoveryPolicy) -> AutoRecoveryBuilder {
        AutoRecoveryBuilder {
            policy,
            strategies: Vec::new(),
            breaker: None,
            notifier: None,
            bus: None,
            clock: None,
        }
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.shared.policy
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.shared.breaker
    }

    /// Strategies are consulted in registration order.
    pub async fn register_strategy(&self, strategy: Arc<dyn RecoveryStrategy>) {
        debug!(strategy = strategy.id(), "recovery strategy registered");
        self.shared.strategies.write().await.push(strategy);
    }

    pub async fn recover(&self, request: RecoveryRequest) -> RecoveryOutcome {
        let strategy = self
            .shared
            .strategies
            .read()
            .await
            .iter()
            .find(|s| s.matches(&request.reason, &request.context))
            .cloned();
        let Some(strategy) = strategy else {
            self.shared.stats().ignored += 1;
            debug!(key = %request.key, reason = %request.reason, "no recovery strategy matches");
            return RecoveryOutcome::Ignored;
        };

        let mut keys = self.shared.keys.lock().await;
        let entry = keys.entry(request.key.clone()).or_default();

        if entry.attempts >= self.shared.policy.max_attempts {
            self.shared.stats().skipped += 1;
            warn!(
                key = %request.key,
                reason = %request.reason,
                attempts = entry.attempts,
                "⛔ Recovery skipped: max attempts reached"
            );
            self.shared.notify(
                format!("Recovery skipped for {} (max attempts reached)", request.key),
                NotificationLevel::Warn,
                json!({ "key": request.key, "reason": request.reason }),
            );
            return RecoveryOutcome::Skipped;
        }

        let delay = backoff_delay(&self.shared.policy, entry.attempts);
        if let Some(previous) = entry.pending.take() {
            previous.handle.abort();
            debug!(key = %request.key, "pending recovery superseded");
        }

        info!(
            key = %request.key,
            reason = %request.reason,
            strategy = strategy.id(),
            attempt = entry.attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "⏱️  Recovery scheduled"
        );

        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let shared = self.shared.clone();
        // The timer cannot claim the key before this lock is released, so
        // `pending` is always set by the time it checks.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.fire(generation, strategy, request).await;
        });
        entry.pending = Some(PendingTimer { generation, handle });
        self.shared.stats().scheduled += 1;

        RecoveryOutcome::Scheduled { delay }
    }

    /// Cancel any pending timer for `key` and reset its attempts
    ///
    /// Returns false if nothing was tracked for the key.
    pub async fn clear(&self, key: &str) -> bool {
        let removed = self.shared.keys.lock().await.remove(key);
        match removed {
            Some(state) => {
                if let Some(pending) = state.pending {
                    pending.handle.abort();
                }
                debug!(key, "recovery state cleared");
                true
            }
            None => false,
        }
    }

    pub async fn attempts(&self, key: &str) -> u32 {
        self.shared
            .keys
            .lock()
            .await
            .get(key)
            .map_or(0, |state| state.attempts)
    }

    pub async fn last_attempt_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.shared
            .keys
            .lock()
            .await
            .get(key)
            .and_then(|state| state.last_attempt_at)
    }

    pub async fn has_pending(&self, key: &str) -> bool {
        self.shared
            .keys
            .lock()
            .await
            .get(key)
            .is_some_and(|state| state.pending.is_some())
    }

    pub async fn pending_count(&self) -> usize {
        self.shared
            .keys
            .lock()
            .await
            .values()
            .filter(|state| state.pending.is_some())
            .count()
    }

    pub fn stats(&self) -> RecoveryStats {
        self.shared.stats().clone()
    }

    /// Cancel every pending timer; attempt counters are kept
    pub async fn shutdown(&self) {
        let mut keys = self.shared.keys.lock().await;
        let mut cancelled = 0;
        for state in keys.values_mut() {
            if let Some(pending) = state.pending.take() {
                pending.handle.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(cancelled, "pending recoveries cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingStrategy {
        runs: AtomicUsize,
        fail: bool,
    }

    impl CountingStrategy {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                fail,
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecoveryStrategy for CountingStrategy {
        fn id(&self) -> &str {
            "counting"
        }

        fn matches(&self, reason: &str, _context: &Value) -> bool {
            reason.starts_with("heartbeat-")
        }

        async fn run(&self, request: &RecoveryRequest) -> Result<OperationOutput> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SentinelError::Strategy {
                    strategy: "counting".into(),
                    message: format!("{} refused", request.key),
                });
            }
            Ok(OperationOutput::default())
        }
    }

    #[derive(Default)]
    struct RecordingSink(std::sync::Mutex<Vec<Notification>>);

    impl NotificationSink for RecordingSink {
        fn enqueue(&self, n: Notification) {
            self.0.lock().unwrap().push(n);
        }
    }

    impl RecordingSink {
        fn kinds(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|n| n.kind.clone()).collect()
        }
    }

    fn no_jitter(max_attempts: u32) -> RecoveryPolicy {
        RecoveryPolicy {
            max_attempts,
            base_backoff_ms: 1000,
            jitter: 0.0,
            ..Default::default()
        }
    }

    fn manager(
        policy: RecoveryPolicy,
        strategy: Arc<CountingStrategy>,
        sink: Arc<RecordingSink>,
    ) -> AutoRecoveryManager {
        AutoRecoveryManager::builder(policy)
            .strategy(strategy)
            .notifier(sink)
            .build()
            .unwrap()
    }

    fn heartbeat_request() -> RecoveryRequest {
        RecoveryRequest::new("heartbeat", "heartbeat-stale")
    }

    async fn let_timers_fire() {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }

    #[test]
    fn test_backoff_is_exponential_within_jitter() {
        let base = Duration::from_millis(2000);
        assert_eq!(scaled_backoff(base, 0, 1.0), Duration::from_millis(2000));
        assert_eq!(scaled_backoff(base, 3, 1.0), Duration::from_millis(16000));
        assert_eq!(scaled_backoff(base, 1, 0.75), Duration::from_millis(3000));

        let policy = RecoveryPolicy::default();
        for attempts in 0..5u32 {
            let nominal = 2000.0 * 2f64.powi(attempts as i32);
            for _ in 0..50 {
                let ms = backoff_delay(&policy, attempts).as_millis() as f64;
                assert!(ms >= (nominal * 0.75).floor() && ms <= (nominal * 1.25).ceil(), "{ms}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_reason_is_ignored() {
        let strategy = CountingStrategy::new(false);
        let m = manager(no_jitter(5), strategy.clone(), Arc::default());

        let outcome = m.recover(RecoveryRequest::new("evidence", "evidence-stale")).await;
        assert_eq!(outcome, RecoveryOutcome::Ignored);
        assert_eq!(m.pending_count().await, 0);
        assert_eq!(m.stats().ignored, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_action_runs_after_delay() {
        let strategy = CountingStrategy::new(false);
        let sink = Arc::new(RecordingSink::default());
        let m = manager(no_jitter(5), strategy.clone(), sink.clone());

        let outcome = m.recover(heartbeat_request()).await;
        assert_eq!(
            outcome,
            RecoveryOutcome::Scheduled {
                delay: Duration::from_millis(1000)
            }
        );
        assert!(m.has_pending("heartbeat").await);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(strategy.runs(), 0);
        assert_eq!(m.attempts("heartbeat").await, 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(strategy.runs(), 1);
        assert_eq!(m.attempts("heartbeat").await, 1);
        assert!(m.last_attempt_at("heartbeat").await.is_some());
        assert!(!m.has_pending("heartbeat").await);
        assert_eq!(sink.kinds(), vec!["auto_recovery_info"]);

        // Second tier doubles the delay
        let outcome = m.recover(heartbeat_request()).await;
        assert_eq!(
            outcome,
            RecoveryOutcome::Scheduled {
                delay: Duration::from_millis(2000)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_supersedes_pending_timer() {
        let strategy = CountingStrategy::new(false);
        let m = manager(no_jitter(5), strategy.clone(), Arc::default());

        m.recover(heartbeat_request()).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        m.recover(heartbeat_request()).await;
        assert_eq!(m.pending_count().await, 1);

        let_timers_fire().await;
        assert_eq!(strategy.runs(), 1);
        assert_eq!(m.attempts("heartbeat").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_capped() {
        let strategy = CountingStrategy::new(false);
        let sink = Arc::new(RecordingSink::default());
        let m = manager(no_jitter(3), strategy.clone(), sink.clone());

        for _ in 0..3 {
            assert!(matches!(
                m.recover(heartbeat_request()).await,
                RecoveryOutcome::Scheduled { .. }
            ));
            let_timers_fire().await;
        }
        assert_eq!(strategy.runs(), 3);

        for _ in 0..2 {
            assert_eq!(m.recover(heartbeat_request()).await, RecoveryOutcome::Skipped);
            assert!(!m.has_pending("heartbeat").await);
        }
        let_timers_fire().await;
        assert_eq!(strategy.runs(), 3);
        assert_eq!(sink.kinds().last().map(String::as_str), Some("auto_recovery_warn"));

        // Keys are independent
        assert!(matches!(
            m.recover(RecoveryRequest::new("other", "heartbeat-missing")).await,
            RecoveryOutcome::Scheduled { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_and_resets() {
        let strategy = CountingStrategy::new(false);
        let m = manager(no_jitter(1), strategy.clone(), Arc::default());

        m.recover(heartbeat_request()).await;
        let_timers_fire().await;
        assert_eq!(m.recover(heartbeat_request()).await, RecoveryOutcome::Skipped);

        assert!(m.clear("heartbeat").await);
        assert_eq!(m.attempts("heartbeat").await, 0);

        m.recover(heartbeat_request()).await;
        assert!(m.clear("heartbeat").await);
        let_timers_fire().await;
        assert_eq!(strategy.runs(), 1);
        assert!(!m.clear("heartbeat").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_action_is_not_retried() {
        let strategy = CountingStrategy::new(true);
        let sink = Arc::new(RecordingSink::default());
        let m = manager(no_jitter(5), strategy.clone(), sink.clone());

        m.recover(heartbeat_request()).await;
        let_timers_fire().await;
        let_timers_fire().await;

        assert_eq!(strategy.runs(), 1);
        assert_eq!(m.attempts("heartbeat").await, 1);
        assert_eq!(m.pending_count().await, 0);
        assert_eq!(sink.kinds(), vec!["auto_recovery_error"]);
        assert_eq!(m.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_skips_action() {
        let strategy = CountingStrategy::new(false);
        let sink = Arc::new(RecordingSink::default());
        let m = manager(no_jitter(5), strategy.clone(), sink.clone());
        m.breaker().force_open().await;

        m.recover(heartbeat_request()).await;
        let_timers_fire().await;

        assert_eq!(strategy.runs(), 0);
        assert_eq!(m.attempts("heartbeat").await, 1);
        assert_eq!(sink.kinds(), vec!["auto_recovery_error"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending() {
        let strategy = CountingStrategy::new(false);
        let m = manager(no_jitter(5), strategy.clone(), Arc::default());

        m.recover(heartbeat_request()).await;
        m.recover(RecoveryRequest::new("other", "heartbeat-missing")).await;
        assert_eq!(m.pending_count().await, 2);

        m.shutdown().await;
        let_timers_fire().await;
        assert_eq!(strategy.runs(), 0);
        assert_eq!(m.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected() {
        let result = AutoRecoveryManager::builder(RecoveryPolicy {
            jitter: 2.0,
            ..Default::default()
        })
        .build();
        assert!(matches!(result, Err(SentinelError::Policy(_))));
    }

    #[tokio::test]
    async fn test_default_strategy_is_supervisor_restart() {
        let m = AutoRecoveryManager::builder(RecoveryPolicy::default())
            .build()
            .unwrap();
        let strategies = m.shared.strategies.read().await;
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].id(), SupervisorRestartStrategy::ID);
        assert!(strategies[0].matches("heartbeat-stale", &Value::Null));
        assert!(!strategies[0].matches("evidence-stale", &Value::Null));
    }
}
