//! Evidence freshness monitor
//!
//! The evidence artifact (`.AI_EVIDENCE.json`) carries a `timestamp`. When it
//! is missing, unreadable, or older than the threshold, the monitor runs the
//! refresh script. Refreshes are single-flight: a call made while another is
//! running returns [`RefreshOutcome::Skipped`] instead of queueing.

use crate::error::{Result, SentinelError};
use crate::notify::{Notification, NotificationLevel, NotificationSink, TracingSink};
use crate::operation::ExternalOperation;
use crate::policy::FreshnessPolicy;
use chrono::{DateTime, NaiveDateTime, Utc};
use hookguard_core_resilience::{
    system_clock, CircuitBreaker, CircuitBreakerConfig, Clock, ResilienceError, SharedClock,
};
use hookguard_events::{EventBus, GuardEvent};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Script that regenerates the evidence artifact
pub const EVIDENCE_UPDATE_SCRIPT: &str = "update-evidence.sh";

/// What was found on disk
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactState {
    Missing,
    Unreadable(String),
    Present {
        timestamp: Option<String>,
        payload: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub reason: String,
    /// Overrides the policy's platforms
    pub platforms: Option<Vec<String>>,
}

impl RefreshRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            platforms: None,
        }
    }

    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = Some(platforms);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed,
    Skipped { reason: SkipReason },
}

/// Result of [`FreshnessMonitor::ensure_fresh`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreshnessReport {
    /// A refresh was requested (it may still have been skipped, see `outcome`)
    pub refreshed: bool,
    pub reason: String,
    /// `None` when the artifact or its timestamp is unusable
    pub age_seconds: Option<u64>,
    pub outcome: Option<RefreshOutcome>,
}

/// RFC 3339, or an ISO-8601 date-time without offset read as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Clears the in-flight flag however the refresh ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    policy: FreshnessPolicy,
    artifact: PathBuf,
    operation: Arc<dyn ExternalOperation>,
    breaker: CircuitBreaker,
    notifier: Arc<dyn NotificationSink>,
    bus: Option<EventBus>,
    clock: SharedClock,
    in_progress: AtomicBool,
}

impl Inner {
    fn read_artifact(&self) -> ArtifactState {
        let raw = match fs::read_to_string(&self.artifact) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return ArtifactState::Missing,
            Err(e) => {
                warn!(path = %self.artifact.display(), error = %e, "evidence read failed");
                return ArtifactState::Unreadable(e.to_string());
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(payload) => ArtifactState::Present {
                timestamp: payload
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                payload,
            },
            Err(e) => {
                warn!(path = %self.artifact.display(), error = %e, "evidence is not valid JSON");
                ArtifactState::Unreadable(e.to_string())
            }
        }
    }

    fn age_seconds(&self, timestamp: Option<&str>) -> Option<i64> {
        let parsed = parse_timestamp(timestamp?)?;
        Some(self.clock.now().signed_duration_since(parsed).num_seconds())
    }

    fn is_stale(&self, timestamp: Option<&str>) -> bool {
        match self.age_seconds(timestamp) {
            Some(age) => age > self.policy.threshold_seconds as i64,
            None => true,
        }
    }

    fn notify(&self, message: String, level: NotificationLevel, metadata: Value) {
        self.notifier.enqueue(
            Notification::new(message, level, format!("evidence_{}", level)).with_metadata(metadata),
        );
    }

    async fn ensure_fresh(&self, reason: &str) -> Result<FreshnessReport> {
        let (stale, age) = match self.read_artifact() {
            ArtifactState::Present { timestamp, .. } => {
                let age = self.age_seconds(timestamp.as_deref());
                (self.is_stale(timestamp.as_deref()), age)
            }
            ArtifactState::Missing | ArtifactState::Unreadable(_) => (true, None),
        };
        let age_seconds = age.map(|a| a.max(0) as u64);

        if !stale {
            debug!(reason, age_seconds, "evidence is fresh");
            return Ok(FreshnessReport {
                refreshed: false,
                reason: reason.to_string(),
                age_seconds,
                outcome: None,
            });
        }

        info!(reason, age_seconds, "🕰️  Evidence is stale, refreshing");
        if let Some(bus) = &self.bus {
            let event = GuardEvent::EvidenceStale {
                age_seconds,
                source: reason.to_string(),
            };
            if let Err(e) = bus.emit(event).await {
                warn!(error = %e, "evidence-stale delivery failed");
            }
        }

        let outcome = self.refresh(RefreshRequest::new(reason)).await?;
        Ok(FreshnessReport {
            refreshed: true,
            reason: reason.to_string(),
            age_seconds,
            outcome: Some(outcome),
        })
    }

    async fn refresh(&self, request: RefreshRequest) -> Result<RefreshOutcome> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(reason = %request.reason, "evidence refresh already in progress");
            return Ok(RefreshOutcome::Skipped {
                reason: SkipReason::InProgress,
            });
        }
        let _in_flight = InFlight(&self.in_progress);

        let platforms = request
            .platforms
            .unwrap_or_else(|| self.policy.platforms.clone());
        let args = vec![
            "--auto".to_string(),
            "--platforms".to_string(),
            platforms.join(","),
        ];
        info!(reason = %request.reason, platforms = %platforms.join(","), "🔄 Evidence refresh started");

        let (operation, args) = (&self.operation, &args);
        let result = self
            .breaker
            .call(move || async move {
                operation.run(args).await.map_err(ResilienceError::dependency)
            })
            .await;

        match result {
            Ok(output) => {
                info!(reason = %request.reason, output = %output.stdout.trim(), "✅ Evidence refresh completed");
                self.notify(
                    format!("AI evidence refreshed ({})", request.reason),
                    NotificationLevel::Info,
                    json!({ "reason": request.reason, "platforms": platforms }),
                );
                Ok(RefreshOutcome::Refreshed)
            }
            Err(e) => {
                error!(reason = %request.reason, error = %e, "❌ Evidence refresh failed");
                self.notify(
                    format!("AI evidence refresh failed: {}", e),
                    NotificationLevel::Error,
                    json!({ "reason": request.reason }),
                );
                Err(SentinelError::from(e))
            }
        }
    }
}

/// Builder for [`FreshnessMonitor`]
pub struct FreshnessBuilder {
    policy: FreshnessPolicy,
    operation: Arc<dyn ExternalOperation>,
    artifact: Option<PathBuf>,
    breaker: Option<CircuitBreaker>,
    notifier: Option<Arc<dyn NotificationSink>>,
    bus: Option<EventBus>,
    clock: Option<SharedClock>,
}

impl FreshnessBuilder {
    /// Artifact location; defaults to `policy.artifact`
    pub fn artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact = Some(path.into());
        self
    }

    /// Defaults to a breaker named `refresh` whose call timeout is the refresh timeout
    pub fn breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Publish `evidence-stale` on this bus
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<FreshnessMonitor> {
        self.policy.validate().map_err(SentinelError::Policy)?;

        let clock = self.clock.unwrap_or_else(system_clock);
        let breaker = self.breaker.unwrap_or_else(|| {
            let config = CircuitBreakerConfig {
                call_timeout: self.policy.refresh_timeout(),
                ..Default::default()
            };
            CircuitBreaker::with_clock("refresh", config, clock.clone())
        });

        Ok(FreshnessMonitor {
            inner: Arc::new(Inner {
                artifact: self.artifact.unwrap_or_else(|| self.policy.artifact.clone()),
                policy: self.policy,
                operation: self.operation,
                breaker,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingSink)),
                bus: self.bus,
                clock,
                in_progress: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        })
    }
}

/// Periodic and on-demand staleness check with single-flight refresh
pub struct FreshnessMonitor {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for FreshnessMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshnessMonitor")
            .field("artifact", &self.inner.artifact)
            .field("threshold_seconds", &self.inner.policy.threshold_seconds)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl FreshnessMonitor {
    pub fn builder(policy: FreshnessPolicy, operation: Arc<dyn ExternalOperation>) -> FreshnessBuilder {
        FreshnessBuilder {
            policy,
            operation,
            artifact: None,
            breaker: None,
            notifier: None,
            bus: None,
            clock: None,
        }
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.inner.policy
    }

    pub fn artifact_path(&self) -> &Path {
        &self.inner.artifact
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    pub fn read_artifact(&self) -> ArtifactState {
        self.inner.read_artifact()
    }

    /// Missing or unparseable timestamps are always stale
    pub fn is_stale(&self, timestamp: Option<&str>) -> bool {
        self.inner.is_stale(timestamp)
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_progress.load(Ordering::Acquire)
    }

    /// Refresh if the artifact is missing or stale
    ///
    /// Errors are those of the refresh itself.
    pub async fn ensure_fresh(&self, reason: &str) -> Result<FreshnessReport> {
        self.inner.ensure_fresh(reason).await
    }

    pub async fn refresh(&self, request: RefreshRequest) -> Result<RefreshOutcome> {
        self.inner.refresh(request).await
    }

    /// Check now, then every `interval_ms` if configured
    ///
    /// Runs in a background task; failures are logged. Calling `start` again
    /// replaces the running task. Must be called within a tokio runtime.
    pub fn start(&self, reason: &str) {
        self.stop();

        let inner = Arc::downgrade(&self.inner);
        let period = self.inner.policy.interval();
        let reason = reason.to_string();

        let handle = tokio::spawn(async move {
            let Some(monitor) = inner.upgrade() else {
                return;
            };
            let _ = spawn_check(monitor, reason).await;

            let Some(period) = period else {
                return;
            };
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(monitor) = inner.upgrade() else {
                    break;
                };
                let _ = spawn_check(monitor, "interval".to_string()).await;
            }
        });

        *self.lock_task() = Some(handle);
        info!(
            artifact = %self.inner.artifact.display(),
            interval_ms = self.inner.policy.interval_ms,
            "👀 Evidence freshness monitor started"
        );
    }

    /// Cancel the schedule. A refresh already running is left to finish.
    ///
    /// Returns false if no schedule was running.
    pub fn stop(&self) -> bool {
        match self.lock_task().take() {
            Some(handle) => {
                handle.abort();
                debug!("evidence freshness monitor stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One check in its own task, so cancelling the schedule never kills a
/// refresh script halfway through writing the artifact
fn spawn_check(monitor: Arc<Inner>, reason: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = monitor.ensure_fresh(&reason).await {
            error!(error = %e, reason = %reason, "evidence refresh failed");
        }
    })
}

impl Drop for FreshnessMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}
