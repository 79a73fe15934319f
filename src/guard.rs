//! The guard: composition root for the resilience core
//!
//! [`Guard`] owns one instance of every component and wires them together:
//!
//! ```text
//!                   ┌──────────────────────── EventBus ─────────────────────────┐
//!                   │                                                           │
//!  HeartbeatWatcher ┼─> heartbeat-degraded ─┬─> LifecycleReactor ─> state file  │
//!  FreshnessMonitor ┼─> evidence-stale      ├─> RecoveryReactor ──> AutoRecovery┼─> recovery-*
//!  detectors ───────┼─> findings, blocks    └─> NotificationReactor ─> center   │
//!                   └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is global: two guards on two repositories do not share state.

use crate::config::GuardConfig;
use crate::error::Result;
use crate::reactors::{LifecycleReactor, NotificationReactor, RecoveryReactor};
use chrono::{DateTime, Utc};
use hookguard_core_resilience::{
    system_clock, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, SharedClock,
};
use hookguard_events::{
    BusStats, DomainEvent, EventBus, EventType, GuardEvent, Subscription, Topic,
};
use hookguard_lifecycle::{
    JsonFileStore, LifecycleEvent, LifecycleState, LifecycleStateMachine, PersistenceStore,
    Transition, TransitionTable,
};
use hookguard_sentinel::{
    ArtifactState, AutoRecoveryManager, ExternalOperation, FreshnessMonitor, FreshnessReport,
    HeartbeatProbe, HeartbeatReport, HeartbeatWatcher, Notification, NotificationCenter,
    NotificationStats, RecoveryStats, RefreshOutcome, RefreshRequest, ScriptOperation,
    SupervisorRestartStrategy, WatchStats, EVIDENCE_UPDATE_SCRIPT,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Evidence artifact as seen by `status`
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceStatus {
    pub artifact: PathBuf,
    pub present: bool,
    pub timestamp: Option<String>,
    pub stale: bool,
    pub refreshing: bool,
}

/// Snapshot of everything the guard knows about itself
#[derive(Debug, Clone, Serialize)]
pub struct GuardStatus {
    pub state: LifecycleState,
    pub updated_at: DateTime<Utc>,
    pub evidence: EvidenceStatus,
    pub heartbeat: HeartbeatReport,
    pub breakers: Vec<CircuitSnapshot>,
    pub bus: BusStats,
    pub recovery: RecoveryStats,
    pub heartbeat_watch: WatchStats,
    pub notifications: NotificationStats,
}

/// Builder for [`Guard`]; the overrides exist for embedding and tests
pub struct GuardBuilder {
    config: GuardConfig,
    repo_root: PathBuf,
    clock: Option<SharedClock>,
    store: Option<Arc<dyn PersistenceStore>>,
    restart: Option<Arc<dyn ExternalOperation>>,
    refresh: Option<Arc<dyn ExternalOperation>>,
}

impl GuardBuilder {
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Lifecycle store; defaults to JSON files under `storage.state_dir`
    pub fn store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Supervisor restart operation; defaults to `recovery.restart_script`
    pub fn restart_operation(mut self, operation: Arc<dyn ExternalOperation>) -> Self {
        self.restart = Some(operation);
        self
    }

    /// Evidence refresh operation; defaults to `freshness.update_script` or
    /// `update-evidence.sh` found under the repository's script directories
    pub fn refresh_operation(mut self, operation: Arc<dyn ExternalOperation>) -> Self {
        self.refresh = Some(operation);
        self
    }

    pub async fn build(self) -> Result<Guard> {
        self.config.validate()?;
        let config = self.config.resolve_paths(&self.repo_root);
        let repo_root = self.repo_root;
        let clock = self.clock.unwrap_or_else(system_clock);

        let bus = EventBus::new(config.bus.clone());

        let store: Arc<dyn PersistenceStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::new(&config.storage.state_dir)),
        };
        let lifecycle = LifecycleStateMachine::load(
            store,
            TransitionTable::guard_default(),
            config.lifecycle.clone(),
            clock.clone(),
        )?;
        let lifecycle = Arc::new(Mutex::new(lifecycle));

        let notifications = Arc::new(NotificationCenter::with_clock(
            config.notifications.clone(),
            clock.clone(),
        ));

        let breakers = CircuitBreakerRegistry::new(clock.clone());
        let recovery_breaker = breakers.get("recovery", config.breaker.to_config()).await;
        let refresh_breaker = breakers
            .get(
                "refresh",
                CircuitBreakerConfig {
                    call_timeout: config.freshness.refresh_timeout(),
                    ..config.breaker.to_config()
                },
            )
            .await;

        let restart: Arc<dyn ExternalOperation> = match self.restart {
            Some(operation) => operation,
            None => Arc::new(ScriptOperation::new(&config.recovery.restart_script).in_dir(&repo_root)),
        };
        let medic = AutoRecoveryManager::builder(config.recovery.clone())
            .strategy(Arc::new(SupervisorRestartStrategy::new(restart)))
            .breaker(recovery_breaker)
            .notifier(notifications.clone())
            .bus(bus.clone())
            .clock(clock.clone())
            .build()?;

        let refresh: Arc<dyn ExternalOperation> = match (self.refresh, &config.freshness.update_script) {
            (Some(operation), _) => operation,
            (None, Some(script)) => Arc::new(ScriptOperation::new(script).in_dir(&repo_root)),
            (None, None) => Arc::new(ScriptOperation::resolve(&repo_root, EVIDENCE_UPDATE_SCRIPT)),
        };
        let freshness = FreshnessMonitor::builder(config.freshness.clone(), refresh)
            .breaker(refresh_breaker)
            .notifier(notifications.clone())
            .bus(bus.clone())
            .clock(clock.clone())
            .build()?;

        let probe = HeartbeatProbe::with_path(
            config.heartbeat.clone(),
            config.heartbeat.path.clone(),
            clock.clone(),
        );
        let watcher = HeartbeatWatcher::with_clock(probe, bus.clone(), clock.clone())
            .with_medic(medic.clone());

        let subscriptions = vec![
            bus.subscribe(Topic::All, Arc::new(LifecycleReactor::new(lifecycle.clone())))
                .await,
            bus.subscribe(
                Topic::Only(EventType::HeartbeatDegraded),
                Arc::new(RecoveryReactor::new(medic.clone(), config.heartbeat.clone())),
            )
            .await,
            bus.subscribe(Topic::All, Arc::new(NotificationReactor::new(notifications.clone())))
                .await,
        ];

        Ok(Guard {
            config,
            repo_root,
            bus,
            lifecycle,
            breakers,
            medic,
            freshness,
            watcher,
            notifications,
            subscriptions: Mutex::new(subscriptions),
        })
    }
}

pub struct Guard {
    config: GuardConfig,
    repo_root: PathBuf,
    bus: EventBus,
    lifecycle: Arc<Mutex<LifecycleStateMachine>>,
    breakers: CircuitBreakerRegistry,
    medic: AutoRecoveryManager,
    freshness: FreshnessMonitor,
    watcher: HeartbeatWatcher,
    notifications: Arc<NotificationCenter>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field("repo_root", &self.repo_root)
            .field("freshness", &self.freshness)
            .finish_non_exhaustive()
    }
}

impl Guard {
    pub fn builder(config: GuardConfig, repo_root: impl Into<PathBuf>) -> GuardBuilder {
        GuardBuilder {
            config,
            repo_root: repo_root.into(),
            clock: None,
            store: None,
            restart: None,
            refresh: None,
        }
    }

    /// Configuration with paths resolved against the repository root
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn medic(&self) -> &AutoRecoveryManager {
        &self.medic
    }

    pub fn freshness(&self) -> &FreshnessMonitor {
        &self.freshness
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    /// Bring the guard up: lifecycle `start`, evidence check, heartbeat polling
    ///
    /// A guard left `stopped` by a previous run is reset first.
    pub async fn start(&self) -> Result<LifecycleState> {
        let state = {
            let mut machine = self.lifecycle.lock().await;
            if machine.get_state() == LifecycleState::Stopped {
                machine.transition(LifecycleEvent::Reset)?;
            }
            machine.apply_if_allowed(LifecycleEvent::Start)?;
            machine.get_state()
        };

        self.freshness.start("startup");
        let watching = self.watcher.start();

        info!(
            "🛡️  Guard active | State: {} | Repo: {} | Heartbeat watch: {}",
            state,
            self.repo_root.display(),
            if watching { "on" } else { "off" }
        );
        Ok(state)
    }

    /// Stop background work, detach the reactors and record the `stopped` state
    ///
    /// Events published afterwards reach no reactor; build a new guard to run again.
    pub async fn shutdown(&self) -> Result<LifecycleState> {
        self.freshness.stop();
        self.watcher.stop();
        self.medic.shutdown().await;

        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().await);
        for subscription in subscriptions {
            subscription.unsubscribe().await;
        }

        let mut machine = self.lifecycle.lock().await;
        machine.apply_if_allowed(LifecycleEvent::Stop)?;
        info!(state = %machine.get_state(), "guard shut down");
        Ok(machine.get_state())
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.lock().await.get_state()
    }

    /// Apply a lifecycle event directly; rejected events are errors
    pub async fn transition(&self, event: LifecycleEvent) -> Result<Transition> {
        Ok(self.lifecycle.lock().await.transition(event)?)
    }

    /// Publish a domain event from a detector or hook
    pub async fn publish(&self, payload: GuardEvent) -> Result<DomainEvent> {
        Ok(self.bus.emit(payload).await?)
    }

    pub async fn ensure_fresh(&self, reason: &str) -> Result<FreshnessReport> {
        Ok(self.freshness.ensure_fresh(reason).await?)
    }

    pub async fn refresh(&self, request: RefreshRequest) -> Result<RefreshOutcome> {
        Ok(self.freshness.refresh(request).await?)
    }

    /// Run one heartbeat check now, with the same effects as a scheduled one
    pub async fn check_heartbeat(&self) -> HeartbeatReport {
        self.watcher.run_check().await
    }

    /// Take pending notifications for delivery
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications.drain()
    }

    pub async fn status(&self) -> GuardStatus {
        let (state, updated_at) = {
            let machine = self.lifecycle.lock().await;
            (machine.get_state(), machine.updated_at())
        };

        let (present, timestamp) = match self.freshness.read_artifact() {
            ArtifactState::Present { timestamp, .. } => (true, timestamp),
            ArtifactState::Missing | ArtifactState::Unreadable(_) => (false, None),
        };
        let evidence = EvidenceStatus {
            artifact: self.freshness.artifact_path().to_path_buf(),
            present,
            stale: self.freshness.is_stale(timestamp.as_deref()),
            timestamp,
            refreshing: self.freshness.is_refreshing(),
        };

        GuardStatus {
            state,
            updated_at,
            evidence,
            heartbeat: self.watcher.probe().evaluate(),
            breakers: self.breakers.snapshot_all().await,
            bus: self.bus.stats().await,
            recovery: self.medic.stats(),
            heartbeat_watch: self.watcher.stats().await,
            notifications: self.notifications.stats(),
        }
    }
}
