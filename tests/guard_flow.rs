//! End-to-end flows through the assembled guard
//!
//! Scenarios:
//! 1. Detector events move the persisted lifecycle, and a rebuilt guard picks
//!    the state back up from disk.
//! 2. A missing heartbeat degrades the guard, the supervisor restart runs once,
//!    and the lifecycle comes back to `active`.
//! 3. Rejected transitions surface as validation errors with exit code 3.
//! 4. `status` reports lifecycle, evidence and breakers.

use async_trait::async_trait;
use hookguard::error::{ErrorKind, EXIT_REJECTED};
use hookguard::events::GuardEvent;
use hookguard::lifecycle::{LifecycleEvent, LifecycleState};
use hookguard::resilience::{Clock, ManualClock, SharedClock};
use hookguard::sentinel::{ExternalOperation, OperationOutput, RefreshOutcome, RefreshRequest};
use hookguard::{Guard, GuardConfig};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Writes a file with a fresh timestamp each time it runs
struct WriteFile {
    path: PathBuf,
    body: fn(&str) -> serde_json::Value,
    clock: SharedClock,
    runs: AtomicUsize,
    args: Mutex<Vec<Vec<String>>>,
}

impl WriteFile {
    fn new(path: PathBuf, body: fn(&str) -> serde_json::Value, clock: SharedClock) -> Arc<Self> {
        Arc::new(Self {
            path,
            body,
            clock,
            runs: AtomicUsize::new(0),
            args: Mutex::new(Vec::new()),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalOperation for WriteFile {
    async fn run(&self, args: &[String]) -> hookguard::sentinel::Result<OperationOutput> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.args.lock().unwrap().push(args.to_vec());
        let body = (self.body)(&self.clock.now().to_rfc3339());
        std::fs::create_dir_all(self.path.parent().unwrap()).unwrap();
        std::fs::write(&self.path, body.to_string()).unwrap();
        Ok(OperationOutput::default())
    }

    fn describe(&self) -> String {
        format!("write {}", self.path.display())
    }
}

fn evidence(timestamp: &str) -> serde_json::Value {
    json!({ "timestamp": timestamp, "platforms": {} })
}

fn heartbeat(timestamp: &str) -> serde_json::Value {
    json!({
        "timestamp": timestamp,
        "status": "healthy",
        "guard": { "running": true },
        "tokenMonitor": { "running": true }
    })
}

struct Fixture {
    dir: TempDir,
    clock: Arc<ManualClock>,
    restart: Arc<WriteFile>,
    refresh: Arc<WriteFile>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let config = GuardConfig::default().resolve_paths(dir.path());
        let restart = WriteFile::new(config.heartbeat.path.clone(), heartbeat, clock.clone());
        let refresh = WriteFile::new(config.freshness.artifact.clone(), evidence, clock.clone());
        Self {
            dir,
            clock,
            restart,
            refresh,
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    async fn guard(&self, config: GuardConfig) -> Guard {
        Guard::builder(config, self.root())
            .clock(self.clock.clone())
            .restart_operation(self.restart.clone())
            .refresh_operation(self.refresh.clone())
            .build()
            .await
            .unwrap()
    }
}

fn without_heartbeat() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.heartbeat.max_age_ms = 0;
    config
}

#[tokio::test]
async fn test_lifecycle_follows_detectors_and_survives_restart() {
    let fixture = Fixture::new();

    {
        let guard = fixture.guard(without_heartbeat()).await;
        assert_eq!(guard.state().await, LifecycleState::Idle);
        assert_eq!(guard.start().await.unwrap(), LifecycleState::Active);

        guard
            .publish(GuardEvent::CommitBlocked {
                reason: "secrets in diff".into(),
                violations: 2,
            })
            .await
            .unwrap();
        assert_eq!(guard.state().await, LifecycleState::Blocked);

        // Findings left: stays blocked
        guard
            .publish(GuardEvent::AnalysisCompleted {
                files_analyzed: 12,
                violations: 1,
            })
            .await
            .unwrap();
        assert_eq!(guard.state().await, LifecycleState::Blocked);

        guard
            .publish(GuardEvent::AnalysisCompleted {
                files_analyzed: 12,
                violations: 0,
            })
            .await
            .unwrap();
        assert_eq!(guard.state().await, LifecycleState::Active);

        let kinds: Vec<String> = guard
            .drain_notifications()
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert!(kinds.contains(&"commit_blocked".to_string()));

        assert_eq!(guard.shutdown().await.unwrap(), LifecycleState::Stopped);
    }

    assert!(fixture.root().join(".audit_tmp/guard-lifecycle.json").is_file());

    let guard = fixture.guard(without_heartbeat()).await;
    assert_eq!(guard.state().await, LifecycleState::Stopped);
    assert_eq!(guard.start().await.unwrap(), LifecycleState::Active);
    guard.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_missing_heartbeat_restarts_the_supervisor() {
    let fixture = Fixture::new();
    let guard = fixture.guard(GuardConfig::default()).await;

    guard.start().await.unwrap();
    assert!(!fixture.restart.path.exists());

    // First poll sees no heartbeat, the restart fires after its backoff and
    // writes a healthy heartbeat that later polls pick up
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(fixture.restart.runs(), 1);
    assert_eq!(guard.state().await, LifecycleState::Active);

    let status = guard.status().await;
    assert!(status.heartbeat.healthy);
    assert_eq!(status.recovery.succeeded, 1);
    assert_eq!(status.heartbeat_watch.degraded_signals, 1);
    assert!(!guard.medic().has_pending("heartbeat").await);

    let kinds: Vec<String> = guard
        .drain_notifications()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert!(kinds.contains(&"heartbeat_degraded".to_string()));
    assert!(kinds.contains(&"auto_recovery_info".to_string()));

    guard.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rejected_transition_is_a_validation_error() {
    let fixture = Fixture::new();
    let guard = fixture.guard(without_heartbeat()).await;

    let err = tokio_test::assert_err!(guard.transition(LifecycleEvent::Unblock).await);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.exit_code(), EXIT_REJECTED);
    assert_eq!(guard.state().await, LifecycleState::Idle);

    // Events that do not apply in the current state are not errors
    guard
        .publish(GuardEvent::CommitBlocked {
            reason: "lint".into(),
            violations: 1,
        })
        .await
        .unwrap();
    assert_eq!(guard.state().await, LifecycleState::Idle);
}

#[tokio::test]
async fn test_status_and_manual_refresh() {
    let fixture = Fixture::new();
    let guard = fixture.guard(without_heartbeat()).await;

    let status = serde_json::to_value(guard.status().await).unwrap();
    assert_eq!(status["state"], "idle");
    assert_eq!(status["evidence"]["present"], false);
    assert_eq!(status["evidence"]["stale"], true);
    assert_eq!(status["heartbeat"]["reason"], "disabled");
    let mut breakers: Vec<String> = status["breakers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap().to_string())
        .collect();
    breakers.sort();
    assert_eq!(breakers, vec!["recovery", "refresh"]);

    let outcome = tokio_test::assert_ok!(
        guard
            .refresh(RefreshRequest::new("manual").with_platforms(vec!["2".into()]))
            .await
    );
    assert_eq!(outcome, RefreshOutcome::Refreshed);
    assert_eq!(
        fixture.refresh.args.lock().unwrap().last().unwrap(),
        &vec!["--auto".to_string(), "--platforms".to_string(), "2".to_string()]
    );

    let status = guard.status().await;
    assert!(status.evidence.present);
    assert!(!status.evidence.stale);

    fixture.clock.advance(Duration::from_secs(181));
    assert!(guard.status().await.evidence.stale);
    let report = guard.ensure_fresh("manual").await.unwrap();
    assert!(report.refreshed);
    assert_eq!(report.age_seconds, Some(181));
}
