//! hookguard Sentinel: self-healing for the guard
//!
//! The sentinel keeps the guard's inputs trustworthy and its processes alive:
//!
//! - [`FreshnessMonitor`] keeps the evidence artifact younger than a threshold,
//!   refreshing it through an external script (single-flight).
//! - [`HeartbeatWatcher`] polls the supervisor heartbeat and publishes
//!   `heartbeat-degraded` when it goes bad.
//! - [`AutoRecoveryManager`] turns failure signals into delayed, capped,
//!   breaker-guarded remediations with exponential backoff and jitter.
//! - [`NotificationCenter`] throttles what reaches the operator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  heartbeat-degraded   ┌──────────┐  recover()  ┌──────────────┐
//! │  Heartbeat  │──────────────────────>│ EventBus │────────────>│ AutoRecovery │
//! │  Watcher    │                       └────┬─────┘             │ Manager      │
//! └─────────────┘                            │                   └──────┬───────┘
//!                                            │ evidence-stale           │ breaker
//! ┌─────────────┐                            │                          v
//! │  Freshness  │────────────────────────────┘                   restart script
//! │  Monitor    │──breaker──> update-evidence script
//! └─────────────┘
//!        │ notifications
//!        v
//! ┌─────────────────────┐
//! │ NotificationCenter  │──> drained by the host loop
//! └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hookguard_sentinel::{AutoRecoveryManager, RecoveryPolicy, RecoveryRequest};
//!
//! # tokio_test::block_on(async {
//! let medic = AutoRecoveryManager::builder(RecoveryPolicy::default()).build()?;
//! let outcome = medic
//!     .recover(RecoveryRequest::new("heartbeat", "heartbeat-stale"))
//!     .await;
//! println!("{:?}", outcome);
//! # Ok::<(), hookguard_sentinel::SentinelError>(())
//! # }).unwrap();
//! ```

pub mod daemon;
pub mod error;
pub mod freshness;
pub mod heartbeat;
pub mod medic;
pub mod metrics;
pub mod notify;
pub mod operation;
pub mod policy;

pub use daemon::{HeartbeatWatcher, HEARTBEAT_RECOVERY_KEY};
pub use error::{Result, SentinelError};
pub use freshness::{
    ArtifactState, FreshnessBuilder, FreshnessMonitor, FreshnessReport, RefreshOutcome,
    RefreshRequest, SkipReason, EVIDENCE_UPDATE_SCRIPT,
};
pub use heartbeat::{HeartbeatProbe, HeartbeatReason, HeartbeatReport};
pub use medic::{
    backoff_delay, AutoRecoveryBuilder, AutoRecoveryManager, RecoveryOutcome, RecoveryRequest,
    RecoveryStrategy, SupervisorRestartStrategy,
};
pub use metrics::{RecoveryStats, WatchStats};
pub use notify::{
    EnqueueOutcome, Notification, NotificationCenter, NotificationLevel, NotificationSink,
    NotificationStats, NullSink, TracingSink,
};
pub use operation::{ExternalOperation, OperationOutput, ScriptOperation, SCRIPT_DIRS};
pub use policy::{
    FreshnessPolicy, HeartbeatPolicy, NotificationPolicy, RecoveryPolicy,
    DEFAULT_EVIDENCE_ARTIFACT, DEFAULT_HEARTBEAT_PATH, DEFAULT_RESTART_SCRIPT,
};
