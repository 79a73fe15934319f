//! Sentinel Policy Engine
//!
//! Rules and thresholds for auto-recovery, evidence freshness, heartbeat
//! watching and notification throttling. Every policy deserializes with
//! defaults for missing fields and validates before use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default restart script, relative to the repository root
pub const DEFAULT_RESTART_SCRIPT: &str = "scripts/hooks-system/bin/start-guards.sh";

/// Default evidence artifact, relative to the repository root
pub const DEFAULT_EVIDENCE_ARTIFACT: &str = ".AI_EVIDENCE.json";

/// Default heartbeat file, relative to the repository root
pub const DEFAULT_HEARTBEAT_PATH: &str = ".audit_tmp/guard-heartbeat.json";

/// Auto-recovery policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Attempts per key before further requests are skipped
    ///
    /// **Default:** 5
    pub max_attempts: u32,

    /// Delay before the first attempt; doubled for each attempt already made
    ///
    /// **Default:** 2000 ms
    pub base_backoff_ms: u64,

    /// Symmetric jitter as a fraction of the delay, in `[0, 1]`
    ///
    /// **Default:** 0.25 (±25%)
    pub jitter: f64,

    /// Script run by the supervisor-restart strategy
    pub restart_script: PathBuf,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 2000,
            jitter: 0.25,
            restart_script: PathBuf::from(DEFAULT_RESTART_SCRIPT),
        }
    }
}

impl RecoveryPolicy {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }

        if self.base_backoff_ms == 0 {
            return Err("base_backoff_ms must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!("jitter must be within [0, 1], got {}", self.jitter));
        }

        Ok(())
    }
}

/// Evidence freshness policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    /// The artifact whose `timestamp` is checked
    pub artifact: PathBuf,

    /// Age beyond which the artifact is stale
    ///
    /// **Default:** 180 s
    pub threshold_seconds: u64,

    /// Recurring check interval; 0 disables the recurring check
    ///
    /// **Default:** 0
    pub interval_ms: u64,

    /// Platforms passed to the refresh script as `--platforms 1,2,3,4`
    pub platforms: Vec<String>,

    /// Refresh script; resolved from the usual locations when unset
    pub update_script: Option<PathBuf>,

    /// Deadline for one refresh run
    ///
    /// **Default:** 120000 ms
    pub refresh_timeout_ms: u64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            artifact: PathBuf::from(DEFAULT_EVIDENCE_ARTIFACT),
            threshold_seconds: 180,
            interval_ms: 0,
            platforms: default_platforms(),
            update_script: None,
            refresh_timeout_ms: 120_000,
        }
    }
}

pub fn default_platforms() -> Vec<String> {
    ["1", "2", "3", "4"].iter().map(|p| p.to_string()).collect()
}

impl FreshnessPolicy {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.threshold_seconds == 0 {
            return Err("threshold_seconds must be greater than 0".to_string());
        }

        if self.platforms.iter().all(|p| p.trim().is_empty()) {
            return Err("platforms must name at least one platform".to_string());
        }

        if self.refresh_timeout_ms == 0 {
            return Err("refresh_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Heartbeat watch policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatPolicy {
    /// Heartbeat file written by the guard supervisor
    pub path: PathBuf,

    /// Maximum heartbeat age; 0 disables the probe
    ///
    /// **Default:** 60000 ms
    pub max_age_ms: u64,

    /// How often the watcher polls the heartbeat
    ///
    /// **Default:** 5000 ms
    pub poll_interval_ms: u64,

    /// Minimum time between two degraded signals for the same reason
    ///
    /// **Default:** 60000 ms
    pub restart_cooldown_ms: u64,

    /// Reasons that warrant a supervisor restart; `*` matches any
    pub restart_reasons: Vec<String>,

    /// Components that must report `running: true`
    pub required_components: Vec<String>,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_HEARTBEAT_PATH),
            max_age_ms: 60_000,
            poll_interval_ms: 5_000,
            restart_cooldown_ms: 60_000,
            restart_reasons: ["missing", "stale", "invalid", "degraded"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            required_components: vec!["guard".to_string(), "tokenMonitor".to_string()],
        }
    }
}

impl HeartbeatPolicy {
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_ms > 0).then(|| Duration::from_millis(self.max_age_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_millis(self.restart_cooldown_ms)
    }

    /// Whether a degraded heartbeat with `reason` should trigger a restart
    pub fn should_restart(&self, reason: &str) -> bool {
        let reason = reason.trim().to_ascii_lowercase();
        self.restart_reasons.iter().any(|r| {
            let r = r.trim();
            r == "*" || r.eq_ignore_ascii_case(&reason)
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Notification throttling policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPolicy {
    pub enabled: bool,

    /// Pending notifications kept before new ones are dropped
    ///
    /// **Default:** 100
    pub max_queue_size: usize,

    /// Identical notifications within this window are collapsed
    ///
    /// **Default:** 5000 ms
    pub dedup_window_ms: u64,

    /// Cooldown for types without an explicit entry
    ///
    /// **Default:** 60000 ms
    pub default_cooldown_ms: u64,

    /// Per-type cooldowns in milliseconds
    pub cooldowns: BTreeMap<String, u64>,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        let cooldowns = [
            ("evidence_stale", 120_000),
            ("evidence_ok", 300_000),
            ("heartbeat_degraded", 180_000),
            ("heartbeat_ok", 600_000),
            ("guard_supervisor", 900_000),
        ]
        .into_iter()
        .map(|(kind, ms)| (kind.to_string(), ms))
        .collect();

        Self {
            enabled: true,
            max_queue_size: 100,
            dedup_window_ms: 5_000,
            default_cooldown_ms: 60_000,
            cooldowns,
        }
    }
}

impl NotificationPolicy {
    pub fn cooldown_for(&self, kind: &str) -> Duration {
        Duration::from_millis(
            self.cooldowns
                .get(kind)
                .copied()
                .unwrap_or(self.default_cooldown_ms),
        )
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let recovery = RecoveryPolicy::default();
        assert_eq!(recovery.max_attempts, 5);
        assert_eq!(recovery.base_backoff(), Duration::from_secs(2));
        assert_eq!(recovery.jitter, 0.25);
        assert!(recovery.validate().is_ok());

        let freshness = FreshnessPolicy::default();
        assert_eq!(freshness.threshold_seconds, 180);
        assert_eq!(freshness.platforms, vec!["1", "2", "3", "4"]);
        assert_eq!(freshness.interval(), None);
        assert!(freshness.validate().is_ok());

        let heartbeat = HeartbeatPolicy::default();
        assert_eq!(heartbeat.max_age(), Some(Duration::from_secs(60)));
        assert!(heartbeat.validate().is_ok());

        let notifications = NotificationPolicy::default();
        assert_eq!(notifications.cooldown_for("evidence_stale"), Duration::from_secs(120));
        assert_eq!(notifications.cooldown_for("whatever"), Duration::from_secs(60));
        assert!(notifications.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut recovery = RecoveryPolicy::default();

        recovery.max_attempts = 0;
        assert!(recovery.validate().is_err());
        recovery.max_attempts = 5;

        recovery.jitter = 1.5;
        assert!(recovery.validate().is_err());
        recovery.jitter = -0.1;
        assert!(recovery.validate().is_err());
        recovery.jitter = 0.0;
        assert!(recovery.validate().is_ok());

        let freshness = FreshnessPolicy {
            platforms: vec![" ".into()],
            ..Default::default()
        };
        assert!(freshness.validate().is_err());

        let heartbeat = HeartbeatPolicy {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(heartbeat.validate().is_err());
    }

    #[test]
    fn test_restart_reasons() {
        let mut policy = HeartbeatPolicy::default();
        assert!(policy.should_restart("stale"));
        assert!(policy.should_restart("Missing"));
        assert!(!policy.should_restart("error"));

        policy.restart_reasons = vec!["*".into()];
        assert!(policy.should_restart("anything"));

        policy.restart_reasons.clear();
        assert!(!policy.should_restart("stale"));
    }

    #[test]
    fn test_partial_deserialize() {
        let policy: RecoveryPolicy = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_backoff_ms, 2000);
    }
}
