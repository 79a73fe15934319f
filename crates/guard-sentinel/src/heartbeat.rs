//! Heartbeat probe
//!
//! The guard supervisor rewrites a small JSON file while it is alive:
//!
//! ```json
//! { "timestamp": "2024-05-01T10:00:00Z", "status": "healthy",
//!   "guard": { "running": true }, "tokenMonitor": { "running": true } }
//! ```
//!
//! [`HeartbeatProbe::evaluate`] turns that file into a healthy/unhealthy
//! verdict with a reason. Checks run in this order and the first hit wins:
//! disabled, missing, invalid, stale, non-healthy status, degraded components.

use crate::policy::HeartbeatPolicy;
use chrono::{DateTime, Utc};
use hookguard_core_resilience::{system_clock, Clock, SharedClock};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatReason {
    /// `max_age_ms` is zero; always healthy
    Disabled,
    Healthy,
    /// No file, or an empty one
    Missing,
    /// Not JSON, or no parseable timestamp
    Invalid,
    Stale,
    /// Any `status` other than `healthy`, lowercased
    Status(String),
    /// A required component is not running
    Degraded,
    /// The file exists but could not be read
    Error(String),
}

impl HeartbeatReason {
    /// Short reason as used in restart rules and `heartbeat-<reason>` keys
    pub fn as_str(&self) -> &str {
        match self {
            HeartbeatReason::Disabled => "disabled",
            HeartbeatReason::Healthy => "healthy",
            HeartbeatReason::Missing => "missing",
            HeartbeatReason::Invalid => "invalid",
            HeartbeatReason::Stale => "stale",
            HeartbeatReason::Status(status) => status,
            HeartbeatReason::Degraded => "degraded",
            HeartbeatReason::Error(_) => "error",
        }
    }
}

impl fmt::Display for HeartbeatReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HeartbeatReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatReport {
    pub healthy: bool,
    pub reason: HeartbeatReason,
    /// Parsed file contents, when there were any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl HeartbeatReport {
    fn healthy(reason: HeartbeatReason, data: Option<Value>) -> Self {
        Self {
            healthy: true,
            reason,
            data,
        }
    }

    fn unhealthy(reason: HeartbeatReason, data: Option<Value>) -> Self {
        Self {
            healthy: false,
            reason,
            data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeartbeatProbe {
    policy: HeartbeatPolicy,
    path: PathBuf,
    clock: SharedClock,
}

impl HeartbeatProbe {
    /// Reads `policy.path` as given
    pub fn new(policy: HeartbeatPolicy) -> Self {
        let path = policy.path.clone();
        Self::with_path(policy, path, system_clock())
    }

    pub fn with_path(policy: HeartbeatPolicy, path: impl Into<PathBuf>, clock: SharedClock) -> Self {
        Self {
            policy,
            path: path.into(),
            clock,
        }
    }

    pub fn policy(&self) -> &HeartbeatPolicy {
        &self.policy
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn evaluate(&self) -> HeartbeatReport {
        let Some(max_age) = self.policy.max_age() else {
            return HeartbeatReport::healthy(HeartbeatReason::Disabled, None);
        };

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => {
                return HeartbeatReport::unhealthy(HeartbeatReason::Missing, None)
            }
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return HeartbeatReport::unhealthy(HeartbeatReason::Missing, None)
            }
            Err(e) => {
                return HeartbeatReport::unhealthy(HeartbeatReason::Error(e.to_string()), None)
            }
        };

        let Ok(data) = serde_json::from_str::<Value>(&raw) else {
            return HeartbeatReport::unhealthy(HeartbeatReason::Invalid, None);
        };

        let timestamp = data
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc));
        let Some(timestamp) = timestamp else {
            return HeartbeatReport::unhealthy(HeartbeatReason::Invalid, Some(data));
        };

        let age = self.clock.now().signed_duration_since(timestamp);
        trace!(path = %self.path.display(), age_ms = age.num_milliseconds(), "heartbeat read");
        if age.num_milliseconds() > max_age.as_millis() as i64 {
            return HeartbeatReport::unhealthy(HeartbeatReason::Stale, Some(data));
        }

        let status = data
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        if !status.is_empty() && status != "healthy" {
            return HeartbeatReport::unhealthy(HeartbeatReason::Status(status), Some(data));
        }

        let all_running = self.policy.required_components.iter().all(|component| {
            data.get(component)
                .and_then(|c| c.get("running"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        });
        if !all_running {
            return HeartbeatReport::unhealthy(HeartbeatReason::Degraded, Some(data));
        }

        HeartbeatReport::healthy(HeartbeatReason::Healthy, Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookguard_core_resilience::ManualClock;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn probe(policy: HeartbeatPolicy) -> (HeartbeatProbe, TempDir, Arc<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let probe = HeartbeatProbe::with_path(policy, dir.path().join("guard-heartbeat.json"), clock.clone());
        (probe, dir, clock)
    }

    fn beat(probe: &HeartbeatProbe, body: Value) {
        fs::write(probe.path(), body.to_string()).unwrap();
    }

    fn healthy_body(at: DateTime<Utc>) -> Value {
        json!({
            "timestamp": at.to_rfc3339(),
            "status": "healthy",
            "guard": { "running": true },
            "tokenMonitor": { "running": true }
        })
    }

    #[test]
    fn test_disabled_skips_the_file() {
        let (probe, _dir, _clock) = probe(HeartbeatPolicy {
            max_age_ms: 0,
            ..Default::default()
        });
        let report = probe.evaluate();
        assert!(report.healthy);
        assert_eq!(report.reason, HeartbeatReason::Disabled);
    }

    #[test]
    fn test_missing_and_empty() {
        let (probe, _dir, _clock) = probe(HeartbeatPolicy::default());
        assert_eq!(probe.evaluate().reason, HeartbeatReason::Missing);

        fs::write(probe.path(), "").unwrap();
        let report = probe.evaluate();
        assert!(!report.healthy);
        assert_eq!(report.reason, HeartbeatReason::Missing);
    }

    #[test]
    fn test_invalid_contents() {
        let (probe, _dir, _clock) = probe(HeartbeatPolicy::default());
        fs::write(probe.path(), "not json").unwrap();
        assert_eq!(probe.evaluate().reason, HeartbeatReason::Invalid);

        beat(&probe, json!({ "timestamp": "soon", "status": "healthy" }));
        assert_eq!(probe.evaluate().reason, HeartbeatReason::Invalid);
    }

    #[test]
    fn test_healthy_then_stale() {
        let (probe, _dir, clock) = probe(HeartbeatPolicy::default());
        beat(&probe, healthy_body(clock.now()));
        let report = probe.evaluate();
        assert!(report.healthy);
        assert_eq!(report.reason, HeartbeatReason::Healthy);

        clock.advance(std::time::Duration::from_secs(61));
        assert_eq!(probe.evaluate().reason, HeartbeatReason::Stale);
    }

    #[test]
    fn test_status_is_lowercased() {
        let (probe, _dir, clock) = probe(HeartbeatPolicy::default());
        let mut body = healthy_body(clock.now());
        body["status"] = json!("Recovering");
        beat(&probe, body);

        let report = probe.evaluate();
        assert_eq!(report.reason, HeartbeatReason::Status("recovering".into()));
        assert_eq!(report.reason.as_str(), "recovering");
    }

    #[test]
    fn test_stopped_component_is_degraded() {
        let (probe, _dir, clock) = probe(HeartbeatPolicy::default());
        let mut body = healthy_body(clock.now());
        body["tokenMonitor"]["running"] = json!(false);
        beat(&probe, body);
        assert_eq!(probe.evaluate().reason, HeartbeatReason::Degraded);

        // no status at all still passes the status check
        let mut body = healthy_body(clock.now());
        body.as_object_mut().unwrap().remove("status");
        beat(&probe, body);
        assert!(probe.evaluate().healthy);
    }

    #[test]
    fn test_report_serializes_reason_as_string() {
        let report = HeartbeatReport::unhealthy(HeartbeatReason::Stale, None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, json!({ "healthy": false, "reason": "stale" }));
    }
}
