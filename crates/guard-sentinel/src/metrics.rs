//! Sentinel Metrics
//!
//! Counters for recovery activity and heartbeat watching.

use serde::{Deserialize, Serialize};

/// Lifetime counters of an [`AutoRecoveryManager`](crate::medic::AutoRecoveryManager)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    /// Requests no strategy matched
    pub ignored: u64,

    /// Requests refused because the key hit its attempt cap
    pub skipped: u64,

    /// Timers armed (including ones later superseded or cleared)
    pub scheduled: u64,

    /// Timers that fired and ran their action
    pub attempted: u64,

    pub succeeded: u64,

    pub failed: u64,
}

impl RecoveryStats {
    /// Fraction of fired attempts that succeeded (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Recovery: {} scheduled | {} attempted | {} ok / {} failed ({:.1}%) | {} skipped | {} ignored",
            self.scheduled,
            self.attempted,
            self.succeeded,
            self.failed,
            self.success_rate() * 100.0,
            self.skipped,
            self.ignored
        )
    }
}

/// Counters of a [`HeartbeatWatcher`](crate::daemon::HeartbeatWatcher)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchStats {
    pub checks: u64,

    pub healthy: u64,

    pub unhealthy: u64,

    /// Degraded events published to the bus
    pub degraded_signals: u64,

    /// Unhealthy checks not signalled because of the cooldown
    pub suppressed: u64,
}

impl WatchStats {
    /// Fraction of checks that found the heartbeat healthy (0.0 - 1.0)
    pub fn health_ratio(&self) -> f64 {
        if self.checks == 0 {
            1.0
        } else {
            self.healthy as f64 / self.checks as f64
        }
    }

    pub fn record(&mut self, healthy: bool) {
        self.checks += 1;
        if healthy {
            self.healthy += 1;
        } else {
            self.unhealthy += 1;
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Heartbeat: {} checks | {} healthy ({:.1}%) | {} unhealthy | {} signalled | {} suppressed",
            self.checks,
            self.healthy,
            self.health_ratio() * 100.0,
            self.unhealthy,
            self.degraded_signals,
            self.suppressed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut stats = RecoveryStats::default();
        assert_eq!(stats.success_rate(), 1.0);

        stats.attempted = 4;
        stats.succeeded = 3;
        stats.failed = 1;
        assert_eq!(stats.success_rate(), 0.75);
        assert!(stats.summary().contains("3 ok / 1 failed (75.0%)"));
    }

    #[test]
    fn test_health_ratio() {
        let mut stats = WatchStats::default();
        assert_eq!(stats.health_ratio(), 1.0);

        stats.record(true);
        stats.record(true);
        stats.record(true);
        stats.record(false);
        assert_eq!(stats.checks, 4);
        assert_eq!(stats.health_ratio(), 0.75);
        assert!(stats.summary().contains("4 checks"));
    }
}
