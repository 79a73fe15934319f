//! Heartbeat watcher: the polling loop
//!
//! Every `poll_interval_ms` the watcher evaluates the heartbeat and, when it is
//! unhealthy, publishes `heartbeat-degraded` on the bus. Subscribers decide
//! what to do about it (degrade the lifecycle, schedule a supervisor restart).
//!
//! A persisting failure is not re-signalled on every poll: the watcher only
//! publishes again when the reason changes or `restart_cooldown_ms` has passed
//! since the last signal. Otherwise every poll would supersede the pending
//! recovery timer and it would never fire.

use crate::heartbeat::{HeartbeatProbe, HeartbeatReason, HeartbeatReport};
use crate::medic::AutoRecoveryManager;
use crate::metrics::WatchStats;
use chrono::{DateTime, Utc};
use hookguard_core_resilience::{system_clock, Clock, SharedClock};
use hookguard_events::{EventBus, GuardEvent};
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Recovery key used for supervisor restarts
pub const HEARTBEAT_RECOVERY_KEY: &str = "heartbeat";

#[derive(Debug, Default)]
struct WatchState {
    last: Option<(bool, HeartbeatReason)>,
    last_signal_at: Option<DateTime<Utc>>,
    stats: WatchStats,
}

struct Watcher {
    probe: HeartbeatProbe,
    bus: EventBus,
    medic: Option<AutoRecoveryManager>,
    clock: SharedClock,
    state: Mutex<WatchState>,
}

enum Decision {
    Recovered,
    Steady,
    Signal,
    Suppress,
}

impl Watcher {
    async fn check(&self) -> HeartbeatReport {
        let report = self.probe.evaluate();
        let now = self.clock.now();

        let decision = {
            let mut state = self.state.lock().await;
            state.stats.record(report.healthy);
            let previous = state.last.replace((report.healthy, report.reason.clone()));

            if report.healthy {
                state.last_signal_at = None;
                match previous {
                    Some((false, _)) => Decision::Recovered,
                    _ => Decision::Steady,
                }
            } else {
                let changed = match &previous {
                    Some((healthy, reason)) => *healthy || *reason != report.reason,
                    None => true,
                };
                let cooled = state.last_signal_at.map_or(true, |at| {
                    (now - at).to_std().unwrap_or_default() >= self.probe.policy().restart_cooldown()
                });
                if changed || cooled {
                    state.last_signal_at = Some(now);
                    state.stats.degraded_signals += 1;
                    Decision::Signal
                } else {
                    state.stats.suppressed += 1;
                    Decision::Suppress
                }
            }
        };

        match decision {
            Decision::Steady => debug!(reason = %report.reason, "heartbeat ok"),
            Decision::Recovered => {
                info!(reason = %report.reason, "💚 Heartbeat recovered");
                if let Some(medic) = &self.medic {
                    medic.clear(HEARTBEAT_RECOVERY_KEY).await;
                }
            }
            Decision::Suppress => {
                debug!(reason = %report.reason, "heartbeat still degraded (signal suppressed by cooldown)")
            }
            Decision::Signal => {
                warn!(reason = %report.reason, path = %self.probe.path().display(), "💔 Heartbeat degraded");
                let event = GuardEvent::HeartbeatDegraded {
                    reason: report.reason.to_string(),
                };
                if let Err(e) = self.bus.emit(event).await {
                    warn!(error = %e, "heartbeat-degraded delivery failed");
                }
            }
        }

        report
    }
}

/// Polls a [`HeartbeatProbe`] and signals degradation on the bus
pub struct HeartbeatWatcher {
    inner: Arc<Watcher>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatWatcher {
    pub fn new(probe: HeartbeatProbe, bus: EventBus) -> Self {
        Self::with_clock(probe, bus, system_clock())
    }

    pub fn with_clock(probe: HeartbeatProbe, bus: EventBus, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(Watcher {
                probe,
                bus,
                medic: None,
                clock,
                state: Mutex::new(WatchState::default()),
            }),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Reset the `heartbeat` recovery key on this medic once the heartbeat recovers
    ///
    /// Must be called before [`start`](Self::start).
    pub fn with_medic(mut self, medic: AutoRecoveryManager) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.medic = Some(medic);
        }
        self
    }

    pub fn probe(&self) -> &HeartbeatProbe {
        &self.inner.probe
    }

    /// Run one check now
    pub async fn run_check(&self) -> HeartbeatReport {
        self.inner.check().await
    }

    /// Last verdict, if any check has run
    pub async fn last(&self) -> Option<(bool, HeartbeatReason)> {
        self.inner.state.lock().await.last.clone()
    }

    pub async fn stats(&self) -> WatchStats {
        self.inner.state.lock().await.stats.clone()
    }

    /// Start polling in a background task; a disabled heartbeat is not polled
    pub fn start(&self) -> bool {
        let policy = self.inner.probe.policy();
        if policy.max_age().is_none() {
            info!("heartbeat watch disabled (max_age_ms = 0)");
            return false;
        }
        self.stop();

        info!(
            "🛡️  Heartbeat watch active | Path: {} | Max Age: {}ms | Poll: {}ms",
            self.inner.probe.path().display(),
            policy.max_age_ms,
            policy.poll_interval_ms
        );

        let watcher = Arc::downgrade(&self.inner);
        let period = policy.poll_interval();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(watcher) = watcher.upgrade() else {
                    break;
                };
                watcher.check().await;
            }
        });
        *self.lock_task() = Some(handle);
        true
    }

    pub fn stop(&self) -> bool {
        match self.lock_task().take() {
            Some(handle) => {
                handle.abort();
                debug!("heartbeat watch stopped");
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

impl Drop for HeartbeatWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}
