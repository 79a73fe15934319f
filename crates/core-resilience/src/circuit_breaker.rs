//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker stops calling a dependency that keeps failing. It has two
//! observable states:
//! - Closed: Normal operation, calls pass through
//! - Open: The dependency is known-bad, calls fail immediately until `open_until`
//!
//! There is no explicit half-open state. Once the cool-down elapses the breaker
//! resets itself to Closed with a zero failure count, so the next call acts as
//! the probe.

use crate::clock::{add_duration, system_clock, SharedClock};
use crate::error::ResilienceError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally
    Closed,
    /// Circuit is open, calls fail immediately until `until`
    Open { until: DateTime<Utc> },
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open once tripped
    pub reset_timeout: Duration,
    /// Deadline enforced on every guarded call
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Internal state of the circuit breaker
#[derive(Debug, Default)]
struct CircuitBreakerState {
    /// Consecutive failure count
    failure_count: u32,
    /// Set while the circuit is open
    open_until: Option<DateTime<Utc>>,
}

impl CircuitBreakerState {
    /// Clears an elapsed cool-down. Returns true if the circuit is still open.
    fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        match self.open_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.failure_count = 0;
                self.open_until = None;
                false
            }
            None => false,
        }
    }
}

/// Point-in-time view of a breaker, for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub name: String,
    pub failure_count: u32,
    pub threshold: u32,
    pub open_until: Option<DateTime<Utc>>,
    pub reset_timeout_ms: u64,
}

/// Circuit breaker for protecting hook paths from a failing dependency
///
/// Cloning is cheap; clones share state.
///
/// # Example
/// ```no_run
/// use hookguard_core_resilience::{CircuitBreaker, CircuitBreakerConfig, ResilienceError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), ResilienceError> {
///     let breaker = CircuitBreaker::new("git", CircuitBreakerConfig::default());
///
///     let result = breaker.call(|| async {
///         Ok::<_, ResilienceError>(42)
///     }).await?;
///
///     println!("Result: {}", result);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    clock: SharedClock,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker on the system clock
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, system_clock())
    }

    /// Create a new circuit breaker reading time from `clock`
    pub fn with_clock(name: &str, config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            name: Arc::from(name),
            config: Arc::new(config),
            clock,
            state: Arc::new(Mutex::new(CircuitBreakerState::default())),
        }
    }

    /// Create a new circuit breaker with default configuration
    pub fn new_default(name: &str) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// True while `now < open_until`. An elapsed cool-down resets the breaker.
    pub async fn is_open(&self) -> bool {
        let mut state = self.state.lock().await;
        let was_open = state.open_until.is_some();
        let open = state.refresh(self.clock.now());
        if was_open && !open {
            debug!(circuit = %self.name, "cool-down elapsed, circuit closed");
        }
        open
    }

    /// Get the current state of the circuit breaker
    pub async fn get_state(&self) -> CircuitState {
        let mut state = self.state.lock().await;
        if state.refresh(self.clock.now()) {
            CircuitState::Open {
                until: state.open_until.unwrap_or_else(|| self.clock.now()),
            }
        } else {
            CircuitState::Closed
        }
    }

    /// Get current failure count
    pub async fn get_failure_count(&self) -> u32 {
        let mut state = self.state.lock().await;
        state.refresh(self.clock.now());
        state.failure_count
    }

    /// Count one failure; opens the circuit once the threshold is reached
    pub async fn record_failure(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let already_open = state.refresh(now);
        state.failure_count = state.failure_count.saturating_add(1);

        if !already_open && state.failure_count >= self.config.failure_threshold {
            let until = add_duration(now, self.config.reset_timeout);
            state.open_until = Some(until);
            warn!(
                circuit = %self.name,
                failures = state.failure_count,
                open_until = %until,
                "circuit opened"
            );
        }
    }

    /// A success closes the circuit and forgets past failures
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.failure_count = 0;
        state.open_until = None;
    }

    /// Reset the circuit breaker to closed state
    pub async fn reset(&self) {
        self.record_success().await;
    }

    /// Open the circuit immediately for a full cool-down
    pub async fn force_open(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.failure_count = state.failure_count.max(self.config.failure_threshold);
        state.open_until = Some(add_duration(now, self.config.reset_timeout));
    }

    pub async fn snapshot(&self) -> CircuitSnapshot {
        let mut state = self.state.lock().await;
        state.refresh(self.clock.now());
        CircuitSnapshot {
            name: self.name.to_string(),
            failure_count: state.failure_count,
            threshold: self.config.failure_threshold,
            open_until: state.open_until,
            reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
        }
    }

    /// Execute an operation under circuit breaker protection
    ///
    /// Fails fast with [`ResilienceError::CircuitOpen`] while open. The call is
    /// bounded by `call_timeout`; a timeout counts as a failure.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError>>,
    {
        if self.is_open().await {
            return Err(ResilienceError::CircuitOpen {
                name: self.name.to_string(),
            });
        }

        match tokio::time::timeout(self.config.call_timeout, op()).await {
            Ok(Ok(result)) => {
                self.record_success().await;
                Ok(result)
            }
            Ok(Err(e)) => {
                if e.should_trip_breaker() {
                    self.record_failure().await;
                }
                Err(e)
            }
            Err(_) => {
                self.record_failure().await;
                Err(ResilienceError::Timeout {
                    name: self.name.to_string(),
                    after: self.config.call_timeout,
                })
            }
        }
    }
}

/// Named breakers, one per external dependency
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    clock: SharedClock,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Get the breaker called `name`, creating it with `config` on first use
    pub async fn get(&self, name: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        let mut breakers = self.breakers.lock().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| CircuitBreaker::with_clock(name, config, self.clock.clone()))
            .clone()
    }

    /// Snapshots of every breaker, ordered by name
    pub async fn snapshot_all(&self) -> Vec<CircuitSnapshot> {
        let breakers: Vec<CircuitBreaker> = self.breakers.lock().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            snapshots.push(breaker.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub async fn reset_all(&self) {
        let breakers: Vec<CircuitBreaker> = self.breakers.lock().await.values().cloned().collect();
        for breaker in breakers {
            breaker.reset().await;
        }
    }
}
