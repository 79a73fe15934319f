//! hookguard Core Resilience: Pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! Building blocks that keep the guard responsive when the scripts and services
//! it depends on misbehave:
//!
//! - **Circuit Breaker**: Fails fast once a dependency is known-bad, re-probing
//!   after a bounded cool-down. Every guarded call carries a timeout.
//! - **Circuit Breaker Registry**: One named breaker per dependency.
//! - **Clock**: Injectable wall clock so cool-downs can be tested without sleeping.
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Git, hooks, or evidence files
//! - How external scripts are spawned
//! - Application-specific concerns
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Recovery actions / evidence refresh   │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Fail-fast protection
//! │  (Counts failures, opens on threshold,  │
//! │   enforces a per-call timeout)          │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!         External dependency
//!      (restart script, update script)
//! ```
//!
//! # Usage Example
//!
//! ```
//! use hookguard_core_resilience::{CircuitBreaker, CircuitBreakerConfig, ResilienceError};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     reset_timeout: Duration::from_secs(60),
//!     call_timeout: Duration::from_secs(10),
//! };
//!
//! let breaker = CircuitBreaker::new("update-evidence", config);
//!
//! let result = breaker.call(|| async {
//!     Ok::<_, ResilienceError>(42)
//! }).await;
//! assert_eq!(result, Ok(42));
//! # });
//! ```

pub mod circuit_breaker;
pub mod clock;
pub mod error;

// Re-export main types for convenience
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, CircuitState,
};
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use error::ResilienceError;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use hookguard_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry};
    pub use super::clock::{Clock, ManualClock, SharedClock, SystemClock};
    pub use super::error::ResilienceError;
}
