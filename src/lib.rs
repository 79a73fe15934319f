/*!
 * Hookguard - self-healing resilience core for repository guard hooks
 *
 * The pieces a long-running guard needs to stay trustworthy:
 * - Idempotent in-process event bus with topic subscriptions
 * - Persisted lifecycle state machine (idle, active, blocked, degraded, recovering, stopped)
 * - Circuit breakers around every external script
 * - Auto-recovery with exponential backoff and jitter
 * - Single-flight freshness monitor for the AI evidence artifact
 * - Heartbeat probe and watcher feeding recovery
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod reactors;

// Re-export commonly used types
pub use config::{BreakerSettings, GuardConfig, LogLevel, LoggingConfig, StorageConfig};
pub use error::{ErrorKind, GuardError, Result};
pub use guard::{EvidenceStatus, Guard, GuardBuilder, GuardStatus};
pub use reactors::{LifecycleReactor, NotificationReactor, RecoveryReactor};

pub use hookguard_core_resilience as resilience;
pub use hookguard_events as events;
pub use hookguard_lifecycle as lifecycle;
pub use hookguard_sentinel as sentinel;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
