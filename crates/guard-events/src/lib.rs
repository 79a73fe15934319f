//! hookguard Events: typed domain events and the idempotent event bus
//!
//! Detectors and daemons publish [`DomainEvent`]s; reactors (lifecycle state
//! machine, auto-recovery, notifiers) subscribe by [`EventType`] or to
//! everything via [`Topic::All`].
//!
//! ```text
//!  detectors ──┐
//!  daemons  ───┼──> EventBus ──(dedup by id)──> handlers (run concurrently)
//!  monitors ───┘
//! ```
//!
//! Publishing the same event id twice is a no-op, which is what protects the
//! guard from duplicate triggers raised by independent daemons.

pub mod bus;
pub mod error;
pub mod event;
pub mod processed;

pub use bus::{handler_fn, BusConfig, BusStats, EventBus, EventHandler, Subscription, Topic};
pub use error::{BoxError, BusError, HandlerFailure};
pub use event::{DomainEvent, EventType, GuardEvent, Severity};
pub use processed::{ProcessedIdSet, DEFAULT_MAX_PROCESSED};
