//! hookguard Lifecycle: the guard's persisted state machine
//!
//! The guard runs once per hook invocation and again as a daemon, so its
//! lifecycle state has to survive process restarts. This crate keeps that
//! state on disk and only lets it move along a declared transition table.
//!
//! # Example
//!
//! ```
//! use hookguard_lifecycle::{
//!     LifecycleConfig, LifecycleEvent, LifecycleState, LifecycleStateMachine, MemoryStore,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut machine = LifecycleStateMachine::open(store, LifecycleConfig::default()).unwrap();
//! assert_eq!(machine.get_state(), LifecycleState::Idle);
//!
//! machine.transition(LifecycleEvent::Start).unwrap();
//! assert_eq!(machine.get_state(), LifecycleState::Active);
//!
//! // Not declared: rejected, state unchanged
//! assert!(machine.transition(LifecycleEvent::Recovered).is_err());
//! assert_eq!(machine.get_state(), LifecycleState::Active);
//! ```

pub mod error;
pub mod machine;
pub mod state;
pub mod store;
pub mod table;

pub use error::{LifecycleError, StoreError};
pub use machine::{
    LifecycleConfig, LifecycleStateMachine, LoadSource, Transition, DEFAULT_STATE_KEY,
};
pub use state::{LifecycleEvent, LifecycleState, PersistedState};
pub use store::{JsonFileStore, MemoryStore, PersistenceStore};
pub use table::TransitionTable;
