//! Persisted lifecycle state machine
//!
//! The current state is loaded once from a [`PersistenceStore`] and then only
//! changes through [`LifecycleStateMachine::transition`], which persists the
//! new state before updating memory. A missing or unreadable record is
//! replaced by the configured default and written back immediately.

use crate::error::{LifecycleError, Result};
use crate::state::{LifecycleEvent, LifecycleState, PersistedState};
use crate::store::PersistenceStore;
use crate::table::TransitionTable;
use chrono::{DateTime, Utc};
use hookguard_core_resilience::{system_clock, Clock, SharedClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Default key the state is stored under
pub const DEFAULT_STATE_KEY: &str = "guard-lifecycle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// State used when nothing valid is persisted
    pub default_state: LifecycleState,

    /// Store key for the persisted record
    pub state_key: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_state: LifecycleState::Idle,
            state_key: DEFAULT_STATE_KEY.to_string(),
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.state_key.trim().is_empty() {
            return Err("state_key must not be empty".to_string());
        }
        if self.state_key.contains(['/', '\\']) {
            return Err(format!("state_key '{}' must not contain path separators", self.state_key));
        }
        Ok(())
    }
}

/// How the initial state was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Read from the store
    Persisted,
    /// Nothing was stored; default written
    Missing,
    /// Stored record was unreadable; default written over it
    Corrupt,
}

/// A completed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LifecycleState,
    pub event: LifecycleEvent,
    pub to: LifecycleState,
    pub at: DateTime<Utc>,
}

pub struct LifecycleStateMachine {
    store: Arc<dyn PersistenceStore>,
    table: TransitionTable,
    config: LifecycleConfig,
    clock: SharedClock,
    state: LifecycleState,
    updated_at: DateTime<Utc>,
    loaded_from: LoadSource,
}

impl std::fmt::Debug for LifecycleStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleStateMachine")
            .field("state", &self.state)
            .field("updated_at", &self.updated_at)
            .field("state_key", &self.config.state_key)
            .field("loaded_from", &self.loaded_from)
            .finish()
    }
}

impl LifecycleStateMachine {
    /// Load with the default table and the system clock
    pub fn open(store: Arc<dyn PersistenceStore>, config: LifecycleConfig) -> Result<Self> {
        Self::load(store, TransitionTable::guard_default(), config, system_clock())
    }

    /// Load the persisted state, falling back to `config.default_state`
    ///
    /// Fails only if the fallback itself cannot be persisted.
    pub fn load(
        store: Arc<dyn PersistenceStore>,
        table: TransitionTable,
        config: LifecycleConfig,
        clock: SharedClock,
    ) -> Result<Self> {
        let key = config.state_key.clone();

        let loaded = match store.load(&key) {
            Ok(Some(value)) => match serde_json::from_value::<PersistedState>(value) {
                Ok(record) => Ok(record),
                Err(e) => {
                    warn!(key = %key, error = %e, "persisted lifecycle state is malformed, resetting to default");
                    Err(LoadSource::Corrupt)
                }
            },
            Ok(None) => Err(LoadSource::Missing),
            Err(e) => {
                warn!(key = %key, error = %e, "persisted lifecycle state is unreadable, resetting to default");
                Err(LoadSource::Corrupt)
            }
        };

        let now = clock.now();
        let mut machine = Self {
            store,
            table,
            clock,
            state: config.default_state,
            updated_at: now,
            loaded_from: LoadSource::Persisted,
            config,
        };

        match loaded {
            Ok(record) => {
                machine.state = record.state;
                machine.updated_at = record.updated_at().unwrap_or(now);
            }
            Err(source) => {
                machine.persist(machine.config.default_state, now)?;
                machine.loaded_from = source;
                info!(key = %key, state = %machine.state, "lifecycle state initialised");
            }
        }

        Ok(machine)
    }

    pub fn get_state(&self) -> LifecycleState {
        self.state
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn loaded_from(&self) -> LoadSource {
        self.loaded_from
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn can_transition(&self, event: LifecycleEvent) -> bool {
        self.table.next(self.state, event).is_some()
    }

    /// Apply `event`, persisting the result before returning it
    ///
    /// On any error the in-memory state is left as it was.
    pub fn transition(&mut self, event: LifecycleEvent) -> Result<Transition> {
        let from = self.state;
        let to = self
            .table
            .next(from, event)
            .ok_or(LifecycleError::InvalidTransition { from, event })?;

        let at = self.clock.now();
        self.persist(to, at)?;

        self.state = to;
        self.updated_at = at;
        info!(%from, %event, %to, "lifecycle transition");

        Ok(Transition { from, event, to, at })
    }

    /// Transition only if allowed; `Ok(None)` when `event` does not apply
    pub fn apply_if_allowed(&mut self, event: LifecycleEvent) -> Result<Option<Transition>> {
        if !self.can_transition(event) {
            return Ok(None);
        }
        self.transition(event).map(Some)
    }

    fn persist(&self, state: LifecycleState, at: DateTime<Utc>) -> Result<()> {
        let value = serde_json::to_value(PersistedState::new(state, at))?;
        self.store.save(&self.config.state_key, &value)?;
        Ok(())
    }
}
