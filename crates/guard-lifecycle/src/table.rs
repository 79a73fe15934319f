//! Declared transition table
//!
//! Transitions are data, not `match` arms: the table is built once and the
//! state machine only looks `(from, event)` pairs up in it.
//!
//! ```text
//!   idle ──start──> active ──block──> blocked
//!    ^               ^  │  <─unblock──   │
//!    │      recovered│  │degrade         │degrade
//!    │               │  v                v
//!    │          recovering <──recover── degraded
//!    │               └─────degrade─────>   │
//!    └────────────────reset────────────────┘
//!
//!   any state but stopped ──stop──> stopped ──reset──> idle
//! ```

use crate::state::{LifecycleEvent, LifecycleState};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTable {
    transitions: HashMap<(LifecycleState, LifecycleEvent), LifecycleState>,
}

impl TransitionTable {
    /// An empty table that rejects everything
    pub fn new() -> Self {
        Self::default()
    }

    /// The guard's standard table
    pub fn guard_default() -> Self {
        use LifecycleEvent::*;
        use LifecycleState::*;

        let mut table = Self::new()
            .allow(Idle, Start, Active)
            .allow(Active, Block, Blocked)
            .allow(Blocked, Unblock, Active)
            .allow(Active, Degrade, Degraded)
            .allow(Blocked, Degrade, Degraded)
            .allow(Degraded, Recover, Recovering)
            .allow(Recovering, Recovered, Active)
            .allow(Recovering, Degrade, Degraded)
            .allow(Stopped, Reset, Idle)
            .allow(Degraded, Reset, Idle);

        for from in [Idle, Active, Blocked, Degraded, Recovering] {
            table = table.allow(from, Stop, Stopped);
        }
        table
    }

    /// Declare `from --event--> to`, replacing any previous target
    pub fn allow(mut self, from: LifecycleState, event: LifecycleEvent, to: LifecycleState) -> Self {
        self.transitions.insert((from, event), to);
        self
    }

    pub fn next(&self, from: LifecycleState, event: LifecycleEvent) -> Option<LifecycleState> {
        self.transitions.get(&(from, event)).copied()
    }

    /// Events accepted in `from`, in declaration-independent order
    pub fn events_from(&self, from: LifecycleState) -> Vec<LifecycleEvent> {
        let mut events: Vec<LifecycleEvent> = self
            .transitions
            .keys()
            .filter(|(state, _)| *state == from)
            .map(|(_, event)| *event)
            .collect();
        events.sort();
        events
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent::*;
    use LifecycleState::*;

    #[test]
    fn test_default_table() {
        let table = TransitionTable::guard_default();
        assert_eq!(table.next(Idle, Start), Some(Active));
        assert_eq!(table.next(Active, Block), Some(Blocked));
        assert_eq!(table.next(Blocked, Unblock), Some(Active));
        assert_eq!(table.next(Blocked, Degrade), Some(Degraded));
        assert_eq!(table.next(Degraded, Recover), Some(Recovering));
        assert_eq!(table.next(Recovering, Recovered), Some(Active));
        assert_eq!(table.next(Recovering, Degrade), Some(Degraded));
        assert_eq!(table.next(Degraded, Reset), Some(Idle));
        assert_eq!(table.next(Stopped, Reset), Some(Idle));
        assert_eq!(table.len(), 15);
    }

    #[test]
    fn test_stop_from_everywhere_but_stopped() {
        let table = TransitionTable::guard_default();
        for state in LifecycleState::ALL {
            let expected = (state != Stopped).then_some(Stopped);
            assert_eq!(table.next(state, Stop), expected, "stop from {}", state);
        }
    }

    #[test]
    fn test_undeclared_pairs_rejected() {
        let table = TransitionTable::guard_default();
        assert_eq!(table.next(Idle, Block), None);
        assert_eq!(table.next(Active, Start), None);
        assert_eq!(table.next(Stopped, Start), None);
        assert_eq!(table.next(Active, Reset), None);
        assert_eq!(table.events_from(Stopped), vec![Reset]);
    }

    #[test]
    fn test_custom_table() {
        let table = TransitionTable::new().allow(Idle, Start, Blocked);
        assert_eq!(table.next(Idle, Start), Some(Blocked));
        assert!(TransitionTable::new().is_empty());
    }
}
