//! Bounded window of recently delivered event ids
//!
//! Eviction is least-recently-seen: a duplicate hit refreshes an id's recency,
//! so ids that keep being re-published by independent daemons stay in the
//! window longest. Recency is tracked with a queue of `(id, stamp)` pairs;
//! entries whose stamp no longer matches the map are stale and skipped.
//!
//! # Example
//!
//! ```
//! use hookguard_events::processed::ProcessedIdSet;
//! use uuid::Uuid;
//!
//! let mut set = ProcessedIdSet::new(2);
//! let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
//! set.insert(a);
//! set.insert(b);
//! set.touch(&a); // a is now the most recent
//! set.insert(c); // evicts b
//! assert!(set.contains(&a));
//! assert!(!set.contains(&b));
//! assert_eq!(set.len(), 2);
//! ```

use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Default cap on remembered ids
pub const DEFAULT_MAX_PROCESSED: usize = 500;

#[derive(Debug)]
pub struct ProcessedIdSet {
    capacity: usize,
    entries: HashMap<Uuid, u64>,
    order: VecDeque<(Uuid, u64)>,
    tick: u64,
    total_evicted: u64,
}

impl ProcessedIdSet {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
            tick: 0,
            total_evicted: 0,
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    /// Mark `id` as most recently seen. Returns false if it is not in the set.
    pub fn touch(&mut self, id: &Uuid) -> bool {
        if !self.entries.contains_key(id) {
            return false;
        }
        let stamp = self.next_stamp();
        self.entries.insert(*id, stamp);
        self.order.push_back((*id, stamp));
        self.compact();
        true
    }

    /// Record `id`, evicting the least recently seen ids beyond capacity
    pub fn insert(&mut self, id: Uuid) {
        let stamp = self.next_stamp();
        self.entries.insert(id, stamp);
        self.order.push_back((id, stamp));

        while self.entries.len() > self.capacity {
            let Some((oldest, oldest_stamp)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&oldest) == Some(&oldest_stamp) {
                self.entries.remove(&oldest);
                self.total_evicted += 1;
            }
        }
        self.compact();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids evicted over the lifetime of the set
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }

    fn next_stamp(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    // Bound the recency queue when duplicates keep refreshing the same ids.
    fn compact(&mut self) {
        if self.order.len() > self.capacity * 2 + 16 {
            let entries = &self.entries;
            self.order
                .retain(|(id, stamp)| entries.get(id) == Some(stamp));
        }
    }
}

impl Default for ProcessedIdSet {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROCESSED)
    }
}
