//! Idempotent publish/subscribe hub
//!
//! # Delivery
//!
//! - Handlers matching an event (its type, plus [`Topic::All`]) are invoked
//!   concurrently; `publish` returns once every one of them has settled.
//! - A failing handler never stops the others. All failures are collected into
//!   [`BusError::HandlersFailed`]; side effects of the handlers that succeeded
//!   are kept.
//! - An id is recorded only after a delivery in which every handler succeeded,
//!   so a failed event may be published again with the same id.
//! - While an id is being delivered, concurrent publishes of the same id are
//!   no-ops.
//! - A publish that is cancelled or panics releases its id, so a retry is
//!   delivered rather than counted as a duplicate.
//!
//! # Example
//!
//! ```
//! use hookguard_events::{handler_fn, DomainEvent, EventBus, EventType, GuardEvent, Topic};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::default();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! bus.subscribe(
//!     Topic::Only(EventType::CommitBlocked),
//!     handler_fn("counter", move |_event| {
//!         let counter = counter.clone();
//!         async move {
//!             counter.fetch_add(1, Ordering::SeqCst);
//!             Ok(())
//!         }
//!     }),
//! )
//! .await;
//!
//! let event = DomainEvent::new(GuardEvent::CommitBlocked { reason: "lint".into(), violations: 2 });
//! bus.publish(event.clone()).await.unwrap();
//! bus.publish(event).await.unwrap(); // duplicate id: no-op
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! # });
//! ```

use crate::error::{BoxError, BusError, HandlerFailure};
use crate::event::{DomainEvent, EventType, GuardEvent};
use crate::processed::{ProcessedIdSet, DEFAULT_MAX_PROCESSED};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// What a subscriber listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Wildcard: every event
    All,
    /// A single event type
    Only(EventType),
}

impl Topic {
    fn matches(&self, event_type: EventType) -> bool {
        match self {
            Topic::All => true,
            Topic::Only(t) => *t == event_type,
        }
    }
}

impl From<EventType> for Topic {
    fn from(t: EventType) -> Self {
        Topic::Only(t)
    }
}

/// A consumer of domain events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and aggregate errors
    fn name(&self) -> &str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), BoxError>;
}

struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), BoxError> {
        (self.f)(event.clone()).await
    }
}

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(name: &str, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.to_string(),
        f,
    })
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// How many delivered ids to remember for deduplication
    pub max_processed: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_processed: DEFAULT_MAX_PROCESSED,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_processed == 0 {
            return Err("max_processed must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Counters for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub published: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub processed_ids: usize,
    pub evicted_ids: u64,
    pub subscribers: usize,
}

struct Registered {
    id: u64,
    topic: Topic,
    handler: Arc<dyn EventHandler>,
}

#[derive(Debug)]
struct Dedup {
    processed: ProcessedIdSet,
    in_flight: HashSet<Uuid>,
    published: u64,
    duplicates: u64,
    failed: u64,
}

struct BusInner {
    subscribers: RwLock<Vec<Registered>>,
    dedup: Mutex<Dedup>,
    next_subscriber: AtomicU64,
}

impl BusInner {
    fn dedup(&self) -> MutexGuard<'_, Dedup> {
        self.dedup.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps an id in flight until dropped, including when the publish future is
/// cancelled or a handler panics
struct Reservation<'a> {
    bus: &'a BusInner,
    id: Uuid,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.bus.dedup().in_flight.remove(&self.id);
    }
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    bus: Weak<BusInner>,
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner").finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Remove the handler. Returns false if the bus is gone or it was already removed.
    pub async fn unsubscribe(self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        let mut subscribers = bus.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| s.id != self.id);
        subscribers.len() != before
    }
}

/// Idempotent publish/subscribe hub. Cloning shares the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                dedup: Mutex::new(Dedup {
                    processed: ProcessedIdSet::new(config.max_processed),
                    in_flight: HashSet::new(),
                    published: 0,
                    duplicates: 0,
                    failed: 0,
                }),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    pub async fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        debug!(handler = handler.name(), ?topic, "subscribed");
        self.inner.subscribers.write().await.push(Registered {
            id,
            topic,
            handler,
        });
        Subscription {
            id,
            topic,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every matching handler
    ///
    /// Returns the event unchanged. A duplicate id returns immediately without
    /// invoking anything.
    pub async fn publish(&self, event: DomainEvent) -> Result<DomainEvent, BusError> {
        let id = event.id();
        let event_type = event.event_type();

        let reservation = {
            let mut dedup = self.inner.dedup();
            if dedup.processed.touch(&id) || dedup.in_flight.contains(&id) {
                dedup.duplicates += 1;
                debug!(event_id = %id, %event_type, "duplicate event ignored");
                return Ok(event);
            }
            dedup.in_flight.insert(id);
            Reservation {
                bus: &self.inner,
                id,
            }
        };

        let handlers: Vec<Arc<dyn EventHandler>> = self
            .inner
            .subscribers
            .read()
            .await
            .iter()
            .filter(|s| s.topic.matches(event_type))
            .map(|s| s.handler.clone())
            .collect();

        debug!(event_id = %id, %event_type, handlers = handlers.len(), "publishing event");

        let outcomes = join_all(handlers.iter().map(|handler| {
            let event = &event;
            async move { (handler.name().to_string(), handler.handle(event).await) }
        }))
        .await;

        let failures: Vec<HandlerFailure> = outcomes
            .into_iter()
            .filter_map(|(handler, outcome)| {
                outcome.err().map(|e| HandlerFailure {
                    handler,
                    message: e.to_string(),
                })
            })
            .collect();

        // Recorded before the reservation is released so no retry slips in between
        {
            let mut dedup = self.inner.dedup();
            if failures.is_empty() {
                dedup.processed.insert(id);
                dedup.published += 1;
            } else {
                dedup.failed += 1;
            }
        }
        drop(reservation);

        if failures.is_empty() {
            Ok(event)
        } else {
            for failure in &failures {
                warn!(event_id = %id, %event_type, handler = %failure.handler, error = %failure.message, "event handler failed");
            }
            Err(BusError::HandlersFailed {
                event_id: id,
                event_type,
                failures,
            })
        }
    }

    /// Wrap `payload` in a fresh event and publish it
    pub async fn emit(&self, payload: GuardEvent) -> Result<DomainEvent, BusError> {
        self.publish(DomainEvent::new(payload)).await
    }

    pub async fn is_processed(&self, id: &Uuid) -> bool {
        self.inner.dedup().processed.contains(id)
    }

    pub async fn processed_len(&self) -> usize {
        self.inner.dedup().processed.len()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().await.len()
    }

    pub async fn stats(&self) -> BusStats {
        let subscribers = self.subscriber_count().await;
        let dedup = self.inner.dedup();
        BusStats {
            published: dedup.published,
            duplicates: dedup.duplicates,
            failed: dedup.failed,
            processed_ids: dedup.processed.len(),
            evicted_ids: dedup.processed.total_evicted(),
            subscribers,
        }
    }
}
