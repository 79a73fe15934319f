//! End-to-end delivery scenarios for the event bus

use hookguard_events::{
    handler_fn, BoxError, BusConfig, DomainEvent, EventBus, EventType, GuardEvent, Topic,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

fn heartbeat(reason: &str) -> DomainEvent {
    DomainEvent::new(GuardEvent::HeartbeatDegraded {
        reason: reason.to_string(),
    })
}

#[tokio::test]
async fn concurrent_publishes_of_one_id_deliver_once() {
    let bus = EventBus::default();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    bus.subscribe(
        Topic::All,
        handler_fn("slow", move |_event| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
    .await;

    let event = heartbeat("stale");
    let (a, b, c) = tokio::join!(
        bus.publish(event.clone()),
        bus.publish(event.clone()),
        bus.publish(event.clone())
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(bus.is_processed(&event.id()).await);
}

#[tokio::test]
async fn evicted_ids_are_delivered_again() {
    let bus = EventBus::new(BusConfig { max_processed: 3 });
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    bus.subscribe(
        Topic::Only(EventType::HeartbeatDegraded),
        handler_fn("count", move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
    .await;

    let events: Vec<DomainEvent> = (0..5).map(|i| heartbeat(&format!("r{}", i))).collect();
    for event in &events {
        bus.publish(event.clone()).await.unwrap();
    }
    assert_eq!(bus.processed_len().await, 3);
    assert!(!bus.is_processed(&events[0].id()).await);
    assert!(bus.is_processed(&events[4].id()).await);

    // The oldest id fell out of the window and counts as new again
    bus.publish(events[0].clone()).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 6);

    // A recent id is still deduplicated
    bus.publish(events[4].clone()).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn handlers_see_the_same_event_and_keep_their_effects_on_failure() {
    let bus = EventBus::default();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    bus.subscribe(
        Topic::Only(EventType::CommitBlocked),
        handler_fn("recorder", move |event| {
            let log = log.clone();
            async move {
                log.lock().await.push(event.id());
                Ok(())
            }
        }),
    )
    .await;
    bus.subscribe(
        Topic::All,
        handler_fn("first-broken", |_event| async {
            Err::<(), BoxError>("first".into())
        }),
    )
    .await;
    bus.subscribe(
        Topic::All,
        handler_fn("second-broken", |_event| async {
            Err::<(), BoxError>("second".into())
        }),
    )
    .await;

    let event = DomainEvent::new(GuardEvent::CommitBlocked {
        reason: "secrets".into(),
        violations: 1,
    });
    let err = bus.publish(event.clone()).await.unwrap_err();

    let mut handlers: Vec<&str> = err.failures().iter().map(|f| f.handler.as_str()).collect();
    handlers.sort();
    assert_eq!(handlers, vec!["first-broken", "second-broken"]);
    assert_eq!(*seen.lock().await, vec![event.id()]);

    let stats = bus.stats().await;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.published, 0);
    assert_eq!(stats.subscribers, 3);
}

#[tokio::test]
async fn no_subscribers_is_success() {
    let bus = EventBus::default();
    let event = bus
        .emit(GuardEvent::AnalysisCompleted {
            files_analyzed: 10,
            violations: 0,
        })
        .await
        .unwrap();
    assert!(bus.is_processed(&event.id()).await);
}
