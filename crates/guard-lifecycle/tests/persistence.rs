//! Lifecycle state surviving restarts on a real file store

use hookguard_lifecycle::{
    JsonFileStore, LifecycleConfig, LifecycleEvent, LifecycleState, LifecycleStateMachine,
    LoadSource, PersistenceStore,
};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn open(store: &Arc<JsonFileStore>) -> LifecycleStateMachine {
    LifecycleStateMachine::open(store.clone(), LifecycleConfig::default()).unwrap()
}

#[test]
fn state_survives_restart() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));

    {
        let mut machine = open(&store);
        assert_eq!(machine.loaded_from(), LoadSource::Missing);
        machine.transition(LifecycleEvent::Start).unwrap();
        machine.transition(LifecycleEvent::Block).unwrap();
    }

    let machine = open(&store);
    assert_eq!(machine.loaded_from(), LoadSource::Persisted);
    assert_eq!(machine.get_state(), LifecycleState::Blocked);
}

#[test]
fn on_disk_layout() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let mut machine = open(&store);
    machine.transition(LifecycleEvent::Start).unwrap();

    let raw = fs::read_to_string(dir.path().join("guard-lifecycle.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["state"], "active");
    assert!(value["updatedAt"].as_i64().unwrap() > 0);
    assert_eq!(value.as_object().unwrap().len(), 2);
}

#[test]
fn truncated_file_is_healed_on_load() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("guard-lifecycle.json"), "{\"state\": \"act").unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));

    let machine = open(&store);
    assert_eq!(machine.loaded_from(), LoadSource::Corrupt);
    assert_eq!(machine.get_state(), LifecycleState::Idle);

    let healed = store.load("guard-lifecycle").unwrap().unwrap();
    assert_eq!(healed["state"], "idle");
}

#[test]
fn rejected_transition_leaves_file_untouched() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let mut machine = open(&store);
    let before = fs::read_to_string(dir.path().join("guard-lifecycle.json")).unwrap();

    assert!(machine.transition(LifecycleEvent::Unblock).is_err());

    let after = fs::read_to_string(dir.path().join("guard-lifecycle.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn custom_default_and_key() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let config = LifecycleConfig {
        default_state: LifecycleState::Stopped,
        state_key: "hooks".to_string(),
    };
    let machine = LifecycleStateMachine::open(store, config).unwrap();
    assert_eq!(machine.get_state(), LifecycleState::Stopped);
    assert!(machine.can_transition(LifecycleEvent::Reset));
    assert!(dir.path().join("hooks.json").exists());
}
