use std::sync::Arc;
use std::thread;

use ntest::timeout;
use serde_json::{json, Value};

use super::*;
use crate::ids::IdStrategy;
use crate::schema::{FieldRule, RecordSchema};

fn seeded_store() -> Store {
    let store = Store::from_value(json!({
        "current_user": {"id": "users/1"},
        "spaces": {
            "AAA": {"id": "AAA", "displayName": "General"}
        },
        "messages": [
            {"id": "m1", "text": "hello"}
        ]
    }))
    .unwrap();
    store
        .register(
            CollectionSpec::keyed("spaces")
                .label("Space")
                .schema(RecordSchema::new().field(FieldRule::string("displayName").required())),
        )
        .unwrap();
    store
        .register(
            CollectionSpec::sequence("messages")
                .label("Message")
                .id_strategy(IdStrategy::Sequential {
                    prefix: "m".to_string(),
                    width: 0,
                }),
        )
        .unwrap();
    store
}

#[test]
#[timeout(1000)]
fn test_create_and_get_keyed() {
    let store = seeded_store();
    let created = store
        .create("spaces", json!({"id": "BBB", "displayName": "Random"}))
        .unwrap();
    assert_eq!(created["id"], "BBB");
    assert_eq!(store.get("spaces", "BBB").unwrap()["displayName"], "Random");
    assert_eq!(store.count("spaces").unwrap(), 2);
}

#[test]
#[timeout(1000)]
fn test_create_generates_sequential_id() {
    let store = seeded_store();
    let created = store.create("messages", json!({"text": "second"})).unwrap();
    assert_eq!(created["id"], "m2");
    assert!(store.contains("messages", "m2").unwrap());
}

#[test]
#[timeout(1000)]
fn test_create_with_exhausted_sequence_errors() {
    let store = Store::from_value(json!({"tasks": [{"id": "18446744073709551615"}]})).unwrap();
    store
        .register(CollectionSpec::sequence("tasks").id_strategy(IdStrategy::Sequential {
            prefix: String::new(),
            width: 0,
        }))
        .unwrap();
    let err = store.create("tasks", json!({"title": "one more"})).unwrap_err();
    assert!(matches!(err, SimError::InvalidInput(_)));
    assert_eq!(store.count("tasks").unwrap(), 1);
}

#[test]
#[timeout(1000)]
fn test_create_duplicate_rejected() {
    let store = seeded_store();
    let err = store
        .create("spaces", json!({"id": "AAA", "displayName": "Again"}))
        .unwrap_err();
    assert!(matches!(err, SimError::AlreadyExists { .. }));
    assert_eq!(err.to_string(), "Space 'AAA' already exists");
}

#[test]
#[timeout(1000)]
fn test_create_validates_schema() {
    let store = seeded_store();
    let err = store.create("spaces", json!({"id": "CCC"})).unwrap_err();
    match err {
        SimError::Validation(errors) => {
            assert_eq!(errors.context, "spaces");
            assert_eq!(errors.issues[0].path, "displayName");
            assert_eq!(errors.issues[0].message, "Field required");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(!store.contains("spaces", "CCC").unwrap());
}

#[test]
#[timeout(1000)]
fn test_get_missing_record() {
    let store = seeded_store();
    let err = store.get("spaces", "ZZZ").unwrap_err();
    assert_eq!(err.to_string(), "Space 'ZZZ' not found");
    assert!(matches!(
        store.get("rooms", "x"),
        Err(SimError::CollectionNotFound(_))
    ));
}

#[test]
#[timeout(1000)]
fn test_update_merges_patch() {
    let store = seeded_store();
    let updated = store
        .update(
            "spaces",
            "AAA",
            &json!({"displayName": "Renamed", "spaceType": "SPACE"}),
        )
        .unwrap();
    assert_eq!(updated["displayName"], "Renamed");
    assert_eq!(updated["spaceType"], "SPACE");
    assert_eq!(store.get("spaces", "AAA").unwrap(), updated);
}

#[test]
#[timeout(1000)]
fn test_update_rejected_leaves_record_intact() {
    let store = seeded_store();
    let before = store.get("spaces", "AAA").unwrap();

    let err = store
        .update("spaces", "AAA", &json!({"displayName": null}))
        .unwrap_err();
    assert!(matches!(err, SimError::Validation(_)));

    let err = store
        .update("spaces", "AAA", &json!({"id": "BBB"}))
        .unwrap_err();
    assert!(matches!(err, SimError::InvalidInput(_)));

    assert_eq!(store.get("spaces", "AAA").unwrap(), before);
}

#[test]
#[timeout(1000)]
fn test_replace_keeps_id() {
    let store = seeded_store();
    let replaced = store
        .replace("messages", "m1", json!({"text": "edited"}))
        .unwrap();
    assert_eq!(replaced, json!({"text": "edited", "id": "m1"}));
    assert_eq!(store.list("messages").unwrap(), vec![replaced]);
}

#[test]
#[timeout(1000)]
fn test_remove_from_sequence() {
    let store = seeded_store();
    store.create("messages", json!({"text": "two"})).unwrap();
    let removed = store.remove("messages", "m1").unwrap();
    assert_eq!(removed["text"], "hello");
    assert_eq!(store.count("messages").unwrap(), 1);
    assert!(matches!(
        store.remove("messages", "m1"),
        Err(SimError::NotFound { .. })
    ));
}

#[test]
#[timeout(1000)]
fn test_find_with_predicate() {
    let store = seeded_store();
    store.create("messages", json!({"text": "hello again"})).unwrap();
    store.create("messages", json!({"text": "bye"})).unwrap();
    let found = store
        .find("messages", |m| {
            m["text"].as_str().is_some_and(|t| t.starts_with("hello"))
        })
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[test]
#[timeout(1000)]
fn test_unregistered_collection_is_inferred() {
    let store = Store::from_value(json!({"users": {"u1": {"name": "ana"}}})).unwrap();
    assert_eq!(store.get("users", "u1").unwrap()["name"], "ana");
    let created = store.create("users", json!({"name": "bo"})).unwrap();
    assert!(created["id"].as_str().is_some());
}

#[test]
#[timeout(1000)]
fn test_register_wrong_shape() {
    let store = Store::from_value(json!({"spaces": []})).unwrap();
    assert!(matches!(
        store.register(CollectionSpec::keyed("spaces")),
        Err(SimError::InvalidInput(_))
    ));
}

#[test]
#[timeout(1000)]
fn test_settings_and_collection_names() {
    let store = seeded_store();
    store.set_setting("error_mode", json!("raise")).unwrap();
    assert_eq!(store.get_setting("error_mode").unwrap(), Some(json!("raise")));
    assert_eq!(store.get_setting("missing").unwrap(), None);
    assert_eq!(
        store.collection_names().unwrap(),
        vec!["current_user", "messages", "spaces"]
    );
}

#[test]
#[timeout(1000)]
fn test_reset_restores_seed() {
    let store = seeded_store();
    store.create("messages", json!({"text": "x"})).unwrap();
    store.remove("spaces", "AAA").unwrap();
    store.reset().unwrap();
    assert_eq!(store.count("messages").unwrap(), 1);
    assert!(store.contains("spaces", "AAA").unwrap());
}

#[test]
#[timeout(1000)]
fn test_reset_keeps_registered_collections() {
    let store = Store::new();
    store.register(CollectionSpec::keyed("tasks")).unwrap();
    store.create("tasks", json!({"id": "t1", "title": "first"})).unwrap();

    store.reset().unwrap();
    assert_eq!(store.count("tasks").unwrap(), 0);
    let created = store.create("tasks", json!({"id": "t2", "title": "second"})).unwrap();
    assert_eq!(created["id"], "t2");
    assert_eq!(store.count("tasks").unwrap(), 1);
}

#[test]
#[timeout(1000)]
fn test_snapshot_restore_and_clear() {
    let store = seeded_store();
    let snapshot = store.snapshot().unwrap();
    store.clear().unwrap();
    assert!(store.collection_names().unwrap().is_empty());
    store.restore(snapshot.clone()).unwrap();
    assert_eq!(store.snapshot().unwrap(), snapshot);
}

#[test]
#[timeout(1000)]
fn test_minified_state() {
    let store = Store::from_value(json!({
        "spaces": {},
        "messages": [{"id": "m1", "thread": null}],
        "flag": false
    }))
    .unwrap();
    assert_eq!(
        store.minified_state().unwrap(),
        json!({"messages": [{"id": "m1"}], "flag": false})
    );
    let text = store.to_minified_json().unwrap();
    assert!(!text.contains(' '));
}

#[test]
#[timeout(1000)]
fn test_validate_whole_state() {
    let store = seeded_store();
    assert!(store.validate().is_ok());
    store
        .set_setting("spaces", json!({"BAD": {"id": "BAD"}}))
        .unwrap();
    assert!(matches!(store.validate(), Err(SimError::Validation(_))));
}

#[test]
fn test_from_value_rejects_non_object() {
    assert!(matches!(
        Store::from_value(json!([1])),
        Err(SimError::InvalidInput(_))
    ));
}

#[test]
#[timeout(5000)]
fn test_concurrent_creates() {
    let store = Arc::new(Store::new());
    store
        .register(CollectionSpec::keyed("tasks").id_strategy(IdStrategy::Sequential {
            prefix: "task-".to_string(),
            width: 4,
        }))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    store
                        .create("tasks", json!({"subject": format!("{}-{}", t, i)}))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count("tasks").unwrap(), 200);
    let ids: Vec<Value> = store
        .list("tasks")
        .unwrap()
        .into_iter()
        .map(|r| r["id"].clone())
        .collect();
    assert!(ids.contains(&json!("task-0200")));
}
