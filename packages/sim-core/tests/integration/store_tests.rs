//! Store behavior across registered collections.

use ntest::timeout;
use serde_json::json;

use sim_core::datetime::{self, DateTimeFormat};
use sim_core::SimError;

use super::helpers::{chat_state_schema, chat_store, now_utc_z};

#[timeout(1000)]
#[test]
fn test_create_space_assigns_resource_name() {
    let store = chat_store();
    let space = store
        .create("spaces", json!({"displayName": "Team", "spaceType": "SPACE"}))
        .unwrap();

    let name = space["name"].as_str().unwrap().to_string();
    assert!(name.starts_with("spaces/"));
    assert_eq!(store.get("spaces", &name).unwrap(), space);
}

#[timeout(1000)]
#[test]
fn test_strict_schema_rejects_unknown_field() {
    let store = chat_store();
    let err = store
        .create("spaces", json!({"displayName": "Team", "color": "red"}))
        .unwrap_err();
    match err {
        SimError::Validation(errors) => {
            assert_eq!(errors.issues.len(), 1);
            assert_eq!(errors.issues[0].path, "color");
            assert_eq!(errors.issues[0].message, "Extra inputs are not permitted");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(store.count("spaces").unwrap(), 0);
}

#[timeout(1000)]
#[test]
fn test_message_lifecycle() {
    let store = chat_store();
    let space = store
        .create("spaces", json!({"displayName": "Team"}))
        .unwrap();
    let space_name = space["name"].as_str().unwrap();

    let message_name = format!("{}/messages/1", space_name);
    store
        .create(
            "messages",
            json!({
                "name": message_name,
                "text": "hello",
                "createTime": now_utc_z(),
                "thread": {"name": format!("{}/threads/t1", space_name)}
            }),
        )
        .unwrap();

    let updated = store
        .update("messages", &message_name, &json!({"text": "edited", "thread": null}))
        .unwrap();
    assert_eq!(updated["text"], "edited");
    assert!(updated.get("thread").is_none());

    let err = store
        .update("messages", &message_name, &json!({"createTime": "yesterday-ish"}))
        .unwrap_err();
    assert!(matches!(err, SimError::Validation(_)));
    assert_eq!(store.get("messages", &message_name).unwrap(), updated);

    store.remove("messages", &message_name).unwrap();
    assert_eq!(
        store.get("messages", &message_name).unwrap_err().to_string(),
        format!("Message '{}' not found", message_name)
    );
}

#[timeout(1000)]
#[test]
fn test_state_schema_from_registered_collections() {
    let store = chat_store();
    store
        .create("spaces", json!({"displayName": "Team"}))
        .unwrap();
    assert!(store.validate().is_ok());
    assert!(chat_state_schema().validate(&store.snapshot().unwrap()).is_ok());
}

#[timeout(1000)]
#[test]
fn test_datetime_normalized_before_storing() {
    let store = chat_store();
    let create_time =
        datetime::validate_datetime_field("2024-03-15 14:30:45", "createTime", DateTimeFormat::Iso8601UtcZ)
            .unwrap();
    let message = store
        .create(
            "messages",
            json!({"name": "spaces/A/messages/1", "text": "x", "createTime": create_time}),
        )
        .unwrap();
    assert_eq!(message["createTime"], "2024-03-15T14:30:45Z");
}
