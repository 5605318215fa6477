//! Shared fixtures.

use serde_json::json;

use sim_core::datetime::DateTimeFormat;
use sim_core::ids::IdStrategy;
use sim_core::schema::{FieldKind, FieldRule, RecordSchema, StateSchema};
use sim_core::store::CollectionSpec;
use sim_core::Store;

pub fn message_schema() -> RecordSchema {
    RecordSchema::new()
        .field(FieldRule::string("name").required())
        .field(FieldRule::string("text").required())
        .field(FieldRule::datetime("createTime").required())
        .field(FieldRule::object(
            "thread",
            RecordSchema::new().field(FieldRule::string("name").required()),
        ))
        .field(FieldRule::array("annotations", FieldKind::Any))
}

pub fn space_schema() -> RecordSchema {
    RecordSchema::new()
        .field(FieldRule::string("name").required().pattern(r"^spaces/\S+$"))
        .field(FieldRule::string("displayName").required().max_length(128))
        .field(FieldRule::string("spaceType").one_of(["SPACE", "GROUP_CHAT", "DIRECT_MESSAGE"]))
        .strict()
}

pub fn chat_state_schema() -> StateSchema {
    StateSchema::new()
        .collection("spaces", space_schema())
        .collection("messages", message_schema())
        .require_key("current_user")
}

/// A store shaped like a chat service: keyed spaces, sequenced messages.
pub fn chat_store() -> Store {
    let store = Store::from_value(json!({
        "current_user": {"id": "users/USER123", "displayName": "Test User"},
        "spaces": {},
        "messages": []
    }))
    .unwrap();
    store
        .register(
            CollectionSpec::keyed("spaces")
                .id_field("name")
                .id_strategy(IdStrategy::ResourceName {
                    prefix: "spaces".to_string(),
                })
                .label("Space")
                .schema(space_schema()),
        )
        .unwrap();
    store
        .register(
            CollectionSpec::sequence("messages")
                .id_field("name")
                .label("Message")
                .schema(message_schema()),
        )
        .unwrap();
    store
}

pub fn now_utc_z() -> String {
    sim_core::datetime::format(&chrono::Utc::now(), DateTimeFormat::Iso8601UtcZ)
}
