//! Collection specs and record helpers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::IdStrategy;
use crate::schema::RecordSchema;

/// Storage shape of a collection inside the state document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// JSON object mapping id to record
    Keyed,
    /// JSON array of records carrying their own id field
    Sequence,
}

/// Registration for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Top-level key in the state document
    pub name: String,
    pub kind: CollectionKind,
    /// Record field holding the id
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub id_strategy: IdStrategy,
    /// Entity label used in error messages ("Space 'x' not found")
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub schema: Option<RecordSchema>,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl CollectionSpec {
    /// Keyed collection with `id` ids generated as UUIDs.
    pub fn keyed(name: impl Into<String>) -> Self {
        Self::with_kind(name.into(), CollectionKind::Keyed)
    }

    /// Sequence collection with `id` ids generated as UUIDs.
    pub fn sequence(name: impl Into<String>) -> Self {
        Self::with_kind(name.into(), CollectionKind::Sequence)
    }

    fn with_kind(name: String, kind: CollectionKind) -> Self {
        Self {
            label: name.clone(),
            name,
            kind,
            id_field: default_id_field(),
            id_strategy: IdStrategy::Uuid,
            schema: None,
        }
    }

    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn schema(mut self, schema: RecordSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Infers a spec for an unregistered collection from its JSON shape.
    pub(crate) fn infer(name: &str, value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => Some(Self::keyed(name)),
            Value::Array(_) => Some(Self::sequence(name)),
            _ => None,
        }
    }

    /// Empty container for this collection kind.
    pub(crate) fn empty_container(&self) -> Value {
        match self.kind {
            CollectionKind::Keyed => Value::Object(Map::new()),
            CollectionKind::Sequence => Value::Array(Vec::new()),
        }
    }
}

/// Renders an id value as a string key. Strings and numbers are accepted.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Applies an RFC 7386 JSON merge patch in place.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_obj) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Some(target_obj) = target.as_object_mut() {
        for (key, value) in patch_obj {
            if value.is_null() {
                target_obj.remove(key);
            } else {
                merge_patch(target_obj.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Removes nulls and empty containers recursively.
///
/// Returns `None` when the value itself minifies away.
pub fn minify(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(obj) => {
            let kept: Map<String, Value> = obj
                .iter()
                .filter_map(|(k, v)| minify(v).map(|v| (k.clone(), v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items.iter().filter_map(minify).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        other => Some(other.clone()),
    }
}
