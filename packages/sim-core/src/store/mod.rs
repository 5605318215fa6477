//! Explicit in-memory store holding a simulator's state document.
//!
//! The state is a single JSON object whose top-level keys are either
//! collections of records or scalar settings. Its shape is exactly what
//! [`crate::persistence`] writes to disk.

mod collection;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::{Map, Value};

use crate::error::SimError;
use crate::schema::StateSchema;

pub use collection::{merge_patch, minify, CollectionKind, CollectionSpec};
use collection::id_string;

/// In-memory store passed explicitly to every simulated operation.
#[derive(Debug)]
pub struct Store {
    /// Live state document
    state: RwLock<Map<String, Value>>,
    /// State captured at construction, restored by [`Store::reset`]
    seed: Map<String, Value>,
    /// Registered collection specs
    specs: RwLock<BTreeMap<String, CollectionSpec>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_state(Map::new())
    }

    /// Creates a store seeded with `state`.
    pub fn with_state(state: Map<String, Value>) -> Self {
        Self {
            seed: state.clone(),
            state: RwLock::new(state),
            specs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a store from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, SimError> {
        match value {
            Value::Object(state) => Ok(Self::with_state(state)),
            other => Err(SimError::InvalidInput(format!(
                "State must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Registers a collection, creating it empty when absent from the state.
    ///
    /// # Returns
    /// `Err(SimError::InvalidInput)` when the existing value has the wrong shape.
    pub fn register(&self, spec: CollectionSpec) -> Result<(), SimError> {
        {
            let mut state = self.state.write().map_err(|_| SimError::LockPoisoned)?;
            match state.get(&spec.name) {
                None => {
                    state.insert(spec.name.clone(), spec.empty_container());
                }
                Some(existing) => check_shape(&spec, existing)?,
            }
        }
        tracing::debug!(collection = %spec.name, kind = ?spec.kind, "registered collection");
        self.specs
            .write()
            .map_err(|_| SimError::LockPoisoned)?
            .insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Returns the registered (or inferred) spec for a collection.
    pub fn spec(&self, collection: &str) -> Result<CollectionSpec, SimError> {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        self.resolve_spec(collection, &state)
    }

    fn resolve_spec(
        &self,
        collection: &str,
        state: &Map<String, Value>,
    ) -> Result<CollectionSpec, SimError> {
        if let Some(spec) = self
            .specs
            .read()
            .map_err(|_| SimError::LockPoisoned)?
            .get(collection)
        {
            return Ok(spec.clone());
        }
        state
            .get(collection)
            .and_then(|value| CollectionSpec::infer(collection, value))
            .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))
    }

    /// Inserts a record, assigning an id when it carries none.
    ///
    /// # Arguments
    /// * `collection` - Collection name
    /// * `record` - JSON object to store
    ///
    /// # Returns
    /// The stored record, including its id.
    pub fn create(&self, collection: &str, record: Value) -> Result<Value, SimError> {
        let Value::Object(mut fields) = record else {
            return Err(SimError::InvalidInput(format!(
                "Record for '{}' must be a JSON object",
                collection
            )));
        };

        let mut state = self.state.write().map_err(|_| SimError::LockPoisoned)?;
        let spec = self.resolve_spec(collection, &state)?;
        let container = state
            .get_mut(collection)
            .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))?;

        let id = match fields.get(&spec.id_field) {
            Some(Value::Null) | None => {
                let existing = record_ids(&spec, container);
                let id = spec
                    .id_strategy
                    .next_id(existing.iter().map(String::as_str))?;
                fields.insert(spec.id_field.clone(), Value::String(id.clone()));
                id
            }
            Some(value) => id_string(value).ok_or_else(|| {
                SimError::InvalidInput(format!(
                    "Field '{}' must be a string or a number",
                    spec.id_field
                ))
            })?,
        };

        if find_index(&spec, container, &id).is_some() {
            return Err(SimError::AlreadyExists {
                kind: spec.label.clone(),
                id,
            });
        }

        let record = Value::Object(fields);
        if let Some(schema) = &spec.schema {
            schema.validate(collection, &record)?;
        }

        match container {
            Value::Object(map) => {
                map.insert(id.clone(), record.clone());
            }
            Value::Array(items) => items.push(record.clone()),
            other => return Err(shape_error(&spec, other)),
        }
        tracing::debug!(collection, id = %id, "created record");
        Ok(record)
    }

    /// Gets a record by id.
    pub fn get(&self, collection: &str, id: &str) -> Result<Value, SimError> {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        let spec = self.resolve_spec(collection, &state)?;
        let container = container(&state, collection)?;
        lookup(&spec, container, id)
            .cloned()
            .ok_or_else(|| SimError::not_found(spec.label.clone(), id))
    }

    /// Applies a JSON merge patch to a record.
    ///
    /// The merged record is validated before it replaces the stored one, so
    /// a rejected patch leaves the store untouched. The id field cannot change.
    pub fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<Value, SimError> {
        if !patch.is_object() {
            return Err(SimError::InvalidInput(format!(
                "Patch for '{}' must be a JSON object",
                collection
            )));
        }
        self.modify(collection, id, |spec, current| {
            if let Some(new_id) = patch.get(&spec.id_field) {
                if id_string(new_id).as_deref() != Some(id) {
                    return Err(SimError::InvalidInput(format!(
                        "Field '{}' is immutable",
                        spec.id_field
                    )));
                }
            }
            let mut merged = current.clone();
            merge_patch(&mut merged, patch);
            Ok(merged)
        })
    }

    /// Replaces a record wholesale, keeping its id.
    pub fn replace(&self, collection: &str, id: &str, record: Value) -> Result<Value, SimError> {
        let Value::Object(mut fields) = record else {
            return Err(SimError::InvalidInput(format!(
                "Record for '{}' must be a JSON object",
                collection
            )));
        };
        self.modify(collection, id, move |spec, _| {
            match fields.get(&spec.id_field).and_then(id_string) {
                Some(existing) if existing != id => {
                    return Err(SimError::InvalidInput(format!(
                        "Field '{}' is immutable",
                        spec.id_field
                    )));
                }
                Some(_) => {}
                None => {
                    fields.insert(spec.id_field.clone(), Value::String(id.to_string()));
                }
            }
            Ok(Value::Object(fields.clone()))
        })
    }

    fn modify<F>(&self, collection: &str, id: &str, f: F) -> Result<Value, SimError>
    where
        F: FnOnce(&CollectionSpec, &Value) -> Result<Value, SimError>,
    {
        let mut state = self.state.write().map_err(|_| SimError::LockPoisoned)?;
        let spec = self.resolve_spec(collection, &state)?;
        let container = state
            .get_mut(collection)
            .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))?;

        let slot = lookup_mut(&spec, container, id)
            .ok_or_else(|| SimError::not_found(spec.label.clone(), id))?;
        let updated = f(&spec, slot)?;
        if let Some(schema) = &spec.schema {
            schema.validate(collection, &updated)?;
        }
        *slot = updated.clone();
        tracing::debug!(collection, id, "updated record");
        Ok(updated)
    }

    /// Removes a record and returns it.
    pub fn remove(&self, collection: &str, id: &str) -> Result<Value, SimError> {
        let mut state = self.state.write().map_err(|_| SimError::LockPoisoned)?;
        let spec = self.resolve_spec(collection, &state)?;
        let container = state
            .get_mut(collection)
            .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))?;

        let removed = match container {
            Value::Object(map) => map.remove(id),
            Value::Array(items) => {
                let index = items
                    .iter()
                    .position(|r| record_id(&spec, r).as_deref() == Some(id));
                index.map(|i| items.remove(i))
            }
            other => return Err(shape_error(&spec, other)),
        };
        let removed = removed.ok_or_else(|| SimError::not_found(spec.label.clone(), id))?;
        tracing::debug!(collection, id, "removed record");
        Ok(removed)
    }

    /// Lists all records of a collection in storage order.
    pub fn list(&self, collection: &str) -> Result<Vec<Value>, SimError> {
        self.find(collection, |_| true)
    }

    /// Lists records matching a predicate.
    pub fn find<P>(&self, collection: &str, predicate: P) -> Result<Vec<Value>, SimError>
    where
        P: Fn(&Value) -> bool,
    {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        let container = container(&state, collection)?;
        Ok(records(container)
            .into_iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> Result<usize, SimError> {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        Ok(records(container(&state, collection)?).len())
    }

    /// Whether a record with `id` exists.
    pub fn contains(&self, collection: &str, id: &str) -> Result<bool, SimError> {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        let spec = self.resolve_spec(collection, &state)?;
        Ok(lookup(&spec, container(&state, collection)?, id).is_some())
    }

    /// Names of all top-level keys holding objects or arrays.
    pub fn collection_names(&self) -> Result<Vec<String>, SimError> {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        Ok(state
            .iter()
            .filter(|(_, v)| v.is_object() || v.is_array())
            .map(|(k, _)| k.clone())
            .collect())
    }

    /// Reads a top-level value.
    pub fn get_setting(&self, key: &str) -> Result<Option<Value>, SimError> {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        Ok(state.get(key).cloned())
    }

    /// Writes a top-level value.
    pub fn set_setting(&self, key: impl Into<String>, value: Value) -> Result<(), SimError> {
        let mut state = self.state.write().map_err(|_| SimError::LockPoisoned)?;
        state.insert(key.into(), value);
        Ok(())
    }

    /// Deep copy of the current state.
    pub fn snapshot(&self) -> Result<Map<String, Value>, SimError> {
        Ok(self
            .state
            .read()
            .map_err(|_| SimError::LockPoisoned)?
            .clone())
    }

    /// Replaces the current state wholesale.
    pub fn restore(&self, state: Map<String, Value>) -> Result<(), SimError> {
        *self.state.write().map_err(|_| SimError::LockPoisoned)? = state;
        Ok(())
    }

    /// Restores the state captured at construction.
    ///
    /// Registered collections absent from the seed come back empty.
    pub fn reset(&self) -> Result<(), SimError> {
        let mut state = self.seed.clone();
        for spec in self.specs.read().map_err(|_| SimError::LockPoisoned)?.values() {
            state
                .entry(spec.name.clone())
                .or_insert_with(|| spec.empty_container());
        }
        self.restore(state)?;
        tracing::debug!("store reset to seed state");
        Ok(())
    }

    /// Removes every top-level key.
    pub fn clear(&self) -> Result<(), SimError> {
        self.state
            .write()
            .map_err(|_| SimError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// State with nulls and empty containers stripped.
    pub fn minified_state(&self) -> Result<Value, SimError> {
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        let value = Value::Object(state.clone());
        Ok(minify(&value).unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Compact JSON rendering of [`Store::minified_state`].
    pub fn to_minified_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(&self.minified_state()?)?)
    }

    /// Schema covering every registered collection that carries one.
    pub fn state_schema(&self) -> Result<StateSchema, SimError> {
        let specs = self.specs.read().map_err(|_| SimError::LockPoisoned)?;
        Ok(specs
            .values()
            .filter_map(|spec| spec.schema.clone().map(|s| (spec.name.clone(), s)))
            .fold(StateSchema::new(), |acc, (name, schema)| {
                acc.collection(name, schema)
            }))
    }

    /// Validates the whole state against the registered schemas.
    pub fn validate(&self) -> Result<(), SimError> {
        let schema = self.state_schema()?;
        let state = self.state.read().map_err(|_| SimError::LockPoisoned)?;
        schema.validate(&state)
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn shape_error(spec: &CollectionSpec, found: &Value) -> SimError {
    SimError::InvalidInput(format!(
        "Collection '{}' should be {:?} but holds a {}",
        spec.name,
        spec.kind,
        json_type(found)
    ))
}

fn check_shape(spec: &CollectionSpec, value: &Value) -> Result<(), SimError> {
    match (spec.kind, value) {
        (CollectionKind::Keyed, Value::Object(_)) | (CollectionKind::Sequence, Value::Array(_)) => {
            Ok(())
        }
        (_, other) => Err(shape_error(spec, other)),
    }
}

fn container<'a>(state: &'a Map<String, Value>, collection: &str) -> Result<&'a Value, SimError> {
    state
        .get(collection)
        .filter(|v| v.is_object() || v.is_array())
        .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))
}

fn records(container: &Value) -> Vec<&Value> {
    match container {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn record_id(spec: &CollectionSpec, record: &Value) -> Option<String> {
    record.get(&spec.id_field).and_then(id_string)
}

fn record_ids(spec: &CollectionSpec, container: &Value) -> Vec<String> {
    match container {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => items.iter().filter_map(|r| record_id(spec, r)).collect(),
        _ => Vec::new(),
    }
}

fn find_index(spec: &CollectionSpec, container: &Value, id: &str) -> Option<usize> {
    match container {
        Value::Object(map) => map.keys().position(|k| k == id),
        Value::Array(items) => items
            .iter()
            .position(|r| record_id(spec, r).as_deref() == Some(id)),
        _ => None,
    }
}

fn lookup<'a>(spec: &CollectionSpec, container: &'a Value, id: &str) -> Option<&'a Value> {
    match container {
        Value::Object(map) => map.get(id),
        Value::Array(items) => items
            .iter()
            .find(|r| record_id(spec, r).as_deref() == Some(id)),
        _ => None,
    }
}

fn lookup_mut<'a>(
    spec: &CollectionSpec,
    container: &'a mut Value,
    id: &str,
) -> Option<&'a mut Value> {
    match container {
        Value::Object(map) => map.get_mut(id),
        Value::Array(items) => items
            .iter_mut()
            .find(|r| record_id(spec, r).as_deref() == Some(id)),
        _ => None,
    }
}
