//! Command implementations. Each returns the text to print on success.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use sim_core::persistence::PersistenceManager;
use sim_core::schema::StateSchema;
use sim_core::{SimConfig, Store};
use sim_query::search::{RecordAdapter, SearchEngine, StrategyKind};

fn load_store(config: &SimConfig, state: &Path, schema: Option<&StateSchema>) -> Result<Store> {
    let manager = PersistenceManager::new(config);
    let map = manager
        .load_state(state, schema)
        .with_context(|| format!("loading {}", state.display()))?;
    Ok(Store::with_state(map))
}

/// Loads `state` and checks it against `schema`, even when
/// `validate_on_load` is off.
pub fn validate(config: &SimConfig, state: &Path, schema: Option<&Path>) -> Result<String> {
    let schema = schema
        .map(StateSchema::from_json_file)
        .transpose()
        .context("loading state schema")?;
    let config = SimConfig {
        validate_on_load: true,
        ..config.clone()
    };
    let store = load_store(&config, state, schema.as_ref())?;
    let collections = store.collection_names()?;
    Ok(format!(
        "{}: valid ({} collections)",
        state.display(),
        collections.len()
    ))
}

pub fn minify(config: &SimConfig, state: &Path, output: Option<&Path>) -> Result<String> {
    let store = load_store(config, state, None)?;
    let json = store.to_minified_json()?;
    match output {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = json.len(), "minified state written");
            Ok(format!("wrote {}", path.display()))
        }
        None => Ok(json),
    }
}

pub fn inspect(config: &SimConfig, state: &Path) -> Result<String> {
    let store = load_store(config, state, None)?;
    let mut lines = Vec::new();
    for name in store.collection_names()? {
        lines.push(format!("{:<32} {:>8}", name, store.count(&name)?));
    }
    let settings = store.snapshot()?.values().filter(|v| !v.is_object() && !v.is_array()).count();
    lines.push(format!("{} settings", settings));
    Ok(lines.join("\n"))
}

pub fn search(
    config: &SimConfig,
    state: &Path,
    collection: &str,
    query: &str,
    strategy: StrategyKind,
    fields: &[String],
    limit: usize,
) -> Result<String> {
    let store = load_store(config, state, None)?;
    let adapter = RecordAdapter::new(collection, fields.iter().cloned());
    let mut engine = SearchEngine::new(strategy);
    let indexed = engine.sync_from_store(&adapter, &store)?;
    let results = engine.search(query, None, Some(limit));
    tracing::info!(
        collection,
        strategy = strategy.as_str(),
        indexed,
        hits = results.len(),
        "search finished"
    );
    Ok(serde_json::to_string_pretty(&Value::Array(results))?)
}

pub fn fcspec(docstring: &Path, name: &str, defaults: &[String]) -> Result<String> {
    let defaults: HashSet<String> = defaults
        .iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    let schema = sim_fcspec::schema_from_file(docstring, name, &defaults)
        .with_context(|| format!("building schema from {}", docstring.display()))?;
    Ok(schema.to_json_pretty()?)
}
