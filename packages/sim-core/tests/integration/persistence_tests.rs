//! Save/load round trips through the persistence manager.

use std::fs;

use ntest::timeout;
use serde_json::json;
use tempfile::tempdir;

use sim_core::persistence::PersistenceManager;
use sim_core::{SimConfig, SimError, Store};

use super::helpers::{chat_state_schema, chat_store};

#[timeout(2000)]
#[test]
fn test_save_load_validated_state() {
    let temp_dir = tempdir().unwrap();
    let config = SimConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let persistence = PersistenceManager::new(&config);

    let store = chat_store();
    store
        .create("spaces", json!({"displayName": "Team", "spaceType": "GROUP_CHAT"}))
        .unwrap();
    persistence.save_default(&store).unwrap();

    let loaded = Store::new();
    persistence
        .load_into(&loaded, persistence.state_path(), Some(&chat_state_schema()))
        .unwrap();
    assert_eq!(loaded.count("spaces").unwrap(), 1);
    assert_eq!(loaded.snapshot().unwrap(), store.snapshot().unwrap());
}

#[timeout(2000)]
#[test]
fn test_repeated_saves_overwrite_atomically() {
    let temp_dir = tempdir().unwrap();
    let config = SimConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let persistence = PersistenceManager::new(&config);
    let store = chat_store();

    for i in 0..20 {
        store
            .create("spaces", json!({"name": format!("spaces/S{}", i), "displayName": "x"}))
            .unwrap();
        persistence.save_default(&store).unwrap();
        let on_disk = persistence
            .load_state(persistence.state_path(), None)
            .unwrap();
        assert_eq!(on_disk["spaces"].as_object().unwrap().len(), i + 1);
    }

    let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[timeout(2000)]
#[test]
fn test_schema_failure_reports_every_issue() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{
            "spaces": {"spaces/A": {"name": "bad", "displayName": "A"}},
            "messages": [{"name": "m", "text": "t"}]
        }"#,
    )
    .unwrap();

    let persistence = PersistenceManager::new(&SimConfig::default());
    let err = persistence
        .load_state(&path, Some(&chat_state_schema()))
        .unwrap_err();
    let SimError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    let paths: Vec<&str> = errors.issues.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["current_user", "messages[0].createTime", "spaces.spaces/A.name"]
    );
}
