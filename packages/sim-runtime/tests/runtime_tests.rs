//! Simulator integration tests: dispatch, validation, error modes and
//! error injection over a small chat-like service.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;

use ntest::timeout;
use serde_json::{json, Value};

use sim_core::ids::IdStrategy;
use sim_core::schema::{FieldRule, RecordSchema};
use sim_core::store::CollectionSpec;
use sim_core::{SimError, Store};
use sim_runtime::{
    ArgRequirement, ArgType, ErrorDefinition, ErrorMode, ErrorPolicy, ErrorSimulator,
    ErrorTypeConfig, OperationSchema, Simulator,
};

fn create_space(store: &Store, args: &Value) -> Result<Value, SimError> {
    store.create(
        "spaces",
        json!({"displayName": args["displayName"], "spaceType": "SPACE"}),
    )
}

fn get_space(store: &Store, args: &Value) -> Result<Value, SimError> {
    let name = args["name"]
        .as_str()
        .ok_or_else(|| SimError::InvalidInput("name must be a string".to_string()))?;
    store.get("spaces", name)
}

fn count_spaces(store: &Store, _args: &Value) -> Result<Value, SimError> {
    Ok(json!(store.count("spaces")?))
}

fn chat_simulator() -> Simulator {
    let store = Arc::new(Store::new());
    store
        .register(
            CollectionSpec::keyed("spaces")
                .id_field("name")
                .id_strategy(IdStrategy::ResourceName {
                    prefix: "spaces".to_string(),
                })
                .label("Space")
                .schema(RecordSchema::new().field(FieldRule::string("displayName").required())),
        )
        .unwrap();

    let sim = Simulator::new(store);
    sim.register_with_schema(
        "create_space",
        create_space,
        OperationSchema::new(vec![ArgRequirement::required("displayName", ArgType::String)]),
    );
    sim.register_with_schema(
        "get_space",
        get_space,
        OperationSchema::new(vec![ArgRequirement::required("name", ArgType::String)]),
    );
    sim.register("count_spaces", count_spaces);
    sim
}

#[timeout(1000)]
#[test]
fn test_call_round_trip() {
    let sim = chat_simulator();
    let space = sim
        .call("create_space", &json!({"displayName": "Team"}))
        .unwrap();
    let name = space["name"].as_str().unwrap();

    let fetched = sim.call("get_space", &json!({"name": name})).unwrap();
    assert_eq!(fetched, space);
    assert_eq!(sim.call("count_spaces", &json!({})).unwrap(), json!(1));
}

#[timeout(1000)]
#[test]
fn test_raise_mode_errors() {
    let sim = chat_simulator();

    assert!(matches!(
        sim.call("delete_everything", &json!({})),
        Err(SimError::OperationNotFound(_))
    ));
    assert!(matches!(
        sim.call("create_space", &json!({"displayName": 3})),
        Err(SimError::Validation(_))
    ));
    assert_eq!(
        sim.call("get_space", &json!({"name": "spaces/NOPE"}))
            .unwrap_err()
            .to_string(),
        "Space 'spaces/NOPE' not found"
    );
}

#[timeout(1000)]
#[test]
fn test_error_dict_mode() {
    let sim = chat_simulator().with_policy(ErrorPolicy {
        mode: ErrorMode::ErrorDict,
        print_error_reports: false,
    });

    let result = sim
        .call("get_space", &json!({"name": "spaces/NOPE"}))
        .unwrap();
    assert_eq!(
        result,
        json!({"exceptionType": "NotFoundError", "message": "Space 'spaces/NOPE' not found"})
    );

    let result = sim.call("create_space", &json!({})).unwrap();
    assert_eq!(result["exceptionType"], "ValidationError");
    assert_eq!(result["issues"][0]["path"], "displayName");

    sim.error_mode().set_mode(ErrorMode::Raise);
    assert!(sim.call("create_space", &json!({})).is_err());
}

#[timeout(1000)]
#[test]
fn test_injected_errors_respect_run_cap() {
    let errors = Arc::new(ErrorSimulator::new(
        BTreeMap::from([("PermissionError".to_string(), ErrorTypeConfig::new(1.0))]),
        HashMap::from([(
            "count_spaces".to_string(),
            vec![ErrorDefinition {
                exception: "PermissionError".to_string(),
                message: "Caller lacks access".to_string(),
            }],
        )]),
        Some(2),
    ));
    let sim = chat_simulator().with_error_simulator(Arc::clone(&errors));

    for _ in 0..2 {
        let err = sim.call("count_spaces", &json!({})).unwrap_err();
        assert_eq!(err.exception_type(), "PermissionError");
        assert_eq!(err.to_string(), "Caller lacks access");
    }
    assert_eq!(sim.call("count_spaces", &json!({})).unwrap(), json!(0));
    assert_eq!(errors.current_error_count(), 2);

    // Operations without definitions never fail
    assert!(sim.call("create_space", &json!({"displayName": "x"})).is_ok());
}

#[timeout(1000)]
#[test]
fn test_injected_error_as_dict() {
    let errors = Arc::new(ErrorSimulator::default());
    errors
        .add_or_update_error_type("TimeoutError", ErrorTypeConfig::new(1.0))
        .unwrap();
    errors.set_definitions(
        "count_spaces",
        vec![ErrorDefinition {
            exception: "TimeoutError".to_string(),
            message: "Deadline exceeded".to_string(),
        }],
    );
    let sim = chat_simulator().with_error_simulator(errors);
    let _guard = sim.error_mode().scoped(ErrorMode::ErrorDict);

    assert_eq!(
        sim.call("count_spaces", &json!({})).unwrap(),
        json!({"exceptionType": "TimeoutError", "message": "Deadline exceeded"})
    );
}

#[timeout(5000)]
#[test]
fn test_concurrent_calls_share_store() {
    let sim = Arc::new(chat_simulator());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let sim = Arc::clone(&sim);
            thread::spawn(move || {
                for i in 0..10 {
                    sim.call(
                        "create_space",
                        &json!({"displayName": format!("space {}-{}", t, i)}),
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(sim.call("count_spaces", &json!({})).unwrap(), json!(40));
}
