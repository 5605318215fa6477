//! Operation registry and argument validation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sim_core::{SimError, Store, ValidationErrors};

/// A simulated API operation.
///
/// Receives the store it acts on and the call arguments as a JSON object.
pub type OperationFn = fn(&Store, &Value) -> Result<Value, SimError>;

/// Argument type for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ArgType {
    fn matches(self, v: &Value) -> bool {
        match self {
            ArgType::String => v.is_string(),
            ArgType::Integer => v.is_i64() || v.is_u64(),
            ArgType::Number => v.is_number(),
            ArgType::Boolean => v.is_boolean(),
            ArgType::Array => v.is_array(),
            ArgType::Object => v.is_object(),
            ArgType::Any => true,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
            ArgType::Array => "list",
            ArgType::Object => "dictionary",
            ArgType::Any => "value",
        }
    }
}

/// Argument requirement for operation validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgRequirement {
    /// Argument name.
    pub name: String,
    /// Expected type.
    pub arg_type: ArgType,
    /// Whether the argument is required.
    #[serde(default)]
    pub required: bool,
    /// Whether an explicit null is accepted.
    #[serde(default)]
    pub nullable: bool,
}

impl ArgRequirement {
    pub fn required(name: impl Into<String>, arg_type: ArgType) -> Self {
        Self {
            name: name.into(),
            arg_type,
            required: true,
            nullable: false,
        }
    }

    pub fn optional(name: impl Into<String>, arg_type: ArgType) -> Self {
        Self {
            name: name.into(),
            arg_type,
            required: false,
            nullable: true,
        }
    }
}

/// Schema for operation argument validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSchema {
    /// List of argument requirements.
    pub args: Vec<ArgRequirement>,
    /// Reject arguments not listed in `args`.
    #[serde(default)]
    pub strict: bool,
}

impl OperationSchema {
    pub fn new(args: Vec<ArgRequirement>) -> Self {
        Self {
            args,
            strict: false,
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Validates call arguments against this schema.
    ///
    /// Every problem is collected before returning, with `operation` as the
    /// error context.
    pub fn validate(&self, operation: &str, args: &Value) -> Result<(), SimError> {
        let mut errors = ValidationErrors::new(operation);
        let Some(obj) = args.as_object() else {
            errors.push("", "Input should be a valid dictionary");
            return errors.into_result();
        };

        for req in &self.args {
            match obj.get(&req.name) {
                None if req.required => errors.push(req.name.as_str(), "Field required"),
                None => {}
                Some(Value::Null) if req.nullable => {}
                Some(v) if !req.arg_type.matches(v) => errors.push(
                    req.name.as_str(),
                    format!("Input should be a valid {}", req.arg_type.describe()),
                ),
                Some(_) => {}
            }
        }

        if self.strict {
            for key in obj.keys() {
                if !self.args.iter().any(|r| &r.name == key) {
                    errors.push(key.as_str(), "Extra inputs are not permitted");
                }
            }
        }

        errors.into_result()
    }
}

/// Internal representation of a registered operation.
struct OperationDef {
    /// Function pointer.
    func: OperationFn,
    /// Optional schema for argument validation.
    schema: Option<OperationSchema>,
}

/// Registry of available operations.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    operations: Arc<RwLock<HashMap<String, OperationDef>>>,
}

impl OperationRegistry {
    /// Creates a new empty operation registry.
    pub fn new() -> Self {
        Self {
            operations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers an operation with the given name.
    ///
    /// # Arguments
    /// * `name` - Operation name
    /// * `func` - Operation function
    pub fn register(&self, name: impl Into<String>, func: OperationFn) {
        self.operations
            .write()
            .insert(name.into(), OperationDef { func, schema: None });
    }

    /// Registers an operation with a schema for argument validation.
    ///
    /// # Arguments
    /// * `name` - Operation name
    /// * `func` - Operation function
    /// * `schema` - Schema for argument validation
    pub fn register_with_schema(
        &self,
        name: impl Into<String>,
        func: OperationFn,
        schema: OperationSchema,
    ) {
        self.operations.write().insert(
            name.into(),
            OperationDef {
                func,
                schema: Some(schema),
            },
        );
    }

    /// Gets an operation function by name.
    pub fn get(&self, name: &str) -> Option<OperationFn> {
        self.operations.read().get(name).map(|def| def.func)
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Validates arguments for an operation.
    ///
    /// # Arguments
    /// * `name` - Operation name
    /// * `args` - JSON arguments to validate
    ///
    /// # Returns
    /// `Result<(), SimError>` indicating success or validation failure.
    pub fn validate_args(&self, name: &str, args: &Value) -> Result<(), SimError> {
        let operations = self.operations.read();
        let def = operations
            .get(name)
            .ok_or_else(|| SimError::OperationNotFound(name.to_string()))?;

        if let Some(schema) = &def.schema {
            schema.validate(name, args)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(_store: &Store, args: &Value) -> Result<Value, SimError> {
        Ok(args.clone())
    }

    fn schema() -> OperationSchema {
        OperationSchema::new(vec![
            ArgRequirement::required("parent", ArgType::String),
            ArgRequirement::optional("page_size", ArgType::Integer),
        ])
    }

    #[test]
    fn test_register_and_get() {
        let registry = OperationRegistry::new();
        registry.register("echo", echo);
        registry.register_with_schema("list", echo, schema());

        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["echo", "list"]);
    }

    #[test]
    fn test_validate_args() {
        let registry = OperationRegistry::new();
        registry.register_with_schema("list", echo, schema());

        assert!(registry
            .validate_args("list", &json!({"parent": "spaces/A", "page_size": null}))
            .is_ok());

        let err = registry
            .validate_args("list", &json!({"page_size": "ten"}))
            .unwrap_err();
        let SimError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.context, "list");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.issues[0].message, "Field required");
        assert_eq!(errors.issues[1].message, "Input should be a valid integer");

        assert!(matches!(
            registry.validate_args("nope", &json!({})),
            Err(SimError::OperationNotFound(_))
        ));
    }

    #[test]
    fn test_strict_schema_and_non_object_args() {
        let strict = schema().strict();
        let err = strict
            .validate("list", &json!({"parent": "p", "color": 1}))
            .unwrap_err();
        assert!(err.to_string().contains("color: Extra inputs are not permitted"));
        assert!(strict.validate("list", &json!([1])).is_err());
    }
}
