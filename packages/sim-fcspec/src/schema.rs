use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::docstring::{parse_docstring, DocParam, Docstring};
use crate::error::FcSpecError;
use crate::types::{map_type, schema_is_nullable};

/// `parameters` block of a function schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    /// Sorted; omitted when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// A function-calling declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Parameters,
}

impl FunctionSchema {
    pub fn to_json(&self) -> Result<Value, FcSpecError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, FcSpecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Property schema for one argument, with the docstring text first and
/// any type note appended in brackets.
fn property_schema(param: &DocParam) -> Value {
    let mut schema = map_type(param.type_name.as_deref().unwrap_or(""));
    let type_note = schema
        .as_object_mut()
        .and_then(|m| m.remove("description"))
        .and_then(|d| d.as_str().map(str::to_string))
        .unwrap_or_default();

    let doc = param.description.trim();
    let description = match (doc.is_empty(), type_note.is_empty()) {
        (false, false) => format!("{} [{}]", doc, type_note),
        (false, true) => doc.to_string(),
        (true, _) => type_note,
    };
    if let Some(map) = schema.as_object_mut() {
        map.insert("description".to_string(), Value::String(description.trim().to_string()));
    }
    schema
}

/// Builds a schema from an already parsed docstring.
///
/// A parameter is required unless it is marked optional, its type is
/// nullable, its description names a default, or it is listed in
/// `params_with_defaults`.
pub fn schema_from_docstring(
    doc: &Docstring,
    name: &str,
    params_with_defaults: &HashSet<String>,
) -> Result<FunctionSchema, FcSpecError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FcSpecError::EmptyFunctionName);
    }

    let mut parameters = Parameters::default();
    for param in &doc.params {
        if parameters.properties.contains_key(&param.name) {
            return Err(FcSpecError::DuplicateParameter {
                function: name.to_string(),
                param: param.name.clone(),
            });
        }
        let schema = property_schema(param);
        let optional = param.is_optional
            || schema_is_nullable(&schema)
            || param.default.is_some()
            || params_with_defaults.contains(&param.name);
        if !optional {
            parameters.required.push(param.name.clone());
        }
        parameters.properties.insert(param.name.clone(), schema);
    }
    parameters.required.sort();

    tracing::debug!(
        function = name,
        params = parameters.properties.len(),
        required = parameters.required.len(),
        "built function schema"
    );
    Ok(FunctionSchema {
        name: name.to_string(),
        description: doc.description(),
        parameters,
    })
}

/// Parses `docstring` and builds the function schema for `name`.
///
/// # Arguments
/// * `docstring` - Google style docstring text
/// * `name` - Function name placed in the schema
/// * `params_with_defaults` - Parameters with a default in the signature
pub fn docstring_to_schema(
    docstring: &str,
    name: &str,
    params_with_defaults: &HashSet<String>,
) -> Result<FunctionSchema, FcSpecError> {
    schema_from_docstring(&parse_docstring(docstring), name, params_with_defaults)
}

/// Reads a docstring from a file and builds its schema.
pub fn schema_from_file(
    path: &Path,
    name: &str,
    params_with_defaults: &HashSet<String>,
) -> Result<FunctionSchema, FcSpecError> {
    let text = std::fs::read_to_string(path)?;
    docstring_to_schema(&text, name, params_with_defaults)
}
