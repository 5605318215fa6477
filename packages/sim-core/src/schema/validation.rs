//! Validation of JSON values against record schemas.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;
use serde_json::Value;

use super::field::{Constraints, FieldKind, FieldRule};
use super::RecordSchema;
use crate::datetime;
use crate::error::ValidationErrors;

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Returns the compiled regex for a `pattern` constraint, compiling each
/// distinct pattern once per process.
pub(super) fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    static PATTERNS: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();
    let cache = PATTERNS.get_or_init(|| RwLock::new(HashMap::new()));

    if let Ok(compiled) = cache.read() {
        if let Some(re) = compiled.get(pattern) {
            return Ok(re.clone());
        }
    }
    let re = Regex::new(pattern)?;
    if let Ok(mut compiled) = cache.write() {
        compiled.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

/// Validates `record` against `schema`, recording issues under `path`.
pub(crate) fn validate_record(
    schema: &RecordSchema,
    record: &Value,
    path: &str,
    errors: &mut ValidationErrors,
) {
    let Some(obj) = record.as_object() else {
        errors.push(path, "Input should be a valid dictionary");
        return;
    };

    for rule in &schema.fields {
        let field_path = join_path(path, &rule.name);
        match obj.get(&rule.name) {
            None => {
                if rule.required {
                    errors.push(field_path, "Field required");
                }
            }
            Some(Value::Null) => {
                if !rule.nullable {
                    errors.push(field_path, "Input should not be null");
                }
            }
            Some(value) => validate_field(rule, value, &field_path, errors),
        }
    }

    if !schema.allow_unknown {
        for key in obj.keys() {
            if schema.rule(key).is_none() {
                errors.push(join_path(path, key), "Extra inputs are not permitted");
            }
        }
    }
}

fn validate_field(rule: &FieldRule, value: &Value, path: &str, errors: &mut ValidationErrors) {
    if validate_kind(&rule.kind, value, path, errors) {
        validate_constraints(&rule.constraints, value, path, errors);
    }
}

/// Checks the value's shape. Returns false when constraints should be skipped.
fn validate_kind(kind: &FieldKind, value: &Value, path: &str, errors: &mut ValidationErrors) -> bool {
    let ok = match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.is_i64() || value.is_u64(),
        FieldKind::Number => value.is_number(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Any => true,
        FieldKind::DateTime { format } => match value.as_str() {
            Some(s) => {
                if !datetime::is_valid(s) {
                    errors.push(path, format!("Input should be a valid datetime, got '{}'", s));
                    return false;
                }
                if !datetime::conforms_to(s, *format) {
                    errors.push(
                        path,
                        format!("Input should be a datetime in {} format, got '{}'", format, s),
                    );
                    return false;
                }
                true
            }
            None => false,
        },
        FieldKind::Object { schema } => {
            if value.is_object() {
                validate_record(schema, value, path, errors);
                true
            } else {
                false
            }
        }
        FieldKind::Array { items } => match value.as_array() {
            Some(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    let element_path = format!("{}[{}]", path, i);
                    if element.is_null() {
                        errors.push(element_path, "Input should not be null");
                    } else {
                        validate_kind(items, element, &element_path, errors);
                    }
                }
                true
            }
            None => false,
        },
    };

    if !ok {
        errors.push(path, format!("Input should be a valid {}", kind.describe()));
    }
    ok
}

fn validate_constraints(
    constraints: &Constraints,
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
) {
    if let Some(s) = value.as_str() {
        let len = s.chars().count();
        if let Some(min) = constraints.min_length {
            if len < min {
                errors.push(
                    path,
                    format!("String should have at least {} characters", min),
                );
            }
        }
        if let Some(max) = constraints.max_length {
            if len > max {
                errors.push(path, format!("String should have at most {} characters", max));
            }
        }
        if let Some(pattern) = &constraints.pattern {
            match compiled_pattern(pattern) {
                Ok(re) => {
                    if !re.is_match(s) {
                        errors.push(path, format!("String should match pattern '{}'", pattern));
                    }
                }
                Err(e) => errors.push(path, format!("Invalid pattern '{}': {}", pattern, e)),
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = constraints.min {
            if n < min {
                errors.push(
                    path,
                    format!("Input should be greater than or equal to {}", min),
                );
            }
        }
        if let Some(max) = constraints.max {
            if n > max {
                errors.push(path, format!("Input should be less than or equal to {}", max));
            }
        }
    }

    if let Some(items) = value.as_array() {
        if let Some(min) = constraints.min_items {
            if items.len() < min {
                errors.push(path, format!("List should have at least {} items", min));
            }
        }
        if let Some(max) = constraints.max_items {
            if items.len() > max {
                errors.push(path, format!("List should have at most {} items", max));
            }
        }
    }

    if !constraints.one_of.is_empty() && !constraints.one_of.contains(value) {
        let allowed: Vec<String> = constraints.one_of.iter().map(describe_value).collect();
        errors.push(
            path,
            format!("Input should be {}", join_alternatives(&allowed)),
        );
    }
}

fn join_alternatives(values: &[String]) -> String {
    match values {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}
