//! Python type hints to JSON schema fragments.

use serde_json::{json, Map, Value};

const OPTIONAL_PREFIX: &str = "Optional[";
const UNION_PREFIX: &str = "Union[";
const LITERAL_PREFIX: &str = "Literal[";
const LIST_PREFIXES: [&str; 2] = ["List[", "list["];
const DICT_PREFIXES: [&str; 2] = ["Dict[", "dict["];
const TUPLE_PREFIXES: [&str; 2] = ["Tuple[", "tuple["];

const ANY_DESCRIPTION: &str = "Represents any type; schema defaulted to 'object'.";

/// JSON type for primitive hints, matched exactly and then lowercased.
fn primitive(hint: &str) -> Option<&'static str> {
    let lookup = |h: &str| match h {
        "str" => Some("string"),
        "int" => Some("integer"),
        "float" => Some("number"),
        "bool" => Some("boolean"),
        "UUID" => Some("string"),
        _ => None,
    };
    lookup(hint).or_else(|| lookup(&hint.to_lowercase()))
}

/// Splits `a, B[c, d], e` at top-level commas, dropping empty parts.
pub fn split_top_level(params: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(params[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(params[start..].trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Inner text of `Prefix[...]`, if `hint` has that shape.
fn generic_inner<'a>(hint: &'a str, prefix: &str) -> Option<&'a str> {
    hint.strip_prefix(prefix)?.strip_suffix(']').map(str::trim)
}

fn generic_inner_any<'a>(hint: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| generic_inner(hint, p))
}

/// Item schemas must carry a `type`.
fn ensure_item_type(schema: Value) -> Value {
    match schema {
        Value::Object(map) if !map.is_empty() => {
            let typed = map.contains_key("$ref")
                || map.get("type").and_then(Value::as_str).is_some_and(|t| !t.is_empty());
            if typed {
                return Value::Object(map);
            }
            let mut with_type = Map::new();
            with_type.insert("type".to_string(), json!("object"));
            with_type.extend(map);
            Value::Object(with_type)
        }
        _ => json!({
            "type": "object",
            "description": "Defaulted item type as original was invalid or empty."
        }),
    }
}

fn is_none_hint(hint: &str) -> bool {
    hint.eq_ignore_ascii_case("none") || hint.eq_ignore_ascii_case("nonetype")
}

/// True when the schema admits null.
pub fn schema_is_nullable(schema: &Value) -> bool {
    if schema.get("nullable") == Some(&Value::Bool(true)) {
        return true;
    }
    schema.get("enum") == Some(&json!([null])) && schema.get("type") == Some(&json!("string"))
}

fn set_description(schema: &mut Value, description: String) {
    if let Some(map) = schema.as_object_mut() {
        map.insert("description".to_string(), Value::String(description));
    }
}

fn with_nullable(mut schema: Value) -> Value {
    if let Some(map) = schema.as_object_mut() {
        map.insert("nullable".to_string(), Value::Bool(true));
    }
    schema
}

fn map_union(inner: &str) -> Value {
    let parts = split_top_level(inner);
    if parts.is_empty() {
        return map_type("Any");
    }
    let hint = format!("Union[{}]", parts.join(", "));
    let nullable = parts.iter().any(|p| is_none_hint(p));
    let non_null: Vec<&String> = parts.iter().filter(|p| !is_none_hint(p)).collect();

    let mut schema = match non_null.as_slice() {
        [] => return map_type("None"),
        [only] => map_type(only),
        [first, ..] => {
            let base_type = map_type(first)
                .get("type")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or("object")
                .to_string();
            let names: Vec<&str> = non_null.iter().map(|s| s.as_str()).collect();
            json!({
                "type": base_type,
                "description": format!(
                    "Value can be one of several Python types: {}. Schema represents the first type ('{}'). Original hint: {}.",
                    names.join(", "),
                    first,
                    hint
                ),
            })
        }
    };

    if !nullable || schema_is_nullable(&schema) {
        return schema;
    }
    let current = schema
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    if !current.to_lowercase().contains("can be null") && !hint.contains("Optional") {
        let note = format!("The value can also be null (originally part of {}).", hint);
        set_description(&mut schema, format!("{} {}", current, note).trim().to_string());
    }
    with_nullable(schema)
}

fn literal_value(raw: &str) -> Value {
    let quoted = raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\'')) || (raw.starts_with('"') && raw.ends_with('"')));
    if quoted {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "True" => return Value::Bool(true),
        "False" => return Value::Bool(false),
        "None" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return json!(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return json!(f);
    }
    Value::String(raw.to_string())
}

fn map_literal(inner: &str) -> Value {
    let values: Vec<Value> = split_top_level(inner).iter().map(|v| literal_value(v)).collect();
    let enum_type = match values.first() {
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => "integer",
        Some(Value::Number(_)) => "number",
        _ => "string",
    };
    json!({"type": enum_type, "enum": values})
}

fn map_tuple(inner: &str) -> Value {
    let any_items = || ensure_item_type(map_type("Any"));
    if inner.is_empty() || inner == "..." {
        return json!({"type": "array", "items": any_items()});
    }
    let variadic = inner
        .strip_suffix("...")
        .map(str::trim_end)
        .and_then(|rest| rest.strip_suffix(','));
    if let Some(item) = variadic {
        return json!({"type": "array", "items": ensure_item_type(map_type(item.trim()))});
    }
    let items: Vec<Value> = split_top_level(inner)
        .iter()
        .map(|t| ensure_item_type(map_type(t)))
        .collect();
    if items.is_empty() {
        return json!({"type": "array", "items": any_items()});
    }
    json!({"type": "array", "prefixItems": items})
}

fn map_dict(inner: &str) -> Value {
    let params = split_top_level(inner);
    let (key, value) = match params.as_slice() {
        [v] => ("string", v.as_str()),
        [k, v] => (k.as_str(), v.as_str()),
        _ => ("string", "any"),
    };
    let mut description = format!(
        "An object/dictionary. Python type hint indicates keys of type '{}' and values of type '{}'.",
        key, value
    );
    if !["str", "string", "any"].contains(&key.to_lowercase().as_str()) {
        description.push_str(
            " Note: JSON object keys are strings; non-string Python dict keys may require stringification.",
        );
    }
    json!({"type": "object", "properties": {}, "description": description})
}

/// Maps a Python type hint such as `Optional[List[str]]` to a JSON schema.
///
/// Unknown capitalised names become open objects; anything else unknown
/// becomes a string noting the unresolved hint.
pub fn map_type(type_hint: &str) -> Value {
    let hint = type_hint.trim();

    if hint.is_empty() || hint == "Any" || hint == "any" {
        return json!({"type": "object", "description": ANY_DESCRIPTION});
    }
    if is_none_hint(hint) {
        return json!({"type": "string", "nullable": true, "enum": [null]});
    }
    if hint == "{}" {
        return json!({
            "type": "object",
            "description": "Represents any type (from '{}' hint); schema defaulted to 'object'."
        });
    }

    if let Some(inner) = generic_inner(hint, OPTIONAL_PREFIX) {
        let base = map_type(if inner.is_empty() { "Any" } else { inner });
        return if schema_is_nullable(&base) {
            base
        } else {
            with_nullable(base)
        };
    }
    if let Some(inner) = generic_inner(hint, UNION_PREFIX) {
        return map_union(inner);
    }
    if let Some(inner) = generic_inner(hint, LITERAL_PREFIX) {
        return map_literal(inner);
    }
    if let Some(inner) = generic_inner_any(hint, &LIST_PREFIXES) {
        let items = map_type(if inner.is_empty() { "Any" } else { inner });
        return json!({"type": "array", "items": ensure_item_type(items)});
    }
    if let Some(inner) = generic_inner_any(hint, &TUPLE_PREFIXES) {
        return map_tuple(inner);
    }
    if let Some(inner) = generic_inner_any(hint, &DICT_PREFIXES) {
        return map_dict(inner);
    }

    match hint.to_lowercase().as_str() {
        "dict" => {
            return json!({
                "type": "object",
                "properties": {},
                "description": "A dictionary object with arbitrary key-value pairs."
            })
        }
        "object" => {
            return json!({"type": "object", "properties": {}, "description": "A generic Python object."})
        }
        "list" | "tuple" => {
            return json!({"type": "array", "items": ensure_item_type(map_type("Any"))})
        }
        _ => {}
    }

    if let Some(json_type) = primitive(hint) {
        return json!({ "type": json_type });
    }
    if hint.starts_with(|c: char| c.is_uppercase()) {
        return json!({
            "type": "object",
            "properties": {},
            "description": format!("Represents an object of type '{}'.", hint)
        });
    }
    json!({"type": "string", "description": format!("Unresolved type: {}", hint)})
}
