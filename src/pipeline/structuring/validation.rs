// Schema derivation and validation for model output.
// The schema comes from the result type via schemars, is flattened so it can be
// sent to the provider, and then doubles as the validator for the returned JSON.

use std::fmt;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value};

/// Keywords the provider's schema dialect does not accept.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "title",
    "definitions",
    "$defs",
    "additionalProperties",
    "default",
    "examples",
];

/// Maximum `$ref` nesting followed while inlining (guards recursive types).
const MAX_REF_DEPTH: usize = 16;

/// A single failing field, addressed by its JSON path (e.g. `findings[0].status`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub path: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() { "(root)".into() } else { path.to_string() },
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Derive the inlined JSON schema for a response type.
pub fn response_schema<T: JsonSchema>() -> Value {
    let root = schemars::schema_for!(T);
    // RootSchema always serializes; fall back to an open object if it ever does not.
    let root = serde_json::to_value(root).unwrap_or_else(|_| Value::Object(Map::new()));
    inline_schema(&root)
}

/// Resolve `$ref`s against the root definitions and drop unsupported keywords.
pub fn inline_schema(root: &Value) -> Value {
    let definitions = root
        .get("definitions")
        .or_else(|| root.get("$defs"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    inline_node(root, &definitions, 0)
}

fn inline_node(node: &Value, definitions: &Map<String, Value>, depth: usize) -> Value {
    match node {
        Value::Object(map) => {
            if let Some(target) = map.get("$ref").and_then(Value::as_str) {
                let name = target.rsplit('/').next().unwrap_or(target);
                if depth < MAX_REF_DEPTH {
                    if let Some(def) = definitions.get(name) {
                        let mut resolved = inline_node(def, definitions, depth + 1);
                        // Sibling keywords (typically a field description) win over the definition's.
                        if let Value::Object(resolved_map) = &mut resolved {
                            for (key, value) in map {
                                if key != "$ref" && !UNSUPPORTED_KEYWORDS.contains(&key.as_str()) {
                                    resolved_map.insert(key.clone(), inline_node(value, definitions, depth));
                                }
                            }
                        }
                        return resolved;
                    }
                }
                return Value::Object(Map::new());
            }

            // schemars wraps a described $ref in allOf: [{ $ref }]
            if let Some(Value::Array(all_of)) = map.get("allOf") {
                if all_of.len() == 1 {
                    let mut merged = inline_node(&all_of[0], definitions, depth);
                    if let Value::Object(merged_map) = &mut merged {
                        for (key, value) in map {
                            if key != "allOf" && !UNSUPPORTED_KEYWORDS.contains(&key.as_str()) {
                                merged_map.insert(key.clone(), inline_node(value, definitions, depth));
                            }
                        }
                    }
                    return merged;
                }
            }

            let mut out = Map::new();
            for (key, value) in map {
                if UNSUPPORTED_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                let inlined = if key == "properties" {
                    // Property names are data, not keywords.
                    match value {
                        Value::Object(props) => Value::Object(
                            props
                                .iter()
                                .map(|(name, schema)| {
                                    (name.clone(), inline_node(schema, definitions, depth))
                                })
                                .collect(),
                        ),
                        other => other.clone(),
                    }
                } else {
                    inline_node(value, definitions, depth)
                };
                out.insert(key.clone(), inlined);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| inline_node(item, definitions, depth))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Validate a JSON value against an inlined schema.
///
/// Unknown properties are ignored. Missing required properties, type
/// mismatches and enum values outside the declared set are violations;
/// enum matching is exact, so `"High"` does not satisfy `["low","normal","high"]`.
pub fn validate_against_schema(schema: &Value, value: &Value) -> Result<(), FieldViolation> {
    validate_node(schema, value, "")
}

fn validate_node(schema: &Value, value: &Value, path: &str) -> Result<(), FieldViolation> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected) = schema.get("type") {
        if !type_matches(expected, value) {
            return Err(FieldViolation::new(
                path,
                format!("expected {}, found {}", describe_type(expected), json_type_name(value)),
            ));
        }
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(value) {
            let options = allowed
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(FieldViolation::new(
                path,
                format!("value {value} is not one of [{options}]"),
            ));
        }
    }

    if let Value::Object(fields) = value {
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    return Err(FieldViolation::new(
                        &join_path(path, name),
                        "required field is missing",
                    ));
                }
            }
        }
        if let Some(Value::Object(properties)) = schema.get("properties") {
            for (name, property_schema) in properties {
                if let Some(field_value) = fields.get(name) {
                    validate_node(property_schema, field_value, &join_path(path, name))?;
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (index, item) in items.iter().enumerate() {
            validate_node(item_schema, item, &format!("{path}[{index}]"))?;
        }
    }

    Ok(())
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => single_type_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| single_type_matches(name, value)),
        _ => true,
    }
}

fn single_type_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
