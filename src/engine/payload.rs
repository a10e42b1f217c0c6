//! Conversion between host state (keyed by host names) and API payloads (keyed
//! by wire names).

use crate::spec::schema::{PropertyType, SchemaDefinition, SchemaProperty};
use serde_json::{Map, Value};

/// Request body from host state: writable properties only, nulls dropped
#[must_use]
pub fn state_to_payload(
    schema: &SchemaDefinition,
    state: &Map<String, Value>,
) -> Map<String, Value> {
    let mut payload = Map::new();
    for property in schema.input_properties() {
        let Some(value) = state.get(&property.terraform_name()) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        payload.insert(property.name.clone(), value_to_payload(property, value));
    }
    payload
}

fn value_to_payload(property: &SchemaProperty, value: &Value) -> Value {
    let Some(nested) = property.nested.as_deref() else {
        return value.clone();
    };
    match (property.property_type, value) {
        (PropertyType::Object, Value::Object(map)) => Value::Object(state_to_payload(nested, map)),
        (PropertyType::List, Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Value::Object(state_to_payload(nested, map)),
                    other => other.clone(),
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Host state from an API payload.
///
/// Properties the API did not return keep their prior value; lists marked
/// `ignore_item_order` keep the prior order when they hold the same items. The
/// top-level property named `id` is owned by the host and is skipped.
#[must_use]
pub fn payload_to_state(
    schema: &SchemaDefinition,
    payload: &Map<String, Value>,
    prior: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    convert_object(schema, payload, prior, true)
}

fn convert_object(
    schema: &SchemaDefinition,
    payload: &Map<String, Value>,
    prior: Option<&Map<String, Value>>,
    top_level: bool,
) -> Map<String, Value> {
    let mut state = Map::new();
    for property in &schema.properties {
        let key = property.terraform_name();
        if top_level && key == crate::constants::PROPERTY_ID {
            continue;
        }
        let previous = prior.and_then(|p| p.get(&key));
        let value = match payload.get(&property.name) {
            Some(value) if !value.is_null() => value_to_state(property, value, previous),
            _ => match previous {
                Some(previous) => previous.clone(),
                None => continue,
            },
        };
        state.insert(key, value);
    }
    state
}

fn value_to_state(property: &SchemaProperty, value: &Value, previous: Option<&Value>) -> Value {
    let nested = property.nested.as_deref();
    match (property.property_type, value) {
        (PropertyType::Object, Value::Object(map)) => nested.map_or_else(
            || value.clone(),
            |n| Value::Object(convert_object(n, map, previous.and_then(Value::as_object), false)),
        ),
        (PropertyType::List, Value::Array(items)) => {
            let converted: Vec<Value> = items
                .iter()
                .map(|item| match (nested, item) {
                    (Some(n), Value::Object(map)) => {
                        Value::Object(convert_object(n, map, None, false))
                    }
                    _ => item.clone(),
                })
                .collect();
            match previous {
                Some(Value::Array(prior))
                    if property.ignore_item_order && same_items(prior, &converted) =>
                {
                    Value::Array(prior.clone())
                }
                _ => Value::Array(converted),
            }
        }
        _ => value.clone(),
    }
}

/// Multiset equality
fn same_items(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut remaining: Vec<&Value> = b.iter().collect();
    a.iter().all(|item| {
        remaining
            .iter()
            .position(|candidate| *candidate == item)
            .map(|index| remaining.swap_remove(index))
            .is_some()
    })
}

/// Identifier value as a string
#[must_use]
pub fn extract_identifier(
    schema: &SchemaDefinition,
    payload: &Map<String, Value>,
) -> Option<String> {
    let identifier = schema.identifier()?;
    scalar_to_string(payload.get(&identifier.name)?)
}

/// Value at the schema's status field path
#[must_use]
pub fn extract_status(schema: &SchemaDefinition, payload: &Map<String, Value>) -> Option<String> {
    let path = schema.status_field_path()?;
    let (last, parents) = path.split_last()?;
    let mut current = payload;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    scalar_to_string(current.get(last)?)
}

/// Identifiers and statuses may be numbers or booleans on the wire
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
