//! Part Codec: conversion between the typed [`Part`] variant and the
//! language-neutral dict form used for JSON persistence.
//!
//! Grounded on `utils/converters.py` (`_convert_value_for_json`,
//! `_convert_part_to_dict`, `reconstruct_content_object`,
//! `_serialize_parts`, `_deserialize_parts`).

use serde_json::{Map, Value};

use crate::llm::provider::Role;

/// One request-scoped piece of a model turn. A single `Part` carries exactly
/// one variant — mirrors spec.md §3's "tagged variant over
/// {Text, ToolCall, ToolResponse}".
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    ToolCall { name: String, args: Map<String, Value> },
    ToolResponse { name: String, result: Map<String, Value> },
}

/// Recursively normalize an arbitrary JSON value into something safe to
/// persist: object keys are already strings in `serde_json::Value`, so the
/// "coerce map keys to strings" and "flatten SDK map-composite types" steps
/// of the Python original collapse into a structural walk that keeps maps
/// and arrays as-is and leaves scalars untouched. Kept as a distinct pass
/// (rather than a no-op) because future callers constructing `args`/
/// `response` from outside `serde_json` (e.g. a different wire format) can
/// run their value through here before handing it to [`to_dict`].
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, normalize_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        other => other,
    }
}

/// Coerce a normalized value into the map shape `args`/`response` require.
/// Anything that isn't already an object falls back to a single-key error
/// map, matching the Python original's `{"error": ...}` fallback on
/// conversion failure.
fn as_args_map(value: Value) -> Map<String, Value> {
    match normalize_value(value) {
        Value::Object(map) => map,
        other => {
            log::warn!("part codec: expected object for args/response, got {:?}", other);
            let mut fallback = Map::new();
            fallback.insert("error".to_string(), Value::String(format!("{}", other)));
            fallback
        }
    }
}

/// Emit exactly one of `{text, function_call, function_response}` keys.
/// Empty text with no other content yields `None` (caller drops the part).
pub fn to_dict(part: &Part) -> Option<Value> {
    match part {
        Part::Text(text) => {
            if text.is_empty() {
                None
            } else {
                let mut obj = Map::new();
                obj.insert("text".to_string(), Value::String(text.clone()));
                Some(Value::Object(obj))
            }
        }
        Part::ToolCall { name, args } => {
            if name.trim().is_empty() {
                log::debug!("part codec: dropping tool-call part with empty name");
                return None;
            }
            let mut fc = Map::new();
            fc.insert("name".to_string(), Value::String(name.clone()));
            fc.insert("args".to_string(), Value::Object(args.clone()));
            let mut obj = Map::new();
            obj.insert("function_call".to_string(), Value::Object(fc));
            Some(Value::Object(obj))
        }
        Part::ToolResponse { name, result } => {
            if name.trim().is_empty() {
                log::debug!("part codec: dropping tool-response part with empty name");
                return None;
            }
            let mut fr = Map::new();
            fr.insert("name".to_string(), Value::String(name.clone()));
            fr.insert("response".to_string(), Value::Object(result.clone()));
            let mut obj = Map::new();
            obj.insert("function_response".to_string(), Value::Object(fr));
            Some(Value::Object(obj))
        }
    }
}

/// A reconstructed model turn: a role plus its in-order parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Build `Part`s in order from `[dict]`; drops parts with empty name in a
/// tool-call/response, drops parts with no content entirely. Returns `None`
/// if no valid parts remain.
pub fn reconstruct(role: Role, dicts: &[Value]) -> Option<Content> {
    let mut parts = Vec::new();

    for dict in dicts {
        let Some(obj) = dict.as_object() else {
            continue;
        };

        if let Some(Value::String(text)) = obj.get("text") {
            if !text.is_empty() {
                parts.push(Part::Text(text.clone()));
                continue;
            }
        }

        if let Some(fc) = obj.get("function_call").and_then(Value::as_object) {
            let name = fc
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if name.trim().is_empty() {
                continue;
            }
            let args = fc
                .get("args")
                .cloned()
                .map(as_args_map)
                .unwrap_or_default();
            parts.push(Part::ToolCall { name, args });
            continue;
        }

        if let Some(fr) = obj.get("function_response").and_then(Value::as_object) {
            let name = fr
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if name.trim().is_empty() {
                continue;
            }
            let result = fr
                .get("response")
                .cloned()
                .map(as_args_map)
                .unwrap_or_default();
            parts.push(Part::ToolResponse { name, result });
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(Content { role, parts })
    }
}

/// JSON encode a Part list. On type error, return `"[]"` and log.
pub fn serialize_parts(parts: &[Part]) -> String {
    let dicts: Vec<Value> = parts.iter().filter_map(to_dict).collect();
    match serde_json::to_string(&dicts) {
        Ok(json) => json,
        Err(err) => {
            log::error!("part codec: failed to serialize parts: {}", err);
            "[]".to_string()
        }
    }
}

/// JSON decode; on decode failure return a one-element sentinel list so the
/// caller can skip the entry explicitly.
pub fn deserialize_parts(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(dicts) => dicts,
        Err(err) => {
            log::warn!("part codec: failed to deserialize parts: {}", err);
            let mut sentinel = Map::new();
            sentinel.insert(
                "error".to_string(),
                Value::String("deserialization_failed".to_string()),
            );
            vec![Value::Object(sentinel)]
        }
    }
}

/// `true` for the sentinel `deserialize_parts` emits on decode failure.
pub fn is_deserialization_sentinel(dict: &Value) -> bool {
    dict.get("error")
        .and_then(Value::as_str)
        .map(|s| s == "deserialization_failed")
        .unwrap_or(false)
}
