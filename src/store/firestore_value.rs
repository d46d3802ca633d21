//! Conversion between Firestore's typed `Value` JSON and plain `serde_json::Value`.
//!
//! Firestore REST wraps every field in a one-key object naming its type
//! (`{"integerValue": "3"}`, `{"mapValue": {"fields": {...}}}`, ...). The rest
//! of the crate works with untyped JSON, so values are unwrapped on read and
//! wrapped again on write. Timestamps, bytes and references decode to strings.

use serde_json::{json, Map, Number, Value};

use crate::types::errors::StoreError;

/// Unwraps a typed Firestore value.
pub fn decode_value(typed: &Value) -> Result<Value, StoreError> {
    let obj = typed
        .as_object()
        .ok_or_else(|| StoreError::DecodeError(format!("expected typed value, got {}", typed)))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::DecodeError("empty typed value".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(inner.clone()),
        "integerValue" => {
            // int64 travels as a JSON string
            let n = match inner {
                Value::String(s) => s.parse::<i64>().map_err(|e| {
                    StoreError::DecodeError(format!("bad integerValue {:?}: {}", s, e))
                })?,
                Value::Number(n) => n.as_i64().ok_or_else(|| {
                    StoreError::DecodeError(format!("bad integerValue {}", n))
                })?,
                other => {
                    return Err(StoreError::DecodeError(format!("bad integerValue {}", other)))
                }
            };
            Ok(Value::Number(n.into()))
        }
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN and the infinities arrive as strings and have no JSON number form
            Value::String(s) => Ok(Value::String(s.clone())),
            other => Err(StoreError::DecodeError(format!("bad doubleValue {}", other))),
        },
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vs| vs.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Object(fields))
        }
        other => Err(StoreError::DecodeError(format!("unknown value type {}", other))),
    }
}

/// Unwraps every field of a Firestore `fields` map.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

/// Wraps a plain JSON value into Firestore's typed form.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => encode_number(n),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Wraps every field of a plain JSON object.
pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

fn encode_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        json!({ "integerValue": i.to_string() })
    } else {
        json!({ "doubleValue": n.as_f64().unwrap_or(f64::NAN) })
    }
}

/// Quotes a field path segment with backticks unless it is a simple identifier.
pub fn quote_field_path(field: &str) -> String {
    let simple = field
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
