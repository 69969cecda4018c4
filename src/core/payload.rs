//! Payload conversion between the native envelope and the structured record.
//!
//! The native side speaks [`NativeEnvelope`], a typed key-value envelope.
//! The script side speaks flat JSON records. [`Payload`] is the structured
//! middle: string keys mapped to [`Scalar`] values. Conversion is lossy by
//! contract — a field that cannot be represented on the destination side is
//! logged and dropped, never escalated — so a single malformed field can
//! never take down a whole delivery.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::BridgeError;

/// A single structured payload value.
///
/// Variant order matters for untagged deserialization: integers must be
/// tried before floats so `1` stays an `Int`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Coerce a JSON value into a scalar, `None` when no coercion exists
    /// (null, array, nested object, or a number outside both i64 and f64).
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else {
                    n.as_f64().map(Scalar::Float)
                }
            }
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => Value::from(*f),
            Scalar::Str(s) => Value::String(s.clone()),
        }
    }
}

/// A flat record: unordered string keys, unique, scalar values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload(BTreeMap<String, Scalar>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Scalar) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.0.iter()
    }

    /// Render as the flat JSON record the script side receives.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.0 {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Parse a JSON value as a flat record.
    ///
    /// The top level must be an object; anything else is a format error.
    /// Individual fields that do not coerce to a scalar are logged and
    /// dropped, and parsing continues over the remaining fields.
    pub fn from_json(value: &Value) -> Result<Payload, BridgeError> {
        let Value::Object(map) = value else {
            return Err(BridgeError::Format(format!(
                "expected a flat record, got {}",
                json_kind(value)
            )));
        };
        let mut payload = Payload::new();
        for (key, field) in map {
            match Scalar::from_json(field) {
                Some(scalar) => payload.insert(key.clone(), scalar),
                None => {
                    log::warn!("dropping field '{}': not a scalar value", key);
                }
            }
        }
        Ok(payload)
    }
}

/// A value the platform broadcast envelope can carry.
///
/// Only the four scalar variants cross the bridge; anything else is skipped
/// during decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Blob(Vec<u8>),
}

/// The typed key-value envelope attached to a native broadcast.
pub type NativeEnvelope = HashMap<String, NativeValue>;

/// Native→structured conversion. Never fails as a whole: envelope entries
/// with no scalar representation are logged at debug and skipped.
pub fn decode_envelope(envelope: &NativeEnvelope) -> Payload {
    let mut payload = Payload::new();
    for (key, value) in envelope {
        match value {
            NativeValue::Text(s) => payload.insert(key.clone(), Scalar::Str(s.clone())),
            NativeValue::Int(i) => payload.insert(key.clone(), Scalar::Int(*i)),
            NativeValue::Float(f) => payload.insert(key.clone(), Scalar::Float(*f)),
            NativeValue::Bool(b) => payload.insert(key.clone(), Scalar::Bool(*b)),
            NativeValue::Blob(bytes) => {
                log::debug!(
                    "skipping envelope entry '{}': {} byte blob has no scalar form",
                    key,
                    bytes.len()
                );
            }
        }
    }
    payload
}

/// Structured→native conversion for the publish path.
///
/// The top level must be a JSON object or the whole payload is rejected with
/// a format error. Per field, coercion failure drops that field only.
pub fn encode_value(value: &Value) -> Result<NativeEnvelope, BridgeError> {
    let payload = Payload::from_json(value)?;
    Ok(encode_payload(&payload))
}

/// Map a structured record onto the native envelope. Infallible: every
/// scalar has a native representation.
pub fn encode_payload(payload: &Payload) -> NativeEnvelope {
    let mut envelope = NativeEnvelope::new();
    for (key, value) in payload.iter() {
        let native = match value {
            Scalar::Str(s) => NativeValue::Text(s.clone()),
            Scalar::Int(i) => NativeValue::Int(*i),
            Scalar::Float(f) => NativeValue::Float(*f),
            Scalar::Bool(b) => NativeValue::Bool(*b),
        };
        envelope.insert(key.clone(), native);
    }
    envelope
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_coercion_covers_the_four_types() {
        assert_eq!(Scalar::from_json(&json!("x")), Some(Scalar::Str("x".into())));
        assert_eq!(Scalar::from_json(&json!(1)), Some(Scalar::Int(1)));
        assert_eq!(Scalar::from_json(&json!(1.5)), Some(Scalar::Float(1.5)));
        assert_eq!(Scalar::from_json(&json!(true)), Some(Scalar::Bool(true)));
    }

    #[test]
    fn scalar_coercion_rejects_non_scalars() {
        assert_eq!(Scalar::from_json(&Value::Null), None);
        assert_eq!(Scalar::from_json(&json!([1, 2])), None);
        assert_eq!(Scalar::from_json(&json!({"k": 1})), None);
    }

    #[test]
    fn from_json_requires_top_level_object() {
        let err = Payload::from_json(&json!("just a string")).unwrap_err();
        assert_eq!(err.code(), "JSON_ERROR");
        let err = Payload::from_json(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.code(), "JSON_ERROR");
    }

    #[test]
    fn from_json_drops_only_the_bad_field() {
        let payload =
            Payload::from_json(&json!({"a": "x", "nested": {"k": 1}, "b": 2})).unwrap();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.get("a"), Some(&Scalar::Str("x".into())));
        assert_eq!(payload.get("b"), Some(&Scalar::Int(2)));
        assert_eq!(payload.get("nested"), None);
    }

    #[test]
    fn envelope_decode_skips_blobs() {
        let mut envelope = NativeEnvelope::new();
        envelope.insert("msg".into(), NativeValue::Text("hi".into()));
        envelope.insert("raw".into(), NativeValue::Blob(vec![1, 2, 3]));
        let payload = decode_envelope(&envelope);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get("msg"), Some(&Scalar::Str("hi".into())));
    }

    #[test]
    fn round_trip_preserves_types_and_values() {
        let record = json!({"a": "x", "b": 1, "c": 1.5, "d": true});
        let envelope = encode_value(&record).unwrap();
        assert_eq!(envelope.len(), 4);
        let back = decode_envelope(&envelope);
        assert_eq!(back.to_json(), record);
    }
}
