//! Core types for the state store.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value held under a key.
///
/// Values of different variants never compare equal, so `Int(1)` and
/// `Float(1.0)` count as distinct values for conditional subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Structured payload (records, lists, anything serde can describe).
    Json(serde_json::Value),
}

impl Value {
    /// Build a structured value from any serializable type.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Value::Json(serde_json::to_value(value)?))
    }

    /// Name of the variant, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
        }
    }

    /// Borrow the string payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render as JSON. Non-finite floats become `null`, bytes become an array.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Json(v) => v.clone(),
        }
    }

    /// Decode into a typed struct through its JSON rendering.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A message delivered to the subscribers of a key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The key now holds `value`.
    Changed { key: String, value: Value },

    /// The key was deleted or its timer fired.
    Expired { key: String },
}

impl Notification {
    pub fn key(&self) -> &str {
        match self {
            Notification::Changed { key, .. } | Notification::Expired { key } => key,
        }
    }

    /// The new value, for change notifications.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Notification::Changed { value, .. } => Some(value),
            Notification::Expired { .. } => None,
        }
    }

    pub fn is_expiration(&self) -> bool {
        matches!(self, Notification::Expired { .. })
    }
}

/// Unique identifier for a subscription within one store.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_differing_variants_are_unequal() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::from("1"), Value::Json(json!("1")));
        assert_ne!(Value::Null, Value::Json(serde_json::Value::Null));
        assert_eq!(Value::from("a"), Value::String("a".to_string()));
    }

    #[test]
    fn test_nan_never_equal() {
        let nan = Value::Float(f64::NAN);
        assert_ne!(nan, nan.clone());
    }

    #[test]
    fn test_struct_through_json() {
        let value = Value::from_serialize(&Position { x: 3, y: -4 }).unwrap();
        assert_eq!(value.type_name(), "json");
        let decoded: Position = value.decode().unwrap();
        assert_eq!(decoded, Position { x: 3, y: -4 });
    }

    #[test]
    fn test_decode_mismatch_is_error() {
        let result: Result<Position> = Value::from("nope").decode();
        assert!(matches!(result, Err(StoreError::Deserialization(_))));
    }

    #[test]
    fn test_to_json_edge_cases() {
        assert_eq!(Value::Float(f64::INFINITY).to_json(), serde_json::Value::Null);
        assert_eq!(Value::Bytes(vec![1, 2]).to_json(), json!([1, 2]));
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert!(Value::from(None::<&str>).is_null());
        assert!(!Value::Json(serde_json::Value::Null).is_null());
    }

    #[test]
    fn test_notification_serde_shape() {
        let n = Notification::Expired {
            key: "session".to_string(),
        };
        let encoded = serde_json::to_value(&n).unwrap();
        assert_eq!(encoded, json!({"type": "expired", "key": "session"}));

        let changed = Notification::Changed {
            key: "k".to_string(),
            value: Value::Int(7),
        };
        let round: Notification =
            serde_json::from_value(serde_json::to_value(&changed).unwrap()).unwrap();
        assert_eq!(round, changed);
        assert_eq!(round.value(), Some(&Value::Int(7)));
        assert!(!round.is_expiration());
    }
}
