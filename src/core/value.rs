use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::fmt;

/// A single field value of a [`Record`](super::Record).
///
/// The set is closed: every value a caller can hand to the adapter is one of
/// these variants, and [`classify`] maps each of them to exactly one
/// [`ValueKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    /// Nested object, array or null. Stored as JSON text.
    Json(JsonValue),
}

/// Classification shared by schema inference and literal rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Temporal,
    Structured,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::Structured => "structured",
        };
        f.write_str(name)
    }
}

/// Total classification of a field value.
pub fn classify(value: &Value) -> ValueKind {
    match value {
        Value::Text(_) => ValueKind::String,
        Value::Boolean(_) => ValueKind::Boolean,
        Value::Integer(_) => ValueKind::Integer,
        Value::Float(_) => ValueKind::Float,
        Value::Timestamp(_) => ValueKind::Temporal,
        Value::Json(_) => ValueKind::Structured,
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        classify(self)
    }

    /// Convert a JSON value into a field value.
    ///
    /// Integral numbers that fit in `i64` become `Integer`, every other
    /// number becomes `Float`. With `detect_timestamps`, RFC 3339 strings
    /// become `Timestamp`. Objects, arrays and null stay structured.
    pub fn from_json(value: JsonValue, detect_timestamps: bool) -> Self {
        match value {
            JsonValue::String(s) => {
                if detect_timestamps {
                    if let Ok(ts) = DateTime::parse_from_rfc3339(&s) {
                        return Value::Timestamp(ts.with_timezone(&Utc));
                    }
                }
                Value::Text(s)
            }
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or(Value::Json(JsonValue::Number(n))),
            },
            other => Value::Json(other),
        }
    }

    /// JSON form of the value. Timestamps render as RFC 3339 strings and
    /// non-finite floats as null.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
            Value::Json(j) => j.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::from_json(value, false)
    }
}
