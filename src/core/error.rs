use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

/// Failure reported by the engine for a dispatched statement.
///
/// `data` is the engine's payload, kept as-is so callers can inspect
/// engine-specific fields (error codes, the offending statement, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default)]
    pub data: JsonValue,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>, data: JsonValue) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(message, JsonValue::Null)
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Engine error: {0}")]
    EngineError(ErrorDetail),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DbError {
    /// Validation, protocol and decode failures are programmer errors and
    /// will fail the same way again. Only engine failures may be transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EngineError(_))
    }

    /// Engine detail carried by an `EngineError`.
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::EngineError(detail) => Some(detail),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::ProtocolError(format!("adapter state poisoned: {}", err))
    }
}
