//! Engine boundary
//!
//! The relational engine is an external collaborator. It is driven through
//! [`SqlEngine`]: `exec` dispatches one statement and reports results as
//! asynchronous [`EngineEvent`]s pushed into an [`EventSink`], independently
//! of the future it returns.
//!
//! Event protocol for one `exec` call:
//! - zero or more `Row { sequence: Some(n), row: Some(..) }`, in result order;
//! - `Row { sequence: None, row: None }` once the result stream is exhausted;
//! - at most one `Error(detail)` if the statement failed;
//! - `Unhandled(payload)` for engine messages that fit none of the above.

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use crate::core::ErrorDetail;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Row {
        sequence: Option<u64>,
        row: Option<Map<String, JsonValue>>,
    },
    Error(ErrorDetail),
    Unhandled(JsonValue),
}

impl EngineEvent {
    pub fn row(sequence: u64, row: Map<String, JsonValue>) -> Self {
        EngineEvent::Row {
            sequence: Some(sequence),
            row: Some(row),
        }
    }

    pub fn end_of_stream() -> Self {
        EngineEvent::Row {
            sequence: None,
            row: None,
        }
    }

    /// Interpret a raw row message of the form `{"rowNumber": n, "row": {..}}`
    /// (`sequence` is accepted as an alias). A null or missing number marks
    /// end-of-stream; any other non-integer number, or a row that is not an
    /// object, is reported as unhandled.
    pub fn from_row_message(message: JsonValue) -> Self {
        let JsonValue::Object(mut fields) = message else {
            return EngineEvent::Unhandled(message);
        };

        let sequence = match fields.get("rowNumber").or_else(|| fields.get("sequence")) {
            None | Some(JsonValue::Null) => None,
            Some(number) => match number.as_u64() {
                Some(sequence) => Some(sequence),
                None => return EngineEvent::Unhandled(JsonValue::Object(fields)),
            },
        };

        match fields.remove("row") {
            Some(JsonValue::Object(row)) => EngineEvent::Row {
                sequence,
                row: Some(row),
            },
            None | Some(JsonValue::Null) => EngineEvent::Row {
                sequence,
                row: None,
            },
            Some(other) => {
                fields.insert("row".to_string(), other);
                EngineEvent::Unhandled(JsonValue::Object(fields))
            }
        }
    }
}

/// Sending half of the per-statement event channel.
///
/// Sends never block. They return `false` once the adapter has stopped
/// listening, which only happens after the statement completed.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn row(&self, sequence: u64, row: Map<String, JsonValue>) -> bool {
        self.send(EngineEvent::row(sequence, row))
    }

    pub fn end_of_stream(&self) -> bool {
        self.send(EngineEvent::end_of_stream())
    }

    pub fn error(&self, detail: ErrorDetail) -> bool {
        self.send(EngineEvent::Error(detail))
    }

    pub fn unhandled(&self, payload: JsonValue) -> bool {
        self.send(EngineEvent::Unhandled(payload))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Asynchronous request/event interface of a relational engine.
///
/// A returned `Err` from `exec` means the request never reached the engine
/// (transport failure). Statement failures are reported through
/// [`EventSink::error`] instead and `exec` still returns `Ok`.
#[async_trait]
pub trait SqlEngine: Send {
    async fn open(&mut self, filename: &str) -> Result<(), ErrorDetail>;

    async fn exec(&mut self, sql: &str, events: EventSink) -> Result<(), ErrorDetail>;

    async fn close(&mut self) -> Result<(), ErrorDetail> {
        Ok(())
    }
}
