/// Request/event bridge tests with hand-written engines
///
/// Run with: cargo test --test bridge_protocol_tests
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue, json};
use sqlbridge::{AdapterConfig, DbError, ErrorDetail, EventSink, JsonStorageAdapter, SqlEngine, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn row(value: JsonValue) -> Map<String, JsonValue> {
    value.as_object().cloned().unwrap()
}

/// Emits one row, then waits until the row handler has seen it before
/// emitting the rest. Deadlocks if rows are only delivered after `exec`
/// returns.
struct HandshakeEngine {
    ack: Arc<Notify>,
}

#[async_trait]
impl SqlEngine for HandshakeEngine {
    async fn open(&mut self, _filename: &str) -> Result<(), ErrorDetail> {
        Ok(())
    }

    async fn exec(&mut self, _sql: &str, events: EventSink) -> Result<(), ErrorDetail> {
        events.row(1, row(json!({"id": 1, "payload_json": "{\"step\":1}"})));
        self.ack.notified().await;
        events.row(2, row(json!({"id": 2, "payload_json": "{\"step\":2}"})));
        events.end_of_stream();
        Ok(())
    }
}

#[tokio::test]
async fn test_rows_are_streamed_while_statement_runs() -> anyhow::Result<()> {
    let ack = Arc::new(Notify::new());
    let engine = HandshakeEngine { ack: ack.clone() };
    let adapter = JsonStorageAdapter::new(Box::new(engine), AdapterConfig::in_memory())?;

    let mut seen = Vec::new();
    let count = tokio::time::timeout(
        Duration::from_secs(5),
        adapter.query("SELECT * FROM steps", |record| {
            seen.push(record);
            ack.notify_one();
        }),
    )
    .await??;

    assert_eq!(count, 2);
    assert_eq!(seen[0].get("payload"), Some(&Value::Json(json!({"step": 1}))));
    assert_eq!(seen[1].get("id"), Some(&Value::Integer(2)));
    Ok(())
}

/// Replays a fixed list of raw row messages and engine errors.
struct ReplayEngine {
    messages: Vec<JsonValue>,
}

#[async_trait]
impl SqlEngine for ReplayEngine {
    async fn open(&mut self, _filename: &str) -> Result<(), ErrorDetail> {
        Ok(())
    }

    async fn exec(&mut self, _sql: &str, events: EventSink) -> Result<(), ErrorDetail> {
        for message in &self.messages {
            match message.get("error") {
                Some(error) => {
                    let text = error["message"].as_str().unwrap_or_default();
                    events.error(ErrorDetail::new(text, error.clone()));
                }
                None => {
                    events.send(sqlbridge::EngineEvent::from_row_message(message.clone()));
                }
            }
        }
        Ok(())
    }
}

fn replay(messages: Vec<JsonValue>) -> JsonStorageAdapter {
    JsonStorageAdapter::new(Box::new(ReplayEngine { messages }), AdapterConfig::in_memory()).unwrap()
}

#[tokio::test]
async fn test_row_messages_drive_the_handler() -> anyhow::Result<()> {
    let adapter = replay(vec![
        json!({"rowNumber": 1, "row": {"id": 1, "tag": "x", "meta_json": "{\"a\":1}"}}),
        json!({"rowNumber": 2, "row": {"id": 2, "tag": "y", "meta_json": "null"}}),
        json!({"rowNumber": null}),
    ]);

    let rows = adapter.query_all("SELECT * FROM events").await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("meta"), Some(&Value::Json(json!({"a": 1}))));
    assert_eq!(rows[1].get("meta"), Some(&Value::Json(JsonValue::Null)));
    assert!(adapter.is_idle());
    Ok(())
}

#[tokio::test]
async fn test_engine_error_carries_payload() -> anyhow::Result<()> {
    let adapter = replay(vec![json!({
        "error": {"message": "no such table: events", "errorClass": "SQLite3Error", "resultCode": 1}
    })]);

    let err = adapter.query_all("SELECT * FROM events").await.unwrap_err();
    assert!(err.is_retryable());
    let detail = err.detail().unwrap();
    assert_eq!(detail.message, "no such table: events");
    assert_eq!(detail.data["resultCode"], 1);

    // the slot is released, so the adapter accepts the next call
    assert!(adapter.is_idle());
    assert!(adapter.execute("SELECT 1", None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_message_fails_the_call() -> anyhow::Result<()> {
    let adapter = replay(vec![json!("engine ready"), json!({"rowNumber": null})]);

    let err = adapter.execute("SELECT 1", None).await.unwrap_err();
    match err {
        DbError::EngineError(detail) => {
            assert_eq!(detail.message, "unhandled engine message");
            assert_eq!(detail.data, json!("engine ready"));
        }
        other => panic!("expected engine error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_fractional_row_number_fails_instead_of_ending_stream() -> anyhow::Result<()> {
    let adapter = replay(vec![
        json!({"rowNumber": 1, "row": {"id": 1}}),
        json!({"rowNumber": 2.0, "row": {"id": 2}}),
        json!({"rowNumber": 3, "row": {"id": 3}}),
        json!({"rowNumber": null}),
    ]);

    let mut ids = Vec::new();
    let err = adapter
        .query("SELECT id FROM events", |record| ids.push(record))
        .await
        .unwrap_err();

    assert_eq!(err.detail().unwrap().message, "unhandled engine message");
    assert_eq!(err.detail().unwrap().data["rowNumber"], json!(2.0));
    // rows around the malformed message are still delivered in order
    assert_eq!(ids.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_structured_column_is_decode_error() -> anyhow::Result<()> {
    let adapter = replay(vec![
        json!({"rowNumber": 1, "row": {"id": 1, "meta_json": "{not json"}}),
        json!({"rowNumber": null}),
    ]);

    let mut delivered = 0;
    let err = adapter
        .query("SELECT * FROM events", |_| delivered += 1)
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::DecodeError(_)));
    assert!(!err.is_retryable());
    assert_eq!(delivered, 0);
    Ok(())
}

/// Fails to dispatch anything.
struct OfflineEngine;

#[async_trait]
impl SqlEngine for OfflineEngine {
    async fn open(&mut self, _filename: &str) -> Result<(), ErrorDetail> {
        Ok(())
    }

    async fn exec(&mut self, _sql: &str, _events: EventSink) -> Result<(), ErrorDetail> {
        Err(ErrorDetail::message("engine worker has exited"))
    }
}

#[tokio::test]
async fn test_transport_failure_is_engine_error() -> anyhow::Result<()> {
    let adapter = JsonStorageAdapter::new(Box::new(OfflineEngine), AdapterConfig::in_memory())?;

    let err = adapter
        .upsert_json("events", json!({"id": 1}))
        .await
        .unwrap_err();
    assert_eq!(err.detail().map(|d| d.message.as_str()), Some("engine worker has exited"));

    // the table was never created, so the registry stays empty
    assert!(adapter.registered_tables().is_empty());
    assert!(adapter.is_idle());
    Ok(())
}
