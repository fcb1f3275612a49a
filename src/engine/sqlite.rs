//! SQLite engine over `rusqlite`.
//!
//! Statements run on the blocking pool; rows are pushed into the event sink
//! as they are stepped, so the adapter sees them before the statement has
//! finished.

use super::{ErrorDetail, EventSink, SqlEngine};
use async_trait::async_trait;
use log::{debug, info};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value as JsonValue, json};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct SqliteEngine {
    conn: Option<Arc<Mutex<Connection>>>,
}

impl SqliteEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

#[async_trait]
impl SqlEngine for SqliteEngine {
    async fn open(&mut self, filename: &str) -> Result<(), ErrorDetail> {
        if self.conn.is_some() {
            return Ok(());
        }

        let path = filename.to_string();
        let conn = tokio::task::spawn_blocking(move || Connection::open(&path))
            .await
            .map_err(|err| ErrorDetail::message(format!("sqlite open task failed: {}", err)))?
            .map_err(|err| sqlite_error_detail(&err, None))?;

        info!("Opened SQLite database '{}'", filename);
        self.conn = Some(Arc::new(Mutex::new(conn)));
        Ok(())
    }

    async fn exec(&mut self, sql: &str, events: EventSink) -> Result<(), ErrorDetail> {
        let conn = self
            .conn
            .clone()
            .ok_or_else(|| ErrorDetail::message("database is not open"))?;
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let guard = match conn.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    events.error(ErrorDetail::message("sqlite connection lock poisoned"));
                    return;
                }
            };

            if let Err(err) = run_statement(&guard, &sql, &events) {
                events.error(sqlite_error_detail(&err, Some(&sql)));
            }
        })
        .await
        .map_err(|err| ErrorDetail::message(format!("sqlite exec task failed: {}", err)))
    }

    async fn close(&mut self) -> Result<(), ErrorDetail> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        match Arc::try_unwrap(conn) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|_| ErrorDetail::message("sqlite connection lock poisoned"))?;
                conn.close()
                    .map_err(|(_, err)| sqlite_error_detail(&err, None))?;
                info!("Closed SQLite database");
            }
            // still referenced by a finishing worker; closes on last drop
            Err(_) => debug!("SQLite connection released while a worker holds it"),
        }

        Ok(())
    }
}

fn run_statement(conn: &Connection, sql: &str, events: &EventSink) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = stmt.query([])?;
    let mut sequence = 0u64;
    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            object.insert(name.clone(), value_ref_to_json(row.get_ref(idx)?));
        }
        sequence += 1;
        events.row(sequence, object);
    }

    events.end_of_stream();
    Ok(())
}

fn value_ref_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
    }
}

fn sqlite_error_detail(err: &rusqlite::Error, sql: Option<&str>) -> ErrorDetail {
    let result_code = match err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.extended_code),
        _ => None,
    };

    ErrorDetail::new(
        err.to_string(),
        json!({
            "errorClass": "SQLite3Error",
            "resultCode": result_code,
            "sql": sql,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEvent;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(mut rx: UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn exec(engine: &mut SqliteEngine, sql: &str) -> Vec<EngineEvent> {
        let (sink, rx) = EventSink::channel();
        engine.exec(sql, sink).await.unwrap();
        drain(rx)
    }

    #[tokio::test]
    async fn test_rows_are_numbered_and_terminated() {
        let mut engine = SqliteEngine::new();
        engine.open(":memory:").await.unwrap();

        exec(&mut engine, "CREATE TABLE t (id INTEGER, name TEXT)").await;
        exec(&mut engine, "INSERT INTO t (id, name) VALUES (1, 'a')").await;
        exec(&mut engine, "INSERT INTO t (id, name) VALUES (2, 'b')").await;

        let events = exec(&mut engine, "SELECT id, name FROM t ORDER BY id").await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            EngineEvent::row(1, json!({"id": 1, "name": "a"}).as_object().unwrap().clone())
        );
        assert_eq!(
            events[1],
            EngineEvent::row(2, json!({"id": 2, "name": "b"}).as_object().unwrap().clone())
        );
        assert_eq!(events[2], EngineEvent::end_of_stream());
    }

    #[tokio::test]
    async fn test_statement_failure_goes_to_error_event() {
        let mut engine = SqliteEngine::new();
        engine.open(":memory:").await.unwrap();

        let events = exec(&mut engine, "SELECT * FROM missing").await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            EngineEvent::Error(detail) => {
                assert!(detail.message.contains("missing"));
                assert_eq!(detail.data["sql"], "SELECT * FROM missing");
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exec_before_open_fails() {
        let mut engine = SqliteEngine::new();
        let (sink, _rx) = EventSink::channel();
        assert!(engine.exec("SELECT 1", sink).await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut engine = SqliteEngine::new();
        engine.open(":memory:").await.unwrap();
        assert!(engine.is_open());

        engine.close().await.unwrap();
        engine.close().await.unwrap();
        assert!(!engine.is_open());
    }
}
