// ============================================================================
// sqlbridge Library
// ============================================================================

//! Persist schemaless records into a relational engine.
//!
//! Tables are inferred from the first record written to them; nested
//! objects and arrays are stored as JSON text and restored on read. The
//! engine is driven through the asynchronous [`engine::SqlEngine`]
//! request/event interface, one statement at a time.
//!
//! # Examples
//!
//! ```no_run
//! use sqlbridge::{AdapterConfig, JsonStorageAdapter};
//! use serde_json::json;
//!
//! # async fn run() -> sqlbridge::Result<()> {
//! let adapter = JsonStorageAdapter::sqlite(AdapterConfig::in_memory())?;
//!
//! adapter
//!     .upsert_json("events", json!({"id": 1, "tag": "x", "meta": {"a": 1}}))
//!     .await?;
//!
//! let rows = adapter.query_all("SELECT * FROM events").await?;
//! assert_eq!(rows[0].get("meta").and_then(|v| v.as_json()), Some(&json!({"a": 1})));
//!
//! adapter.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod core;
pub mod engine;
pub mod json;

// Re-export main types for convenience
pub use crate::core::{ColumnSpec, DbError, ErrorDetail, Record, Result, SqlType, Value, ValueKind, classify};
pub use json::JsonStorageAdapter;

pub use connection::{Connection, ExecState, RowHandler, config::AdapterConfig};
pub use engine::{EngineEvent, EventSink, SqlEngine};

#[cfg(feature = "sqlite")]
pub use engine::sqlite::SqliteEngine;
