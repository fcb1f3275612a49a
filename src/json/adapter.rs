//! JSON Storage Adapter
//!
//! Main facade: persists records into engine tables without hand-written
//! schemas, and reads them back with structured fields restored. Ties
//! together schema inference, statement building, the table registry and
//! the execution bridge.

use super::converter::{build_create_table, build_delete, build_insert};
use super::decoder::RowDecoder;
use super::registry::TableRegistry;
use super::schema_inference::SchemaInferencer;
use super::validator::validate_table_name;
use crate::connection::config::AdapterConfig;
use crate::connection::{Connection, RowHandler};
use crate::core::{DbError, Record, Result, Value};
use crate::engine::SqlEngine;
use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Mutex;

/// JSON Storage Adapter - Facade for record persistence
///
/// Owns one engine connection, opened on first use. Statements run one at a
/// time; starting a second while one is in flight fails with
/// [`DbError::ProtocolError`].
pub struct JsonStorageAdapter {
    connection: Connection,
    registry: Mutex<TableRegistry>,
    inferencer: SchemaInferencer,
    config: AdapterConfig,
}

impl JsonStorageAdapter {
    /// Create an adapter driving `engine`
    pub fn new(engine: Box<dyn SqlEngine>, config: AdapterConfig) -> Result<Self> {
        config.validate()?;

        let inferencer = SchemaInferencer::new(config.structured_suffix.clone());
        let connection = Connection::new(
            engine,
            &config.db_file_name,
            RowDecoder::new(inferencer.clone()),
        );

        Ok(Self {
            connection,
            registry: Mutex::new(TableRegistry::new()),
            inferencer,
            config,
        })
    }

    /// Create an adapter backed by SQLite
    ///
    /// # Example
    /// ```ignore
    /// let adapter = JsonStorageAdapter::sqlite(AdapterConfig::in_memory())?;
    /// adapter.upsert_json("events", json!({"id": 1, "meta": {"a": 1}})).await?;
    /// ```
    #[cfg(feature = "sqlite")]
    pub fn sqlite(config: AdapterConfig) -> Result<Self> {
        Self::new(Box::new(crate::engine::sqlite::SqliteEngine::new()), config)
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Execute a raw statement, optionally receiving decoded rows
    pub async fn execute(&self, sql: &str, handler: Option<RowHandler<'_>>) -> Result<usize> {
        self.connection.execute(sql, handler).await
    }

    /// Run a query, calling `handler` for each row as it arrives
    ///
    /// Returns the number of rows delivered.
    pub async fn query<'h, F>(&self, sql: &str, handler: F) -> Result<usize>
    where
        F: FnMut(Record) + Send + 'h,
    {
        let handler: RowHandler<'h> = Box::new(handler);
        self.connection.execute(sql, Some(handler)).await
    }

    /// Run a query and collect every row
    pub async fn query_all(&self, sql: &str) -> Result<Vec<Record>> {
        let mut rows = Vec::new();
        self.query(sql, |record| rows.push(record)).await?;
        Ok(rows)
    }

    /// Run a query and deserialize every row into `T`
    ///
    /// Booleans are stored as integers, so `T` sees them as numbers.
    pub async fn query_as<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>> {
        self.query_all(sql)
            .await?
            .into_iter()
            .map(|record| serde_json::from_value(record.into_json()).map_err(DbError::from))
            .collect()
    }

    /// Issue CREATE TABLE IF NOT EXISTS for the shape of `record`
    ///
    /// Always reaches the engine; does not consult or update the registry.
    pub async fn create_table(&self, table_name: &str, record: &Record) -> Result<()> {
        let columns = self.inferencer.infer_columns(table_name, record)?;
        let sql = build_create_table(table_name, &columns)?;

        self.connection.execute(&sql, None).await?;
        info!("Created table '{}' with {} column(s)", table_name, columns.len());
        Ok(())
    }

    /// Create the table from `record` unless this adapter already did
    ///
    /// Table names are case-insensitive. Returns `true` if CREATE TABLE was
    /// issued by this call.
    pub async fn ensure_schema(&self, table_name: &str, record: &Record) -> Result<bool> {
        validate_table_name(table_name)?;
        let table_name = TableRegistry::normalize(table_name);

        let registered = self.registry.lock()?.is_registered(&table_name);
        if registered {
            return Ok(false);
        }

        self.create_table(&table_name, record).await?;
        self.registry.lock()?.register(&table_name);
        Ok(true)
    }

    /// Insert `record` into `table_name`, creating the table on first use
    ///
    /// Despite the name this is a plain INSERT: a duplicate key surfaces as
    /// an engine error instead of overwriting the existing row.
    pub async fn upsert(&self, table_name: &str, record: &Record) -> Result<()> {
        validate_table_name(table_name)?;
        if record.is_empty() {
            return Err(DbError::ValidationError(format!(
                "cannot upsert an empty record into '{}'",
                table_name
            )));
        }

        // INSERT is rendered before CREATE TABLE: literal errors must not reach the engine
        let table_name = TableRegistry::normalize(table_name);
        let sql = build_insert(&table_name, record, &self.inferencer)?;

        self.ensure_schema(&table_name, record).await?;
        self.connection.execute(&sql, None).await?;
        Ok(())
    }

    /// [`upsert`](Self::upsert) for a JSON object
    pub async fn upsert_json(&self, table_name: &str, document: JsonValue) -> Result<()> {
        let record = Record::from_json(document, self.config.detect_timestamps)?;
        self.upsert(table_name, &record).await
    }

    /// [`upsert`](Self::upsert) for any serializable value, into the table
    /// named after its type
    ///
    /// # Example
    /// ```ignore
    /// #[derive(Serialize)]
    /// struct Event { id: i64, tag: String }
    ///
    /// adapter.upsert_value(&Event { id: 1, tag: "x".into() }).await?; // table "event"
    /// ```
    pub async fn upsert_value<T: Serialize>(&self, data: &T) -> Result<()> {
        let document = serde_json::to_value(data)?;
        self.upsert_json(type_table_name::<T>(), document).await
    }

    /// Delete rows where `key_column` equals `key_value`
    pub async fn delete(
        &self,
        table_name: &str,
        key_column: &str,
        key_value: impl Into<Value>,
    ) -> Result<()> {
        let sql = build_delete(table_name, key_column, &key_value.into())?;
        self.connection.execute(&sql, None).await?;
        Ok(())
    }

    /// Release the engine connection. Idempotent; the adapter cannot be
    /// used afterwards.
    pub async fn close(&self) -> Result<()> {
        self.connection.close().await
    }

    /// Whether no statement is in flight
    pub fn is_idle(&self) -> bool {
        self.connection.is_idle()
    }

    /// Tables created by this adapter, lowercased and sorted
    pub fn registered_tables(&self) -> Vec<String> {
        self.registry
            .lock()
            .map(|registry| registry.tables())
            .unwrap_or_default()
    }
}

// ==================== Private Helper Methods ====================

/// Short type name: `my_app::model::Event<T>` → `Event`
fn type_table_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
