//! Record to SQL Converter
//!
//! Renders CREATE TABLE / INSERT / DELETE text using the Builder pattern.
//! Identifiers are validated before they are spliced in; every value goes
//! through [`format_value_for_sql`], the only place literals are produced.

use super::schema_inference::SchemaInferencer;
use super::validator::{
    is_identifier, validate_field_name, validate_key_column, validate_table_name,
};
use crate::core::{ColumnSpec, DbError, Record, Result, SqlType, Value};

/// Builder for CREATE TABLE SQL statements
#[derive(Debug, Clone)]
pub struct CreateTableBuilder {
    table_name: String,
    columns: Vec<ColumnSpec>,
}

impl CreateTableBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.columns.push(ColumnSpec::new(name, sql_type));
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnSpec>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn build(self) -> Result<String> {
        validate_table_name(&self.table_name)?;

        if self.columns.is_empty() {
            return Err(DbError::ValidationError(format!(
                "table '{}' needs at least one column",
                self.table_name
            )));
        }

        check_column_names(self.columns.iter().map(|col| col.name.as_str()))?;

        let column_defs: Vec<String> = self
            .columns
            .iter()
            .map(|col| format!("{} {}", col.name, col.sql_type))
            .collect();

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table_name,
            column_defs.join(", ")
        ))
    }
}

/// Builder for single-row INSERT SQL statements
#[derive(Debug, Clone)]
pub struct InsertStatementBuilder {
    table_name: String,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl InsertStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.columns.push(column.into());
        self.values.push(value);
        self
    }

    /// One column/value pair per record field, in field order. Structured
    /// fields are mapped to their suffixed storage column.
    pub fn from_record(
        table_name: impl Into<String>,
        record: &Record,
        inferencer: &SchemaInferencer,
    ) -> Result<Self> {
        let mut builder = Self::new(table_name);
        for (name, value) in record.iter() {
            validate_field_name(name, inferencer.structured_suffix())?;
            builder = builder.value(inferencer.column_name(name, value), value.clone());
        }
        Ok(builder)
    }

    pub fn build(self) -> Result<String> {
        validate_table_name(&self.table_name)?;

        if self.values.is_empty() {
            return Err(DbError::ValidationError(format!(
                "cannot insert an empty record into '{}'",
                self.table_name
            )));
        }

        check_column_names(self.columns.iter().map(String::as_str))?;

        let literals = self
            .values
            .iter()
            .map(format_value_for_sql)
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name,
            self.columns.join(", "),
            literals.join(", ")
        ))
    }
}

/// Builder for DELETE SQL statements keyed on a single column
#[derive(Debug, Clone)]
pub struct DeleteStatementBuilder {
    table_name: String,
    key: Option<(String, Value)>,
}

impl DeleteStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key: None,
        }
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.key = Some((column.into(), value));
        self
    }

    pub fn build(self) -> Result<String> {
        validate_table_name(&self.table_name)?;

        let (column, value) = self.key.ok_or_else(|| {
            DbError::ValidationError(format!(
                "DELETE on '{}' requires a key column",
                self.table_name
            ))
        })?;
        validate_key_column(&column)?;

        Ok(format!(
            "DELETE FROM {} WHERE {} = {}",
            self.table_name,
            column,
            format_value_for_sql(&value)?
        ))
    }
}

pub fn build_create_table(table_name: &str, columns: &[ColumnSpec]) -> Result<String> {
    CreateTableBuilder::new(table_name)
        .columns(columns.iter().cloned())
        .build()
}

pub fn build_insert(
    table_name: &str,
    record: &Record,
    inferencer: &SchemaInferencer,
) -> Result<String> {
    InsertStatementBuilder::from_record(table_name, record, inferencer)?.build()
}

pub fn build_delete(table_name: &str, key_column: &str, key_value: &Value) -> Result<String> {
    DeleteStatementBuilder::new(table_name)
        .where_eq(key_column, key_value.clone())
        .build()
}

/// Render a value as a SQL literal.
///
/// Text and structured values are single-quoted with embedded quotes
/// doubled; everything else is a bare number. Non-finite floats have no
/// literal form and are rejected.
pub fn format_value_for_sql(value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(quote_literal(s)),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) if f.is_finite() => Ok(format!("{:?}", f)),
        Value::Float(f) => Err(DbError::ValidationError(format!(
            "non-finite float {} has no SQL literal",
            f
        ))),
        Value::Boolean(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Timestamp(ts) => Ok(ts.timestamp_millis().to_string()),
        Value::Json(j) => Ok(quote_literal(&serde_json::to_string(j)?)),
    }
}

fn check_column_names<'a>(mut names: impl Iterator<Item = &'a str>) -> Result<()> {
    match names.find(|name| !is_identifier(name)) {
        Some(name) => Err(DbError::ValidationError(format!(
            "invalid column name: '{}'",
            name
        ))),
        None => Ok(()),
    }
}

/// Escape single quotes in SQL strings
fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", escape_sql_string(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_create_table_builder() {
        let sql = CreateTableBuilder::new("events")
            .add_column("id", SqlType::Integer)
            .add_column("tag", SqlType::Text)
            .add_column("meta_json", SqlType::Text)
            .build()
            .unwrap();

        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS events (id INTEGER, tag TEXT, meta_json TEXT)"
        );
    }

    #[test]
    fn test_create_table_requires_columns() {
        assert!(matches!(
            CreateTableBuilder::new("events").build(),
            Err(DbError::ValidationError(_))
        ));
    }

    #[test]
    fn test_insert_from_record() {
        let record = Record::try_from(json!({"id": 1, "tag": "x", "meta": {"a": 1}})).unwrap();
        let sql = build_insert("events", &record, &SchemaInferencer::default()).unwrap();

        assert_eq!(
            sql,
            r#"INSERT INTO events (id, tag, meta_json) VALUES (1, 'x', '{"a":1}')"#
        );
    }

    #[test]
    fn test_delete_statement() {
        let sql = build_delete("events", "id", &Value::Integer(1)).unwrap();
        assert_eq!(sql, "DELETE FROM events WHERE id = 1");

        let sql = build_delete("users", "email", &Value::from("o'neil@example.com")).unwrap();
        assert_eq!(sql, "DELETE FROM users WHERE email = 'o''neil@example.com'");
    }

    #[test]
    fn test_delete_requires_key() {
        assert!(DeleteStatementBuilder::new("events").build().is_err());
        assert!(build_delete("events", "", &Value::Integer(1)).is_err());
        assert!(build_delete("", "id", &Value::Integer(1)).is_err());
    }

    #[test]
    fn test_sql_string_escaping() {
        let value = Value::Text("O'Brien".to_string());
        assert_eq!(format_value_for_sql(&value).unwrap(), "'O''Brien'");

        let value = Value::Text("'; DROP TABLE users; --".to_string());
        assert_eq!(
            format_value_for_sql(&value).unwrap(),
            "'''; DROP TABLE users; --'"
        );
    }

    #[test]
    fn test_structured_literal_escaping() {
        let value = Value::Json(json!({"name": "O'Brien", "tags": ["it's"]}));
        assert_eq!(
            format_value_for_sql(&value).unwrap(),
            r#"'{"name":"O''Brien","tags":["it''s"]}'"#
        );
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(format_value_for_sql(&Value::Integer(-7)).unwrap(), "-7");
        assert_eq!(format_value_for_sql(&Value::Float(2.5)).unwrap(), "2.5");
        assert_eq!(format_value_for_sql(&Value::Float(1.0)).unwrap(), "1.0");
        assert_eq!(format_value_for_sql(&Value::Boolean(true)).unwrap(), "1");
        assert_eq!(format_value_for_sql(&Value::Boolean(false)).unwrap(), "0");
        assert_eq!(format_value_for_sql(&Value::Json(json!(null))).unwrap(), "'null'");

        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            format_value_for_sql(&Value::Timestamp(ts)).unwrap(),
            "1704067200000"
        );
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        assert!(format_value_for_sql(&Value::Float(f64::NAN)).is_err());
        assert!(format_value_for_sql(&Value::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_insert_rejects_bad_field_names() {
        let record = Record::new().with("id) VALUES (1); --", 1);
        assert!(matches!(
            build_insert("events", &record, &SchemaInferencer::default()),
            Err(DbError::ValidationError(_))
        ));
    }
}
