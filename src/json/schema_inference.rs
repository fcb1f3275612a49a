//! Schema Inference Module
//!
//! Derives column definitions from a single record. The first record seen
//! for a table is authoritative: schemas are never merged across records.

use super::validator::{validate_field_name, validate_table_name};
use crate::core::{ColumnSpec, DbError, Record, Result, SqlType, Value, ValueKind};

pub const DEFAULT_STRUCTURED_SUFFIX: &str = "_json";

/// Infers column specs and owns the structured-column naming rule.
#[derive(Debug, Clone)]
pub struct SchemaInferencer {
    structured_suffix: String,
}

impl SchemaInferencer {
    pub fn new(structured_suffix: impl Into<String>) -> Self {
        Self {
            structured_suffix: structured_suffix.into(),
        }
    }

    pub fn structured_suffix(&self) -> &str {
        &self.structured_suffix
    }

    /// Infer the columns for `table_name` from `record`, in field order.
    pub fn infer_columns(&self, table_name: &str, record: &Record) -> Result<Vec<ColumnSpec>> {
        validate_table_name(table_name)?;

        if record.is_empty() {
            return Err(DbError::ValidationError(format!(
                "cannot infer schema for '{}' from a record with no fields",
                table_name
            )));
        }

        record
            .iter()
            .map(|(name, value)| -> Result<ColumnSpec> {
                validate_field_name(name, &self.structured_suffix)?;
                Ok(self.column_for(name, value))
            })
            .collect()
    }

    /// Column spec for one field.
    pub fn column_for(&self, field_name: &str, value: &Value) -> ColumnSpec {
        match value.kind() {
            ValueKind::String => ColumnSpec::new(field_name, SqlType::Text),
            ValueKind::Integer => ColumnSpec::new(field_name, SqlType::Integer),
            ValueKind::Float => ColumnSpec::new(field_name, SqlType::Real),
            ValueKind::Boolean => ColumnSpec::new(field_name, SqlType::Integer),
            // epoch milliseconds
            ValueKind::Temporal => ColumnSpec::new(field_name, SqlType::Integer),
            ValueKind::Structured => ColumnSpec::new(self.column_name(field_name, value), SqlType::Text),
        }
    }

    /// Storage column name for a field. Only structured fields are renamed.
    pub fn column_name(&self, field_name: &str, value: &Value) -> String {
        match value.kind() {
            ValueKind::Structured => format!("{}{}", field_name, self.structured_suffix),
            _ => field_name.to_string(),
        }
    }

    /// Field name a storage column decodes to, if it is a structured column.
    pub fn structured_field_name<'a>(&self, column_name: &'a str) -> Option<&'a str> {
        column_name
            .strip_suffix(self.structured_suffix.as_str())
            .filter(|field| !field.is_empty())
    }
}

impl Default for SchemaInferencer {
    fn default() -> Self {
        Self::new(DEFAULT_STRUCTURED_SUFFIX)
    }
}
