//! Row decoding
//!
//! Engine rows arrive as flat JSON objects keyed by column name. Structured
//! columns (name ends with the reserved suffix) hold JSON text and are parsed
//! back into a nested value stored under the field's original name.

use super::schema_inference::SchemaInferencer;
use crate::core::types::json_type_name;
use crate::core::{DbError, Record, Result, Value};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Default)]
pub struct RowDecoder {
    inferencer: SchemaInferencer,
}

impl RowDecoder {
    pub fn new(inferencer: SchemaInferencer) -> Self {
        Self { inferencer }
    }

    /// Decode one raw row, keeping column order.
    pub fn decode(&self, raw_row: Map<String, JsonValue>) -> Result<Record> {
        let mut record = Record::new();

        for (column, raw) in raw_row {
            match self.inferencer.structured_field_name(&column) {
                Some(field) => {
                    let value = parse_structured(&column, raw)?;
                    record.insert(field, Value::Json(value));
                }
                None => record.insert(column, Value::from_json(raw, false)),
            }
        }

        Ok(record)
    }
}

fn parse_structured(column: &str, raw: JsonValue) -> Result<JsonValue> {
    match raw {
        JsonValue::String(text) => serde_json::from_str(&text).map_err(|err| {
            DbError::DecodeError(format!("column '{}' does not hold JSON text: {}", column, err))
        }),
        // SQL NULL in a structured column
        JsonValue::Null => Ok(JsonValue::Null),
        other => Err(DbError::DecodeError(format!(
            "column '{}' holds a {} instead of JSON text",
            column,
            json_type_name(&other)
        ))),
    }
}
