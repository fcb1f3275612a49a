//! Identifier validation
//!
//! Table and column names are spliced into statements unquoted, so they are
//! restricted to plain SQL identifiers. Literal values never pass through
//! here; they are escaped by the converter.

use crate::core::{DbError, Result};
use lazy_static::lazy_static;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 64;

const RESERVED_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TABLE", "FROM", "WHERE",
    "JOIN", "UNION", "ORDER", "GROUP", "VALUES", "INTO", "INDEX",
];

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DbError::ValidationError(format!("{} cannot be empty", kind)));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::ValidationError(format!(
            "{} too long (max {} characters): {}",
            kind, MAX_IDENTIFIER_LEN, name
        )));
    }

    if !IDENTIFIER.is_match(name) {
        return Err(DbError::ValidationError(format!(
            "{} must start with a letter or underscore and contain only letters, numbers, and underscores: {}",
            kind, name
        )));
    }

    if RESERVED_KEYWORDS.iter().any(|kw| name.eq_ignore_ascii_case(kw)) {
        return Err(DbError::ValidationError(format!(
            "{} cannot be SQL keyword: {}",
            kind, name
        )));
    }

    Ok(())
}

pub fn validate_table_name(name: &str) -> Result<()> {
    validate_identifier("Table name", name)
}

pub fn validate_key_column(name: &str) -> Result<()> {
    validate_identifier("Key column name", name)
}

/// Field names must be identifiers and must not already carry the
/// structured-column suffix, otherwise reading the row back would try to
/// parse a plain column as JSON.
pub fn validate_field_name(name: &str, structured_suffix: &str) -> Result<()> {
    validate_identifier("Field name", name)?;

    if name.ends_with(structured_suffix) {
        return Err(DbError::ValidationError(format!(
            "Field name '{}' ends with reserved suffix '{}'",
            name, structured_suffix
        )));
    }

    Ok(())
}

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}
