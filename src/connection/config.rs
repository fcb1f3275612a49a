use crate::core::{DbError, Result};
use crate::json::validator::is_identifier;
use crate::json::DEFAULT_STRUCTURED_SUFFIX;

/// Adapter configuration
///
/// Builder-style, like a driver connection config.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Database file handed to the engine on first use
    pub db_file_name: String,

    /// Column-name suffix marking JSON-encoded structured fields
    pub structured_suffix: String,

    /// Treat RFC 3339 strings as timestamps when converting JSON input
    pub detect_timestamps: bool,
}

impl AdapterConfig {
    /// Create a configuration for the given database file
    pub fn new(db_file_name: &str) -> Self {
        Self {
            db_file_name: db_file_name.to_string(),
            structured_suffix: DEFAULT_STRUCTURED_SUFFIX.to_string(),
            detect_timestamps: false,
        }
    }

    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    /// Set the database file name
    pub fn db_file_name(mut self, db_file_name: &str) -> Self {
        self.db_file_name = db_file_name.to_string();
        self
    }

    /// Set the structured-column suffix
    pub fn structured_suffix(mut self, suffix: &str) -> Self {
        self.structured_suffix = suffix.to_string();
        self
    }

    /// Enable or disable timestamp detection
    pub fn detect_timestamps(mut self, enabled: bool) -> Self {
        self.detect_timestamps = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_file_name.is_empty() {
            return Err(DbError::ValidationError(
                "Database file name cannot be empty".to_string(),
            ));
        }

        if self.structured_suffix.is_empty() {
            return Err(DbError::ValidationError(
                "Structured suffix cannot be empty".to_string(),
            ));
        }

        // the suffix ends up inside column names
        if !is_identifier(&format!("x{}", self.structured_suffix)) {
            return Err(DbError::ValidationError(format!(
                "Structured suffix must contain only letters, numbers, and underscores: {}",
                self.structured_suffix
            )));
        }

        Ok(())
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::new("sqlbridge.db")
    }
}
