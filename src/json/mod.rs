//! JSON Storage Adapter Module
//!
//! High-level API for persisting structured records as engine tables,
//! hiding schema inference and SQL generation behind a facade.
//!
//! # Architecture
//!
//! - `adapter.rs` - Main facade (JsonStorageAdapter)
//! - `schema_inference.rs` - Column inference from a single record
//! - `converter.rs` - Record to SQL statement builders and literal escaping
//! - `registry.rs` - Tables created by an adapter instance
//! - `decoder.rs` - Engine row to record, restoring structured fields
//! - `validator.rs` - Identifier validation

mod adapter;
pub mod converter;
mod decoder;
mod registry;
mod schema_inference;
pub(crate) mod validator;

pub use adapter::JsonStorageAdapter;
pub use decoder::RowDecoder;
pub use registry::TableRegistry;
pub use schema_inference::{DEFAULT_STRUCTURED_SUFFIX, SchemaInferencer};
