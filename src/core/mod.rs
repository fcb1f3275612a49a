pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, ErrorDetail, Result};
pub use types::{ColumnSpec, Record, SqlType};
pub use value::{Value, ValueKind, classify};
