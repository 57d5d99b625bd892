//! Storage layer internals
//!
//! Schema migrations, row mapping, and the storage error type. The
//! public surface for reading and writing lives in [`crate::store`].

pub mod error;
pub(crate) mod row;
pub mod schema;

pub use error::{StorageError, StorageResult};
pub use row::SearchResultRow;
pub use schema::{schema_version, SCHEMA_VERSION};
