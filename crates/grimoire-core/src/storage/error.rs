//! Storage error handling
//!
//! Provides typed errors for storage operations. Errors fall into four
//! groups: validation failures, missing records, initialization
//! failures (open and migration), and operation failures (statement
//! errors, JSON encoding, corrupt persisted data).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::fields::FieldError;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Input rejected before touching the database
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A record that was required to exist is missing
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Failed to create the data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Could not open or migrate the database
    #[error("Failed to initialize storage: {message}")]
    Initialization {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// SQLite error during an operation
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to encode a value for a JSON column
    #[error("Failed to encode {column}: {source}")]
    Serialize {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A persisted row holds data that cannot be decoded
    #[error("Corrupt {column} on {kind} '{id}': {details}")]
    Corrupt {
        kind: &'static str,
        column: &'static str,
        id: String,
        details: String,
    },
}

impl StorageError {
    /// Create a not-found error for the given record kind
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error means a record was missing
    ///
    /// A missing record is an expected condition; callers branch on it
    /// rather than treating it as a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<FieldError> for StorageError {
    fn from(err: FieldError) -> Self {
        StorageError::Validation(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityType;

    #[test]
    fn test_not_found_helper() {
        let err = StorageError::not_found("entity", "abc123");
        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("entity"));
        assert!(msg.contains("abc123"));
    }

    #[test]
    fn test_other_errors_are_not_not_found() {
        let err = StorageError::Validation("bad field".to_string());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_field_error_converts_to_validation() {
        let field_err = FieldError::UnknownField {
            entity_type: EntityType::Note,
            field: "appearance".to_string(),
        };
        let err = StorageError::from(field_err);
        match err {
            StorageError::Validation(msg) => {
                assert!(msg.contains("appearance"));
                assert!(msg.contains("note"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_display() {
        let err = StorageError::Corrupt {
            kind: "entity",
            column: "tags",
            id: "abc123".to_string(),
            details: "expected array".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tags"));
        assert!(msg.contains("abc123"));
        assert!(msg.contains("expected array"));
    }

    #[test]
    fn test_initialization_display() {
        let err = StorageError::Initialization {
            message: "database is at schema version 9".to_string(),
            source: None,
        };
        assert!(err.to_string().contains("schema version 9"));
    }
}
