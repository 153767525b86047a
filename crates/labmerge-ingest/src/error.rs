//! Error types for the ingestion and export pipeline
//!
//! Messages are user-facing: the CLI prints them as-is followed by a hint.

use std::path::PathBuf;

use labmerge_common::LabError;
use thiserror::Error;

use crate::db::DbError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Lab(#[from] LabError),

    /// Live table does not match the catalog's declared columns
    #[error("Table '{table}' does not match the '{identifier}' measurement schema: {detail}")]
    SchemaMismatch {
        identifier: String,
        table: String,
        detail: String,
    },

    /// A lab file carries a field the catalog has no column for
    #[error("Field '{field}' in '{}' has no column in the '{identifier}' measurement schema", file.display())]
    UnmappedField {
        field: String,
        identifier: String,
        file: PathBuf,
    },

    /// A lab file lacks the field holding its unique id
    #[error("'{}' has no '{field}' field; cannot check for an existing '{identifier}' record", file.display())]
    MissingUniqueId {
        field: String,
        identifier: String,
        file: PathBuf,
    },

    #[error("Failed to write '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn schema_mismatch(
        identifier: impl Into<String>,
        table: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            identifier: identifier.into(),
            table: table.into(),
            detail: detail.into(),
        }
    }
}
