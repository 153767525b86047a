//! Error types for labmerge

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for labmerge operations
pub type Result<T> = std::result::Result<T, LabError>;

/// Main error type shared by the labmerge crates
#[derive(Error, Debug)]
pub enum LabError {
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid measurement catalog: {0}")]
    Catalog(String),

    #[error("Failed to parse catalog file '{}': {source}", path.display())]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Column '{column}' not found (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("Row has {actual} values but the table has {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    #[error("Duplicate column '{0}' in table")]
    DuplicateColumn(String),
}

impl LabError {
    /// Create an IO error tagged with the path being accessed
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a catalog validation error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a missing column error listing the columns that do exist
    pub fn missing_column(column: impl Into<String>, available: &[String]) -> Self {
        Self::MissingColumn {
            column: column.into(),
            available: available.join(", "),
        }
    }
}
