//! labmerge Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, parsing, and error handling for the labmerge workspace.
//!
//! # Overview
//!
//! - **Lab files**: reader for the tab-delimited ICP/Hall result files
//! - **Catalog**: the registry of measurement kinds and their table schemas
//! - **Table**: an in-memory tabular value with left/outer joins
//! - **Logging**: tracing subscriber setup shared by the binaries
//!
//! # Example
//!
//! ```no_run
//! use labmerge_common::lab_file::LabFileReader;
//! use labmerge_common::MeasurementCatalog;
//!
//! fn main() -> labmerge_common::Result<()> {
//!     let catalog = MeasurementCatalog::builtin()?;
//!     for record in LabFileReader::new("lab_files/").read_all()? {
//!         if let Some(kind) = record.measurement().and_then(|m| catalog.find(m)) {
//!             println!("{} -> {}", record.source().display(), kind.table);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod lab_file;
pub mod logging;
pub mod table;

// Re-export commonly used types
pub use catalog::{MeasurementCatalog, MeasurementKind};
pub use error::{LabError, Result};
pub use lab_file::LabRecord;
pub use table::Table;
