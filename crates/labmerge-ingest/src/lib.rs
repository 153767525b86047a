//! labmerge Ingest Library
//!
//! Loads ICP and Hall lab result files into PostgreSQL and builds the master
//! CSV that joins them with procurement and process records.
//!
//! # Pipeline
//!
//! 1. [`schema::create_lab_tables`]: create missing measurement tables
//! 2. [`ingest::add_new_lab_results`]: insert lab files not yet stored
//! 3. [`export::create_master_csv`]: join everything into `master_<date>.csv`
//!
//! Each step takes any [`db::LabStore`]; the binary uses [`db::PgLabStore`].
//!
//! # Example
//!
//! ```no_run
//! use labmerge_common::lab_file::LabFileReader;
//! use labmerge_common::MeasurementCatalog;
//! use labmerge_ingest::db::{DbConfig, LabStore, PgLabStore};
//! use labmerge_ingest::{ingest, schema};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = MeasurementCatalog::builtin()?;
//!     let mut store = PgLabStore::connect(&DbConfig::new("dbname=citrine")).await?;
//!
//!     schema::create_lab_tables(&mut store, &catalog).await?;
//!     let report =
//!         ingest::add_new_lab_results(&mut store, &catalog, &LabFileReader::new("lab_files/"))
//!             .await?;
//!     println!("{} records added", report.inserted);
//!
//!     store.close().await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod schema;

// Re-export commonly used types
pub use error::{IngestError, Result};
pub use export::ExportLayout;
pub use ingest::IngestReport;
