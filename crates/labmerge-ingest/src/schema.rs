//! Measurement table creation and schema checks

use std::fmt;

use labmerge_common::MeasurementCatalog;
use tracing::{debug, info};

use crate::db::LabStore;
use crate::error::{IngestError, Result};

/// Outcome of [`create_lab_tables`] for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Created,
    AlreadyExists,
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableStatus::Created => write!(f, "created"),
            TableStatus::AlreadyExists => write!(f, "already exists"),
        }
    }
}

/// Create the table of every catalog kind that does not exist yet
///
/// Existing tables are left untouched. Commits once at the end.
pub async fn create_lab_tables<S: LabStore + ?Sized>(
    store: &mut S,
    catalog: &MeasurementCatalog,
) -> Result<Vec<(String, TableStatus)>> {
    let mut statuses = Vec::with_capacity(catalog.len());

    for kind in catalog {
        let status = if store.table_exists(&kind.table).await? {
            TableStatus::AlreadyExists
        } else {
            debug!(table = %kind.table, columns = %kind.column_definitions(), "Creating table");
            store.create_table(&kind.table, &kind.columns).await?;
            TableStatus::Created
        };

        info!("Table {} {}", kind.table, status);
        statuses.push((kind.table.clone(), status));
    }

    store.commit().await?;
    Ok(statuses)
}

/// Check every catalog kind against the live columns of its table
///
/// Fails when a declared column is missing from the table or the table has
/// a column the catalog does not declare.
pub async fn validate_catalog<S: LabStore + ?Sized>(
    store: &mut S,
    catalog: &MeasurementCatalog,
) -> Result<()> {
    for kind in catalog {
        let live = store.column_names(&kind.table).await?;
        if live.is_empty() {
            return Err(IngestError::schema_mismatch(
                &kind.identifier,
                &kind.table,
                "table does not exist",
            ));
        }

        let declared = kind.column_names();

        let missing: Vec<&str> = declared
            .iter()
            .copied()
            .filter(|name| !live.iter().any(|l| l == name))
            .collect();
        if !missing.is_empty() {
            return Err(IngestError::schema_mismatch(
                &kind.identifier,
                &kind.table,
                format!("missing columns: {}", missing.join(", ")),
            ));
        }

        let undeclared: Vec<&str> = live
            .iter()
            .map(String::as_str)
            .filter(|name| !declared.contains(name))
            .collect();
        if !undeclared.is_empty() {
            return Err(IngestError::schema_mismatch(
                &kind.identifier,
                &kind.table,
                format!("undeclared columns: {}", undeclared.join(", ")),
            ));
        }

        debug!(table = %kind.table, columns = live.len(), "Schema matches catalog");
    }

    Ok(())
}
