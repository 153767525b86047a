//! Lab result ingestion
//!
//! Loads every lab file of a directory into the measurement table of its
//! kind. Records whose unique id is already stored are skipped; nothing is
//! ever updated. All inserts of a run share one transaction, committed at
//! the end, so a failing file leaves the database as it was.

use labmerge_common::lab_file::LabFileReader;
use labmerge_common::{LabRecord, MeasurementCatalog, MeasurementKind};
use tracing::{debug, info, instrument};

use crate::db::LabStore;
use crate::error::{IngestError, Result};
use crate::schema::validate_catalog;

/// Counts from one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Lab files parsed
    pub files_read: usize,
    /// New rows written
    pub inserted: usize,
    /// Records skipped because their unique id was already stored
    pub duplicates: usize,
    /// Records with no or an unknown `Measurement` value
    pub unmatched: usize,
}

/// Parse the lab files of `reader` and insert the ones not yet stored
#[instrument(skip_all, fields(directory = %reader.directory().display()))]
pub async fn add_new_lab_results<S: LabStore + ?Sized>(
    store: &mut S,
    catalog: &MeasurementCatalog,
    reader: &LabFileReader,
) -> Result<IngestReport> {
    let records = reader.read_all()?;
    let report = ingest_records(store, catalog, &records).await?;

    info!("{} records added to database", report.inserted);
    Ok(report)
}

/// Insert already-parsed records; commits once when all records succeeded
pub async fn ingest_records<S: LabStore + ?Sized>(
    store: &mut S,
    catalog: &MeasurementCatalog,
    records: &[LabRecord],
) -> Result<IngestReport> {
    validate_catalog(store, catalog).await?;

    let mut report = IngestReport {
        files_read: records.len(),
        ..Default::default()
    };

    for record in records {
        let Some(kind) = record.measurement().and_then(|m| catalog.find(m)) else {
            debug!(
                file = %record.source().display(),
                measurement = record.measurement().unwrap_or("<none>"),
                "Skipping file of unknown measurement kind"
            );
            report.unmatched += 1;
            continue;
        };

        if insert_if_new(store, kind, record).await? {
            report.inserted += 1;
        } else {
            report.duplicates += 1;
        }
    }

    store.commit().await?;
    Ok(report)
}

/// Insert `record` into the table of `kind` unless its unique id is stored
///
/// Returns `false` when the record already exists.
async fn insert_if_new<S: LabStore + ?Sized>(
    store: &mut S,
    kind: &MeasurementKind,
    record: &LabRecord,
) -> Result<bool> {
    let id_field = kind.unique_id_field().unwrap_or(kind.unique_id_column.as_str());
    let id = record.get(id_field).ok_or_else(|| IngestError::MissingUniqueId {
        field: id_field.to_string(),
        identifier: kind.identifier.clone(),
        file: record.source().to_path_buf(),
    })?;

    if store
        .record_exists(&kind.table, &kind.unique_id_column, id)
        .await?
    {
        debug!(table = %kind.table, id, "Record already exists");
        return Ok(false);
    }

    let mut columns = Vec::with_capacity(record.len());
    let mut values = Vec::with_capacity(record.len());
    for (field, value) in record.fields() {
        let column = kind
            .column_for_field(field)
            .ok_or_else(|| IngestError::UnmappedField {
                field: field.to_string(),
                identifier: kind.identifier.clone(),
                file: record.source().to_path_buf(),
            })?;
        columns.push(column);
        values.push(value);
    }

    store.insert_record(&kind.table, &columns, &values).await?;
    debug!(table = %kind.table, id, "Inserted record");
    Ok(true)
}
