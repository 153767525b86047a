//! Master CSV export
//!
//! Joins procurement, ball milling, hot press and every measurement table
//! into one wide table and writes it to `master_<year>-<month>-<day>.csv`.
//!
//! # Join order
//!
//! 1. ball milling ⟗ hot press on `hot_press.ball_milling_uid = ball_milling.uid`
//! 2. for each material type in procurement: ⟕ the procurement rows of that
//!    type on `uid_ball_milling = <material>_ball_milling_uid`
//! 3. for each measurement kind and process role (`bm`, `hp`): ⟕ the
//!    measurement table on the role's output material uid, plus a
//!    `<role>_<table>_results` flag
//!
//! Every join keeps unmatched rows, so a process without measurements still
//! appears with empty measurement columns and a `False` flag.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Utc};
use labmerge_common::table::{Cell, JoinKind};
use labmerge_common::{MeasurementCatalog, MeasurementKind, Table};
use tracing::{debug, info, instrument};

use crate::db::LabStore;
use crate::error::{IngestError, Result};

/// Columns shared by both process tables, prefixed per process before joining
pub const PROCESS_COLUMNS: [&str; 3] =
    ["process_name", "output_material_name", "output_material_uid"];

/// Flag value for a matched measurement
pub const FLAG_TRUE: &str = "True";

/// Flag value for a missing measurement
pub const FLAG_FALSE: &str = "False";

/// Names of the tables and columns the export joins on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    pub procurement_table: String,
    pub ball_milling_table: String,
    pub hot_press_table: String,

    /// Procurement column naming the material type
    pub material_type_column: String,

    /// Procurement column holding the ball milling uid that consumed the material
    pub procurement_link_column: String,

    /// Hot press column holding the ball milling uid it consumed
    pub hot_press_link_column: String,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            procurement_table: "material_procurement".to_string(),
            ball_milling_table: "ball_milling".to_string(),
            hot_press_table: "hot_press".to_string(),
            material_type_column: "material_name".to_string(),
            procurement_link_column: "ball_milling_uid".to_string(),
            hot_press_link_column: "ball_milling_uid".to_string(),
        }
    }
}

/// A process whose output material may have been measured
struct ProcessRole {
    abbreviation: &'static str,
    output_uid_column: &'static str,
}

const PROCESS_ROLES: [ProcessRole; 2] = [
    ProcessRole {
        abbreviation: "bm",
        output_uid_column: "ball_milling_output_material_uid",
    },
    ProcessRole {
        abbreviation: "hp",
        output_uid_column: "hot_press_output_material_uid",
    },
];

/// File name of the export for `date`, e.g. `master_2024-3-7.csv`
pub fn master_file_name(date: NaiveDate) -> String {
    format!("master_{}-{}-{}.csv", date.year(), date.month(), date.day())
}

/// Build the master table and write it to `output_dir`
///
/// Returns the path of the written file.
#[instrument(skip_all, fields(output_dir = %output_dir.display()))]
pub async fn create_master_csv<S: LabStore + ?Sized>(
    store: &mut S,
    catalog: &MeasurementCatalog,
    layout: &ExportLayout,
    output_dir: &Path,
) -> Result<PathBuf> {
    let master = build_master_table(store, catalog, layout).await?;

    let path = output_dir.join(master_file_name(Utc::now().date_naive()));
    write_csv(&master, &path)?;

    info!(
        path = %path.display(),
        rows = master.len(),
        columns = master.columns().len(),
        "Created new master csv"
    );
    Ok(path)
}

/// Read every source table and join them into the master table
pub async fn build_master_table<S: LabStore + ?Sized>(
    store: &mut S,
    catalog: &MeasurementCatalog,
    layout: &ExportLayout,
) -> Result<Table> {
    let procurement = store.fetch_table(&layout.procurement_table).await?;
    let mut ball_milling = store.fetch_table(&layout.ball_milling_table).await?;
    let mut hot_press = store.fetch_table(&layout.hot_press_table).await?;

    ball_milling.rename_columns(&prefixed_renames("ball_milling_"))?;
    hot_press.rename_columns(&prefixed_renames("hot_press_"))?;

    let mut master = ball_milling.merge(
        &hot_press,
        "uid",
        &layout.hot_press_link_column,
        JoinKind::Outer,
        ("_ball_milling", "_hot_press"),
    )?;
    debug!(rows = master.len(), "Joined ball milling and hot press");

    master = merge_materials(master, &procurement, layout)?;
    clean_up_process_uids(&mut master, layout)?;

    for kind in catalog {
        let results = store.fetch_table(&kind.table).await?;
        master = merge_lab_results(master, &results, kind)?;
    }

    Ok(master)
}

fn prefixed_renames(prefix: &str) -> Vec<(&'static str, String)> {
    PROCESS_COLUMNS
        .iter()
        .map(|c| (*c, format!("{}{}", prefix, c)))
        .collect()
}

/// Add one block of procurement columns per material type
fn merge_materials(
    mut master: Table,
    procurement: &Table,
    layout: &ExportLayout,
) -> Result<Table> {
    for material in procurement.distinct_values(&layout.material_type_column)? {
        let prefix = format!("{}_", material);
        let link = format!("{}{}", prefix, layout.procurement_link_column);

        let materials = procurement
            .filter_eq(&layout.material_type_column, &material)?
            .with_prefix(&prefix);

        master = master.merge(
            &materials,
            "uid_ball_milling",
            &link,
            JoinKind::Left,
            ("_x", "_y"),
        )?;
        master.drop_column(&link)?;
        debug!(%material, rows = master.len(), "Joined procurement block");
    }
    Ok(master)
}

/// Collapse the uid columns left over by the process join
///
/// `uid_ball_milling` is filled from the hot press link for hot press rows
/// without a ball milling match, then the link is dropped and both uids are
/// folded into `ball_milling_uid` / `hot_press_uid`.
fn clean_up_process_uids(master: &mut Table, layout: &ExportLayout) -> Result<()> {
    master.coalesce_into("uid_ball_milling", &layout.hot_press_link_column)?;
    master.drop_column(&layout.hot_press_link_column)?;
    fold_uid_column(master, "uid_ball_milling", "ball_milling_uid")?;
    fold_uid_column(master, "uid_hot_press", "hot_press_uid")?;
    Ok(())
}

/// Rename `from` to `to`, or merge it into `to` when a process table
/// already carries that column (e.g. ball milling's own `hot_press_uid`)
fn fold_uid_column(master: &mut Table, from: &str, to: &str) -> Result<()> {
    if master.has_column(to) {
        master.coalesce_into(to, from)?;
        master.drop_column(from)?;
    } else {
        master.rename_columns(&[(from, to)])?;
    }
    Ok(())
}

/// Join one measurement table onto each process role's output material
fn merge_lab_results(
    mut master: Table,
    results: &Table,
    kind: &MeasurementKind,
) -> Result<Table> {
    for role in &PROCESS_ROLES {
        let prefix = format!("{}_{}_", role.abbreviation, kind.table);
        let joined_id = format!("{}{}", prefix, kind.unique_id_column);

        master = master.merge(
            &results.clone().with_prefix(&prefix),
            role.output_uid_column,
            &joined_id,
            JoinKind::Left,
            ("_x", "_y"),
        )?;

        let flags: Vec<Cell> = master
            .column(&joined_id)?
            .into_iter()
            .map(|id| {
                let flag = if id.is_some() { FLAG_TRUE } else { FLAG_FALSE };
                Some(flag.to_string())
            })
            .collect();
        master.add_column(format!("{}results", prefix), flags)?;
        master.drop_column(&joined_id)?;
    }
    Ok(master)
}

/// Write `table` as CSV with a leading unnamed row-index column
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let csv_error = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

    let header = std::iter::once("").chain(table.columns().iter().map(String::as_str));
    writer.write_record(header).map_err(csv_error)?;

    for (i, row) in table.rows().iter().enumerate() {
        let index = i.to_string();
        let cells = std::iter::once(index.as_str())
            .chain(row.iter().map(|c| c.as_deref().unwrap_or("")));
        writer.write_record(cells).map_err(csv_error)?;
    }

    writer.flush().map_err(|e| csv_error(e.into()))?;
    Ok(())
}
