//! Master table joins over seeded process tables

mod common;

use common::{hall_file, icp_file, seeded_store, write_lab_files};
use labmerge_common::lab_file::LabFileReader;
use labmerge_common::{MeasurementCatalog, Table};
use labmerge_ingest::db::{LabStore, MemoryLabStore};
use labmerge_ingest::export::{build_master_table, create_master_csv, master_file_name};
use labmerge_ingest::ingest::add_new_lab_results;
use labmerge_ingest::schema::create_lab_tables;
use labmerge_ingest::{ExportLayout, IngestError};

/// Seeded store with an ICP result for BM1's powder and a Hall result for HP1's pellet
async fn store_with_results(catalog: &MeasurementCatalog) -> MemoryLabStore {
    let mut store = seeded_store();
    create_lab_tables(&mut store, catalog).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_lab_files(
        dir.path(),
        &[("a.txt", icp_file("M-BM1")), ("b.txt", hall_file("M-HP1"))],
    );
    add_new_lab_results(&mut store, catalog, &LabFileReader::new(dir.path()))
        .await
        .unwrap();
    store
}

async fn master(catalog: &MeasurementCatalog) -> Table {
    let mut store = store_with_results(catalog).await;
    build_master_table(&mut store, catalog, &ExportLayout::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_process_join_keeps_unmatched_rows() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let master = master(&catalog).await;

    // BM1+HP1, BM2 alone, HP9 alone
    assert_eq!(master.len(), 3);
    assert_eq!(master.value(0, "ball_milling_uid").unwrap(), Some("BM1"));
    assert_eq!(master.value(0, "hot_press_uid").unwrap(), Some("HP1"));
    assert_eq!(master.value(1, "ball_milling_uid").unwrap(), Some("BM2"));
    assert_eq!(master.value(1, "hot_press_uid").unwrap(), None);

    // Hot press without a stored ball milling keeps its link as the uid
    assert_eq!(master.value(2, "ball_milling_uid").unwrap(), Some("BM9"));
    assert_eq!(master.value(2, "hot_press_uid").unwrap(), Some("HP9"));
    assert_eq!(master.value(2, "ball_milling_process_name").unwrap(), None);
    assert_eq!(
        master.value(2, "hot_press_output_material_uid").unwrap(),
        Some("M-HP9")
    );

    assert!(!master.has_column("uid_ball_milling"));
    assert!(!master.has_column("uid_hot_press"));
}

#[tokio::test]
async fn test_materials_are_joined_per_type() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let master = master(&catalog).await;

    assert_eq!(master.value(0, "Pb_uid").unwrap(), Some("P1"));
    assert_eq!(master.value(0, "Sn_uid").unwrap(), Some("P2"));
    assert_eq!(master.value(0, "Pb_material_name").unwrap(), Some("Pb"));
    assert_eq!(master.value(1, "Pb_uid").unwrap(), None);
    assert!(!master.has_column("Pb_ball_milling_uid"));
    assert!(!master.has_column("Sn_ball_milling_uid"));
}

#[tokio::test]
async fn test_lab_results_are_flagged_per_process() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let master = master(&catalog).await;

    assert_eq!(master.value(0, "bm_icp_lab_results").unwrap(), Some("True"));
    assert_eq!(master.value(0, "hp_icp_lab_results").unwrap(), Some("False"));
    assert_eq!(master.value(0, "bm_hall_lab_results").unwrap(), Some("False"));
    assert_eq!(master.value(0, "hp_hall_lab_results").unwrap(), Some("True"));
    assert_eq!(master.value(0, "bm_icp_lab_gas_type").unwrap(), Some("Ar"));
    assert_eq!(master.value(0, "hp_hall_lab_probe_material").unwrap(), Some("Gold"));

    for row in 1..master.len() {
        for flag in [
            "bm_icp_lab_results",
            "hp_icp_lab_results",
            "bm_hall_lab_results",
            "hp_hall_lab_results",
        ] {
            assert_eq!(master.value(row, flag).unwrap(), Some("False"));
        }
    }

    assert!(!master.has_column("bm_icp_lab_material_uid"));
    assert!(!master.has_column("hp_hall_lab_material_uid"));
}

#[tokio::test]
async fn test_unmatched_rows_have_empty_measurement_columns() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let master = master(&catalog).await;

    let measurement_columns: Vec<&String> = master
        .columns()
        .iter()
        .filter(|c| c.starts_with("bm_") || c.starts_with("hp_"))
        .filter(|c| !c.ends_with("_results"))
        .collect();
    assert!(!measurement_columns.is_empty());

    for row in 1..master.len() {
        for column in &measurement_columns {
            assert_eq!(master.value(row, column).unwrap(), None, "{column} row {row}");
        }
    }

    // Only the matched side of BM1+HP1 carries values
    assert_eq!(master.value(0, "hp_icp_lab_gas_type").unwrap(), None);
    assert_eq!(master.value(0, "bm_hall_lab_probe_material").unwrap(), None);
}

#[tokio::test]
async fn test_several_results_for_one_material_fan_out() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let mut store = seeded_store();
    create_lab_tables(&mut store, &catalog).await.unwrap();

    for gas in ["Ar", "N2"] {
        store
            .insert_record("icp_lab", &["material_uid", "gas_type"], &["M-BM1", gas])
            .await
            .unwrap();
    }
    store.commit().await.unwrap();

    let master = build_master_table(&mut store, &catalog, &ExportLayout::default())
        .await
        .unwrap();

    // BM1+HP1 appears once per ICP result, BM2 and HP9 once each
    assert_eq!(master.len(), 4);
    assert_eq!(master.value(0, "ball_milling_uid").unwrap(), Some("BM1"));
    assert_eq!(master.value(1, "ball_milling_uid").unwrap(), Some("BM1"));
    assert_eq!(master.value(0, "bm_icp_lab_gas_type").unwrap(), Some("Ar"));
    assert_eq!(master.value(1, "bm_icp_lab_gas_type").unwrap(), Some("N2"));
    assert_eq!(master.value(0, "Pb_uid").unwrap(), Some("P1"));
    assert_eq!(master.value(1, "Pb_uid").unwrap(), Some("P1"));
    assert_eq!(master.value(2, "ball_milling_uid").unwrap(), Some("BM2"));
    assert_eq!(master.value(2, "bm_icp_lab_results").unwrap(), Some("False"));
}

#[tokio::test]
async fn test_ball_milling_with_own_hot_press_uid_column() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let ball_milling = Table::from_rows(
        [
            "uid",
            "process_name",
            "output_material_name",
            "output_material_uid",
            "hot_press_uid",
        ],
        vec![
            vec![
                Some("BM1".to_string()),
                Some("mill".to_string()),
                Some("PbSn powder".to_string()),
                Some("M-BM1".to_string()),
                Some("HP1".to_string()),
            ],
            vec![
                Some("BM2".to_string()),
                Some("mill".to_string()),
                Some("PbSn powder".to_string()),
                Some("M-BM2".to_string()),
                None,
            ],
        ],
    )
    .unwrap();

    let mut store = MemoryLabStore::new()
        .with_table("material_procurement", common::material_procurement())
        .with_table("ball_milling", ball_milling)
        .with_table("hot_press", common::hot_press());
    create_lab_tables(&mut store, &catalog).await.unwrap();

    let master = build_master_table(&mut store, &catalog, &ExportLayout::default())
        .await
        .unwrap();

    assert_eq!(master.len(), 3);
    assert!(!master.has_column("uid_hot_press"));
    assert_eq!(
        master.columns().iter().filter(|c| *c == "hot_press_uid").count(),
        1
    );
    assert_eq!(master.value(0, "hot_press_uid").unwrap(), Some("HP1"));
    assert_eq!(master.value(1, "hot_press_uid").unwrap(), None);
    // Hot press without a ball milling match keeps its own uid
    assert_eq!(master.value(2, "hot_press_uid").unwrap(), Some("HP9"));
    assert_eq!(master.value(2, "ball_milling_uid").unwrap(), Some("BM9"));
}

#[tokio::test]
async fn test_create_master_csv_writes_dated_file() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let mut store = store_with_results(&catalog).await;
    let out = tempfile::tempdir().unwrap();

    let path = create_master_csv(&mut store, &catalog, &ExportLayout::default(), out.path())
        .await
        .unwrap();

    let name = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("master_"));
    assert!(name.ends_with(".csv"));
    assert_eq!(
        name,
        master_file_name(chrono::Utc::now().date_naive()),
        "file name follows the date of the run"
    );

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with(",ball_milling_uid,"));
    assert!(lines.next().unwrap().starts_with("0,BM1,"));
    assert_eq!(text.lines().count(), 4);
}

#[tokio::test]
async fn test_missing_process_table_fails() {
    let catalog = MeasurementCatalog::builtin().unwrap();
    let mut store = MemoryLabStore::new().with_table("ball_milling", common::ball_milling());
    create_lab_tables(&mut store, &catalog).await.unwrap();

    let err = build_master_table(&mut store, &catalog, &ExportLayout::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Database(_)));
}
