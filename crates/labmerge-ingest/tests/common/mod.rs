//! Shared fixtures for labmerge integration tests
//!
//! Lab files are written to temporary directories; process tables are seeded
//! into a [`MemoryLabStore`]. [`TestPostgres`] starts a throwaway PostgreSQL
//! container and needs Docker, so tests using it are `#[ignore]`d.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use labmerge_common::table::Cell;
use labmerge_common::Table;
use labmerge_ingest::db::MemoryLabStore;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

// ============================================================================
// Lab files
// ============================================================================

/// Banner lines every lab file starts with
pub const BANNER: &str = "Lab Results Export\n--------------------\n";

/// Text of an ICP lab file for `uid`
pub fn icp_file(uid: &str) -> String {
    format!(
        "{BANNER}material_uid\t{uid}\n\
         Measurement\tICP\n\
         Pb Concentration\t12.5\n\
         Sn Concentration\t40.1\n\
         O Concentration\t0.3\n\
         Gas Flow Rate\tL/min\t1.2\n\
         Gas Type\tAr\n\
         Plasma Temperature\tC\t6000\n\
         Detector Temperature\tC\t-30\n\
         Field Strength\tT\t1.5\n\
         Plasma Observation\tAxial\n\
         Radio Frequency\tMHz\t27.12\n"
    )
}

/// Text of a Hall lab file for `uid`
pub fn hall_file(uid: &str) -> String {
    format!(
        "{BANNER}material_uid\t{uid}\n\
         Measurement\tHall\n\
         Probe Resistance\tohm\t0.8\n\
         Gas Flow Rate\tL/min\t0.5\n\
         Gas Type\tN2\n\
         Probe Material\tGold\n\
         Current\tmA\t10\n\
         Field Strength\tT\t0.7\n\
         Sample Position\t3\n\
         Magnet Reversal\ttrue\n"
    )
}

/// Write `files` (name, contents) into `dir`
pub fn write_lab_files(dir: &Path, files: &[(&str, String)]) {
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).expect("Failed to write lab file");
    }
}

// ============================================================================
// Process tables
// ============================================================================

pub fn cell(value: &str) -> Cell {
    Some(value.to_string())
}

fn table(columns: &[&str], rows: &[&[Option<&str>]]) -> Table {
    Table::from_rows(
        columns.iter().copied(),
        rows.iter()
            .map(|row| row.iter().map(|v| v.map(str::to_string)).collect())
            .collect(),
    )
    .expect("Invalid fixture table")
}

/// Two ball millings; BM1 fed HP1, BM2 was never hot pressed
pub fn ball_milling() -> Table {
    table(
        &["uid", "process_name", "output_material_name", "output_material_uid"],
        &[
            &[Some("BM1"), Some("mill"), Some("PbSn powder"), Some("M-BM1")],
            &[Some("BM2"), Some("mill"), Some("PbSn powder"), Some("M-BM2")],
        ],
    )
}

/// HP1 consumed BM1; HP9 references a ball milling that is not stored
pub fn hot_press() -> Table {
    table(
        &[
            "uid",
            "process_name",
            "output_material_name",
            "output_material_uid",
            "ball_milling_uid",
        ],
        &[
            &[Some("HP1"), Some("press"), Some("PbSn pellet"), Some("M-HP1"), Some("BM1")],
            &[Some("HP9"), Some("press"), Some("PbSn pellet"), Some("M-HP9"), Some("BM9")],
        ],
    )
}

/// Pb and Sn both went into BM1
pub fn material_procurement() -> Table {
    table(
        &["uid", "material_name", "ball_milling_uid"],
        &[
            &[Some("P1"), Some("Pb"), Some("BM1")],
            &[Some("P2"), Some("Sn"), Some("BM1")],
        ],
    )
}

/// Store holding the three process tables
pub fn seeded_store() -> MemoryLabStore {
    MemoryLabStore::new()
        .with_table("material_procurement", material_procurement())
        .with_table("ball_milling", ball_milling())
        .with_table("hot_press", hot_press())
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// Throwaway PostgreSQL container
pub struct TestPostgres {
    #[allow(unused)]
    container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Create and fill the process tables the export reads
    pub async fn seed_process_tables(&self) -> Result<()> {
        sqlx::raw_sql(
            "CREATE TABLE material_procurement (
                 uid varchar(30) PRIMARY KEY,
                 material_name varchar(30),
                 ball_milling_uid varchar(30));
             CREATE TABLE ball_milling (
                 uid varchar(30) PRIMARY KEY,
                 process_name varchar(30),
                 output_material_name varchar(30),
                 output_material_uid varchar(30));
             CREATE TABLE hot_press (
                 uid varchar(30) PRIMARY KEY,
                 process_name varchar(30),
                 output_material_name varchar(30),
                 output_material_uid varchar(30),
                 ball_milling_uid varchar(30));
             INSERT INTO material_procurement VALUES ('P1', 'Pb', 'BM1'), ('P2', 'Sn', 'BM1');
             INSERT INTO ball_milling VALUES
                 ('BM1', 'mill', 'PbSn powder', 'M-BM1'),
                 ('BM2', 'mill', 'PbSn powder', 'M-BM2');
             INSERT INTO hot_press VALUES
                 ('HP1', 'press', 'PbSn pellet', 'M-HP1', 'BM1'),
                 ('HP9', 'press', 'PbSn pellet', 'M-HP9', 'BM9');",
        )
        .execute(&self.pool)
        .await
        .context("Failed to seed process tables")?;
        Ok(())
    }
}

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,labmerge_ingest=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
