//! labmerge - load lab result files and build the master CSV

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use labmerge_common::lab_file::LabFileReader;
use labmerge_common::logging::{init_logging, LogConfig, LogLevel};
use labmerge_common::MeasurementCatalog;
use labmerge_ingest::config::Config;
use labmerge_ingest::db::{DbConfig, LabStore, PgLabStore};
use labmerge_ingest::{export, ingest, schema, ExportLayout, IngestError};
use tracing::{error, info};

/// Command-line arguments
///
/// A wrong argument count prints usage and exits with clap's status 2. A
/// failing step prints the error with a hint and exits with status 1.
#[derive(Parser, Debug)]
#[command(name = "labmerge")]
#[command(
    author,
    version,
    about = "Load ICP/Hall lab result files into the database and build the master CSV",
    long_about = None
)]
struct Cli {
    /// Directory where only lab .txt files are located (e.g. 'lab_files/')
    lab_files_directory: PathBuf,

    /// Database connection string (e.g. 'dbname=citrine user=dale' or a postgres:// URL)
    connection: String,

    /// TOML measurement catalog to use instead of the built-in ICP/Hall one
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Directory to write the master CSV to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    // Environment variables take precedence over the flag
    let log_config = LogConfig::default().with_level(log_level).merge_env()?;
    init_logging(&log_config)?;

    let mut config = Config::load()?;
    if let Some(catalog) = cli.catalog {
        config.catalog_path = Some(catalog);
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    let catalog = config.catalog()?;
    let db_config =
        DbConfig::new(cli.connection.as_str()).with_connect_timeout(config.connect_timeout_secs);

    if let Err(e) = create_tables(&db_config, &catalog).await {
        fail(
            &e,
            "The second argument must be a connection string for your database \
             (e.g. 'dbname=citrine user=dale').",
        );
    }

    let reader = LabFileReader::new(&cli.lab_files_directory)
        .with_extension(config.lab_file_extension.as_str())
        .with_header_lines(config.header_lines);

    if let Err(e) = add_lab_results(&db_config, &catalog, &reader).await {
        fail(
            &e,
            "The first argument must be the directory where only lab .txt files are located.",
        );
    }

    match build_export(&db_config, &catalog, &config).await {
        Ok(path) => info!(path = %path.display(), "Done"),
        Err(e) => fail(
            &e,
            "The material_procurement, ball_milling and hot_press tables must exist \
             with their usual columns.",
        ),
    }

    Ok(())
}

fn fail(err: &IngestError, hint: &str) -> ! {
    error!(error = %err, "Run failed");
    eprintln!("Error: {}", err);
    eprintln!("{}", hint);
    process::exit(1);
}

async fn create_tables(db: &DbConfig, catalog: &MeasurementCatalog) -> labmerge_ingest::Result<()> {
    let mut store = PgLabStore::connect(db).await?;
    let result = schema::create_lab_tables(&mut store, catalog).await;
    store.close().await?;
    result.map(|_| ())
}

async fn add_lab_results(
    db: &DbConfig,
    catalog: &MeasurementCatalog,
    reader: &LabFileReader,
) -> labmerge_ingest::Result<()> {
    let mut store = PgLabStore::connect(db).await?;
    let result = ingest::add_new_lab_results(&mut store, catalog, reader).await;
    store.close().await?;
    result.map(|_| ())
}

async fn build_export(
    db: &DbConfig,
    catalog: &MeasurementCatalog,
    config: &Config,
) -> labmerge_ingest::Result<PathBuf> {
    let mut store = PgLabStore::connect(db).await?;
    let result = export::create_master_csv(
        &mut store,
        catalog,
        &ExportLayout::default(),
        &config.output_dir,
    )
    .await;
    store.close().await?;
    result
}
