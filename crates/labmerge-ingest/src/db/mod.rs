//! Database gateway
//!
//! [`LabStore`] is the seam between the pipeline and the relational store.
//! Every operation runs inside one open transaction; nothing is visible to
//! other sessions until [`LabStore::commit`]. [`LabStore::close`] discards
//! whatever was not committed.
//!
//! - [`PgLabStore`]: PostgreSQL over a single sqlx connection
//! - [`MemoryLabStore`]: in-process tables with the same transaction rules

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use labmerge_common::catalog::ColumnSpec;
use labmerge_common::{LabError, Table};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::MemoryLabStore;
pub use postgres::PgLabStore;

/// Default database connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Connection string or settings are invalid
    #[error("Database configuration error: {0}. Check the connection string.")]
    Config(String),

    #[error("Table '{0}' does not exist")]
    MissingTable(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("Insert into '{table}' has {columns} columns but {values} values")]
    ArityMismatch {
        table: String,
        columns: usize,
        values: usize,
    },

    #[error(transparent)]
    Table(#[from] LabError),
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn unknown_column(table: &str, column: &str) -> Self {
        Self::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Gateway operations the pipeline needs from the relational store
#[async_trait]
pub trait LabStore: Send {
    async fn table_exists(&mut self, table: &str) -> DbResult<bool>;

    /// Create `table` with the given columns
    async fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> DbResult<()>;

    /// Column names in schema order; empty when the table does not exist
    async fn column_names(&mut self, table: &str) -> DbResult<Vec<String>>;

    /// Whether any row has `column` equal to `value` (compared as text)
    async fn record_exists(&mut self, table: &str, column: &str, value: &str) -> DbResult<bool>;

    /// Insert one row; `values[i]` goes to `columns[i]`
    async fn insert_record(&mut self, table: &str, columns: &[&str], values: &[&str])
        -> DbResult<()>;

    /// Every row of `table`, cells rendered as text
    async fn fetch_table(&mut self, table: &str) -> DbResult<Table>;

    async fn commit(&mut self) -> DbResult<()>;

    /// Roll back anything uncommitted and release the connection
    async fn close(&mut self) -> DbResult<()>;
}

/// Connection settings for [`PgLabStore`]
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// URL (`postgres://...`) or libpq keyword/value string (`dbname=lab user=dale`)
    pub connection: String,
    pub connect_timeout_secs: u64,
}

impl DbConfig {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn connect_options(&self) -> DbResult<PgConnectOptions> {
        parse_connection_string(&self.connection)
    }
}

/// Parse a PostgreSQL URL or a libpq keyword/value connection string
///
/// Supported keywords: `host`, `hostaddr`, `port`, `user`, `password`,
/// `dbname`, `sslmode`, `application_name`. Values may be single-quoted but
/// cannot contain whitespace.
pub fn parse_connection_string(connection: &str) -> DbResult<PgConnectOptions> {
    let connection = connection.trim();
    if connection.is_empty() {
        return Err(DbError::config("connection string is empty"));
    }

    if connection.starts_with("postgres://") || connection.starts_with("postgresql://") {
        return Ok(PgConnectOptions::from_str(connection)?);
    }

    let mut options = PgConnectOptions::new();
    for pair in connection.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| DbError::config(format!("expected keyword=value, got '{}'", pair)))?;
        let value = value.trim_matches('\'');

        options = match key {
            "host" | "hostaddr" => options.host(value),
            "port" => options.port(
                value
                    .parse()
                    .map_err(|_| DbError::config(format!("invalid port '{}'", value)))?,
            ),
            "user" => options.username(value),
            "password" => options.password(value),
            "dbname" => options.database(value),
            "sslmode" => options.ssl_mode(
                PgSslMode::from_str(value)
                    .map_err(|_| DbError::config(format!("invalid sslmode '{}'", value)))?,
            ),
            "application_name" => options.application_name(value),
            other => {
                return Err(DbError::config(format!(
                    "unsupported connection keyword '{}'",
                    other
                )))
            },
        };
    }

    Ok(options)
}

/// Quote an SQL identifier, doubling embedded quotes
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
