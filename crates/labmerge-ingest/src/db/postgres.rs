//! PostgreSQL implementation of [`LabStore`]
//!
//! One connection, one transaction at a time. The transaction is opened
//! lazily by the first statement after a commit.

use async_trait::async_trait;
use labmerge_common::catalog::ColumnSpec;
use labmerge_common::Table;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, info};

use super::{quote_ident, DbConfig, DbError, DbResult, LabStore};

pub struct PgLabStore {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLabStore {
    /// Open a single-connection store
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        let options = config.connect_options()?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.connect_timeout())
            .connect_with(options)
            .await?;

        info!("Connected to database");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    async fn tx(&mut self) -> DbResult<&mut Transaction<'static, Postgres>> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(self.tx.insert(tx))
    }

    /// Column names and type names in schema order
    async fn columns_with_types(&mut self, table: &str) -> DbResult<Vec<(String, String)>> {
        let tx = self.tx().await?;

        let columns = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT column_name::text, udt_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&mut **tx)
        .await?;

        Ok(columns)
    }
}

#[async_trait]
impl LabStore for PgLabStore {
    async fn table_exists(&mut self, table: &str) -> DbResult<bool> {
        let tx = self.tx().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(&mut **tx)
        .await?;

        Ok(exists)
    }

    async fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> DbResult<()> {
        let definitions = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.definition))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!("CREATE TABLE {} ({})", quote_ident(table), definitions);
        debug!(%statement, "Creating table");

        let tx = self.tx().await?;
        sqlx::query(&statement).execute(&mut **tx).await?;
        Ok(())
    }

    async fn column_names(&mut self, table: &str) -> DbResult<Vec<String>> {
        let columns = self.columns_with_types(table).await?;
        Ok(columns.into_iter().map(|(name, _)| name).collect())
    }

    async fn record_exists(&mut self, table: &str, column: &str, value: &str) -> DbResult<bool> {
        let statement = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {}::text = $1)",
            quote_ident(table),
            quote_ident(column)
        );

        let tx = self.tx().await?;
        let exists = sqlx::query_scalar::<_, bool>(&statement)
            .bind(value)
            .fetch_one(&mut **tx)
            .await?;

        Ok(exists)
    }

    async fn insert_record(
        &mut self,
        table: &str,
        columns: &[&str],
        values: &[&str],
    ) -> DbResult<()> {
        if columns.len() != values.len() {
            return Err(DbError::ArityMismatch {
                table: table.to_string(),
                columns: columns.len(),
                values: values.len(),
            });
        }

        let live = self.columns_with_types(table).await?;
        if live.is_empty() {
            return Err(DbError::MissingTable(table.to_string()));
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} (", quote_ident(table)));
        builder.push(
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        );
        builder.push(") VALUES (");

        // Lab values arrive as text; the cast lets PostgreSQL coerce them to the column type.
        for (i, (column, value)) in columns.iter().zip(values).enumerate() {
            let type_name = live
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, type_name)| type_name)
                .ok_or_else(|| DbError::unknown_column(table, column))?;

            if i > 0 {
                builder.push(", ");
            }
            builder.push("CAST(");
            builder.push_bind(value.to_string());
            builder.push(format!(" AS {})", quote_ident(type_name)));
        }
        builder.push(")");

        let tx = self.tx().await?;
        builder.build().execute(&mut **tx).await?;
        Ok(())
    }

    async fn fetch_table(&mut self, table: &str) -> DbResult<Table> {
        let columns = self.column_names(table).await?;
        if columns.is_empty() {
            return Err(DbError::MissingTable(table.to_string()));
        }

        let statement = format!(
            "SELECT {} FROM {}",
            columns
                .iter()
                .map(|c| format!("{}::text", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", "),
            quote_ident(table)
        );

        let tx = self.tx().await?;
        let rows = sqlx::query(&statement).fetch_all(&mut **tx).await?;

        let mut result = Table::new(columns)?;
        for row in rows {
            let cells = (0..row.len())
                .map(|i| row.try_get::<Option<String>, _>(i))
                .collect::<Result<Vec<_>, _>>()?;
            result.push_row(cells)?;
        }

        debug!(table, rows = result.len(), "Fetched table");
        Ok(result)
    }

    async fn commit(&mut self) -> DbResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        self.pool.close().await;
        Ok(())
    }
}
