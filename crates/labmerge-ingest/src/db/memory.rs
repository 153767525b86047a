//! In-memory implementation of [`LabStore`]
//!
//! Keeps a working copy of every table plus the last committed copy.
//! `commit` publishes the working copy; `close` throws it away. Used by the
//! test suite and for dry runs against seeded tables.

use std::collections::BTreeMap;

use async_trait::async_trait;
use labmerge_common::catalog::ColumnSpec;
use labmerge_common::Table;

use super::{DbError, DbResult, LabStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryLabStore {
    working: BTreeMap<String, Table>,
    committed: BTreeMap<String, Table>,
    commits: usize,
}

impl MemoryLabStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table as if it had been committed earlier
    pub fn with_table(mut self, name: impl Into<String>, table: Table) -> Self {
        let name = name.into();
        self.committed.insert(name.clone(), table.clone());
        self.working.insert(name, table);
        self
    }

    /// Table as of the last commit
    pub fn committed_table(&self, name: &str) -> Option<&Table> {
        self.committed.get(name)
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    fn table(&self, name: &str) -> DbResult<&Table> {
        self.working
            .get(name)
            .ok_or_else(|| DbError::MissingTable(name.to_string()))
    }
}

#[async_trait]
impl LabStore for MemoryLabStore {
    async fn table_exists(&mut self, table: &str) -> DbResult<bool> {
        Ok(self.working.contains_key(table))
    }

    async fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> DbResult<()> {
        if self.working.contains_key(table) {
            return Err(DbError::TableExists(table.to_string()));
        }

        let created = Table::new(columns.iter().map(|c| c.name.clone()))?;
        self.working.insert(table.to_string(), created);
        Ok(())
    }

    async fn column_names(&mut self, table: &str) -> DbResult<Vec<String>> {
        Ok(self
            .working
            .get(table)
            .map(|t| t.columns().to_vec())
            .unwrap_or_default())
    }

    async fn record_exists(&mut self, table: &str, column: &str, value: &str) -> DbResult<bool> {
        let existing = self.table(table)?;
        if !existing.has_column(column) {
            return Err(DbError::unknown_column(table, column));
        }

        Ok(existing.column(column)?.contains(&Some(value)))
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

        let existing = self.table(table)?;
        let mut row = vec![None; existing.columns().len()];
        for (column, value) in columns.iter().zip(values) {
            let idx = existing
                .columns()
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| DbError::unknown_column(table, column))?;
            row[idx] = Some((*value).to_string());
        }

        if let Some(target) = self.working.get_mut(table) {
            target.push_row(row)?;
        }
        Ok(())
    }

    async fn fetch_table(&mut self, table: &str) -> DbResult<Table> {
        self.table(table).cloned()
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.committed = self.working.clone();
        self.commits += 1;
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.working = self.committed.clone();
        Ok(())
    }
}
