//! In-memory tabular data
//!
//! [`Table`] holds rows of nullable text cells under named columns. It
//! provides the handful of relational operations the master export needs:
//! renaming and prefixing columns, filtering, and left/outer joins that keep
//! unmatched rows.
//!
//! Join keys compare as text. A missing (`None`) or empty key never matches anything.

use std::collections::{HashMap, HashSet};

use crate::error::{LabError, Result};

/// A single nullable cell
pub type Cell = Option<String>;

/// How unmatched rows are treated by [`Table::merge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep every left row; right rows only when matched
    Left,
    /// Keep every row from both sides
    Outer,
}

/// Rows of text cells under named columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(LabError::DuplicateColumn(column.clone()));
            }
        }

        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a table and fill it with rows
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Cell>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(LabError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| LabError::missing_column(name, &self.columns))
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Result<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_deref()).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Result<Option<&str>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.get(row).and_then(|r| r[idx].as_deref()))
    }

    /// Rename columns; every source column must exist
    pub fn rename_columns<F, T>(&mut self, renames: &[(F, T)]) -> Result<()>
    where
        F: AsRef<str>,
        T: AsRef<str>,
    {
        for (from, to) in renames {
            let (from, to) = (from.as_ref(), to.as_ref());
            let idx = self.column_index(from)?;
            if from != to && self.has_column(to) {
                return Err(LabError::DuplicateColumn(to.to_string()));
            }
            self.columns[idx] = to.to_string();
        }
        Ok(())
    }

    /// Prefix every column name
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        for column in &mut self.columns {
            column.insert_str(0, prefix);
        }
        self
    }

    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        let idx = self.column_index(name)?;
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        Ok(())
    }

    /// Append a column; `values` must have one entry per row
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(LabError::DuplicateColumn(name));
        }
        if values.len() != self.rows.len() {
            return Err(LabError::RowWidth {
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Fill missing cells of `target` with the value of `source` on the same row
    pub fn coalesce_into(&mut self, target: &str, source: &str) -> Result<()> {
        let target_idx = self.column_index(target)?;
        let source_idx = self.column_index(source)?;

        for row in &mut self.rows {
            if row[target_idx].is_none() {
                row[target_idx] = row[source_idx].clone();
            }
        }
        Ok(())
    }

    /// Distinct non-empty values of a column, in order of first appearance
    pub fn distinct_values(&self, name: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();

        for value in self.column(name)?.into_iter().flatten() {
            if !value.is_empty() && seen.insert(value) {
                values.push(value.to_string());
            }
        }
        Ok(values)
    }

    /// Rows whose `name` column equals `value`
    pub fn filter_eq(&self, name: &str, value: &str) -> Result<Table> {
        let idx = self.column_index(name)?;
        Ok(Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row[idx].as_deref() == Some(value))
                .cloned()
                .collect(),
        })
    }

    /// Join `right` onto this table where `self[left_on] == right[right_on]`
    ///
    /// Output columns are the left columns followed by the right columns.
    /// Names present on both sides get `suffixes.0` (left) and `suffixes.1`
    /// (right) appended, except a shared key column (`left_on == right_on`),
    /// which appears once. A left row matching several right rows is
    /// repeated once per match. Null or empty keys never match. With
    /// [`JoinKind::Outer`], right rows that matched nothing are appended
    /// after the left rows.
    pub fn merge(
        &self,
        right: &Table,
        left_on: &str,
        right_on: &str,
        how: JoinKind,
        suffixes: (&str, &str),
    ) -> Result<Table> {
        let left_key = self.column_index(left_on)?;
        let right_key = right.column_index(right_on)?;
        let shared_key = left_on == right_on;

        let right_cols: Vec<usize> = (0..right.columns.len())
            .filter(|&i| !(shared_key && i == right_key))
            .collect();

        let overlapping: HashSet<&str> = self
            .columns
            .iter()
            .filter(|c| !(shared_key && c.as_str() == left_on))
            .filter(|c| right_cols.iter().any(|&i| &right.columns[i] == *c))
            .map(String::as_str)
            .collect();

        let mut columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if overlapping.contains(c.as_str()) {
                    format!("{}{}", c, suffixes.0)
                } else {
                    c.clone()
                }
            })
            .collect();
        columns.extend(right_cols.iter().map(|&i| {
            let c = &right.columns[i];
            if overlapping.contains(c.as_str()) {
                format!("{}{}", c, suffixes.1)
            } else {
                c.clone()
            }
        }));

        let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            if let Some(key) = row[right_key].as_deref().filter(|k| !k.is_empty()) {
                index.entry(key).or_default().push(i);
            }
        }

        let mut result = Table::new(columns)?;
        let mut right_matched = vec![false; right.rows.len()];

        for left_row in &self.rows {
            let matches = left_row[left_key]
                .as_deref()
                .filter(|k| !k.is_empty())
                .and_then(|key| index.get(key))
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            if matches.is_empty() {
                let mut row = left_row.clone();
                row.extend(std::iter::repeat_n(None, right_cols.len()));
                result.rows.push(row);
                continue;
            }

            for &r in matches {
                right_matched[r] = true;
                let mut row = left_row.clone();
                row.extend(right_cols.iter().map(|&i| right.rows[r][i].clone()));
                result.rows.push(row);
            }
        }

        if how == JoinKind::Outer {
            for (r, right_row) in right.rows.iter().enumerate() {
                if right_matched[r] {
                    continue;
                }
                let mut row = vec![None; self.columns.len()];
                if shared_key {
                    row[left_key] = right_row[right_key].clone();
                }
                row.extend(right_cols.iter().map(|&i| right_row[i].clone()));
                result.rows.push(row);
            }
        }

        Ok(result)
    }
}
