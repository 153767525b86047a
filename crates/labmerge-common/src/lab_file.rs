//! Lab result file reader
//!
//! Lab instruments export one plain-text file per measurement. The first two
//! lines are instrument banner text and carry no data; every following line
//! holds a tab-delimited `key<TAB>...<TAB>value` pair.
//!
//! # Format
//! ```text
//! Lab Results Export
//! ------------------
//! Measurement	ICP
//! material_uid	M1
//! Pb Concentration	wt%	0.42
//! ```
//!
//! The first field of a line is the key and the last field is the value,
//! both trimmed. Units or notes in between are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{LabError, Result};

/// Field naming the measurement kind inside a lab file
pub const MEASUREMENT_FIELD: &str = "Measurement";

/// Default extension of lab result files
pub const DEFAULT_EXTENSION: &str = "txt";

/// Number of banner lines at the top of every lab file
pub const DEFAULT_HEADER_LINES: usize = 2;

/// One parsed lab file: ordered field name to value mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabRecord {
    source: PathBuf,
    fields: IndexMap<String, String>,
}

impl LabRecord {
    /// Build a record from already-split fields
    pub fn new(source: impl Into<PathBuf>, fields: IndexMap<String, String>) -> Self {
        Self {
            source: source.into(),
            fields,
        }
    }

    /// File this record was read from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Value of the `Measurement` field, if present
    pub fn measurement(&self) -> Option<&str> {
        self.get(MEASUREMENT_FIELD)
    }

    /// Fields in file order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse the text of a single lab file
///
/// The first `header_lines` lines are discarded unconditionally. A repeated
/// key keeps its first position and takes the last value. A line with no tab
/// becomes a pair whose key and value are both the whole line, so a blank
/// line yields an empty key.
pub fn parse_lab_text(source: impl Into<PathBuf>, text: &str, header_lines: usize) -> LabRecord {
    let mut fields = IndexMap::new();

    for line in text.lines().skip(header_lines) {
        let mut parts = line.split('\t');
        let key = parts.next().unwrap_or_default().trim();
        let value = parts.next_back().map(str::trim).unwrap_or(key);

        fields.insert(key.to_string(), value.to_string());
    }

    LabRecord::new(source, fields)
}

/// Reads every lab file in a directory
#[derive(Debug, Clone)]
pub struct LabFileReader {
    directory: PathBuf,
    extension: String,
    header_lines: usize,
}

impl LabFileReader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            header_lines: DEFAULT_HEADER_LINES,
        }
    }

    /// Only files with this extension (without the dot) are read
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_header_lines(mut self, header_lines: usize) -> Self {
        self.header_lines = header_lines;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// List the lab files in the directory, sorted by file name
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let entries =
            fs::read_dir(&self.directory).map_err(|e| LabError::io(&self.directory, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LabError::io(&self.directory, e))?;
            let path = entry.path();

            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == self.extension);

            if matches_extension && path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Parse every lab file in the directory
    pub fn read_all(&self) -> Result<Vec<LabRecord>> {
        let files = self.list_files()?;
        debug!(
            directory = %self.directory.display(),
            count = files.len(),
            "Reading lab files"
        );

        files
            .into_iter()
            .map(|path| {
                let text = fs::read_to_string(&path).map_err(|e| LabError::io(&path, e))?;
                Ok(parse_lab_text(path, &text, self.header_lines))
            })
            .collect()
    }
}
