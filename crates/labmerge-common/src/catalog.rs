//! Measurement catalog
//!
//! Every kind of lab measurement the pipeline understands is described by a
//! [`MeasurementKind`]: the identifier found in the lab file's `Measurement`
//! field, the table its rows go to, and for each column its SQL definition
//! plus the lab-file field that feeds it.
//!
//! The catalog is built once at startup, either from [`MeasurementCatalog::builtin`]
//! or from a TOML file, and is read-only afterwards.
//!
//! # TOML format
//!
//! ```toml
//! [[kind]]
//! identifier = "ICP"
//! table = "icp_lab"
//! unique_id_column = "material_uid"
//! columns = [
//!     { name = "material_uid", definition = "character varying(30) NOT NULL", field = "material_uid" },
//!     { name = "measurement", definition = "character varying(10)", field = "Measurement" },
//! ]
//! ```

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LabError, Result};

/// One column of a measurement table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name in the database
    pub name: String,

    /// SQL type and constraints, e.g. `character varying(30) NOT NULL`
    pub definition: String,

    /// Lab-file field whose value is stored in this column
    pub field: String,
}

impl ColumnSpec {
    pub fn new(name: &str, definition: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            definition: definition.to_string(),
            field: field.to_string(),
        }
    }
}

/// Schema descriptor for one kind of lab measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementKind {
    /// Value of the lab file's `Measurement` field (case-sensitive)
    pub identifier: String,

    /// Table holding this kind's records
    pub table: String,

    /// Column used to detect already-ingested records
    pub unique_id_column: String,

    pub columns: Vec<ColumnSpec>,
}

impl MeasurementKind {
    /// Column list as used in `CREATE TABLE`, e.g. `material_uid character varying(30), ...`
    pub fn column_definitions(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.definition))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Lab-file field name to column name
    pub fn decode_mapping(&self) -> IndexMap<&str, &str> {
        self.columns
            .iter()
            .map(|c| (c.field.as_str(), c.name.as_str()))
            .collect()
    }

    /// Column a lab-file field maps to
    pub fn column_for_field(&self, field: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.name.as_str())
    }

    /// Lab-file field that feeds the unique id column
    pub fn unique_id_field(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == self.unique_id_column)
            .map(|c| c.field.as_str())
    }

    fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(LabError::catalog("measurement identifier cannot be empty"));
        }

        if self.table.trim().is_empty() {
            return Err(LabError::catalog(format!(
                "measurement '{}' has no table name",
                self.identifier
            )));
        }

        if self.columns.is_empty() {
            return Err(LabError::catalog(format!(
                "measurement '{}' declares no columns",
                self.identifier
            )));
        }

        let mut names = HashSet::new();
        let mut fields = HashSet::new();
        for column in &self.columns {
            if !names.insert(column.name.as_str()) {
                return Err(LabError::catalog(format!(
                    "measurement '{}' declares column '{}' twice",
                    self.identifier, column.name
                )));
            }
            if !fields.insert(column.field.as_str()) {
                return Err(LabError::catalog(format!(
                    "measurement '{}' maps field '{}' to more than one column",
                    self.identifier, column.field
                )));
            }
        }

        if !names.contains(self.unique_id_column.as_str()) {
            return Err(LabError::catalog(format!(
                "measurement '{}': unique id column '{}' is not one of its columns",
                self.identifier, self.unique_id_column
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(rename = "kind", default)]
    kinds: Vec<MeasurementKind>,
}

/// Registry of the measurement kinds known to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementCatalog {
    kinds: Vec<MeasurementKind>,
}

impl MeasurementCatalog {
    /// Build a catalog, validating every kind
    pub fn new(kinds: Vec<MeasurementKind>) -> Result<Self> {
        let mut identifiers = HashSet::new();
        let mut tables = HashSet::new();

        for kind in &kinds {
            kind.validate()?;

            if !identifiers.insert(kind.identifier.as_str()) {
                return Err(LabError::catalog(format!(
                    "measurement identifier '{}' is declared twice",
                    kind.identifier
                )));
            }
            if !tables.insert(kind.table.as_str()) {
                return Err(LabError::catalog(format!(
                    "table '{}' is used by more than one measurement",
                    kind.table
                )));
            }
        }

        Ok(Self { kinds })
    }

    /// ICP and Hall measurements
    pub fn builtin() -> Result<Self> {
        Self::new(vec![icp_kind(), hall_kind()])
    }

    pub fn from_toml_str(text: &str) -> std::result::Result<Self, CatalogSourceError> {
        let file: CatalogFile = toml::from_str(text)?;
        Ok(Self::new(file.kinds)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| LabError::io(path, e))?;

        Self::from_toml_str(&text).map_err(|e| match e {
            CatalogSourceError::Toml(source) => LabError::CatalogParse {
                path: path.to_path_buf(),
                source,
            },
            CatalogSourceError::Invalid(err) => err,
        })
    }

    /// First kind whose identifier equals `identifier` exactly
    pub fn find(&self, identifier: &str) -> Option<&MeasurementKind> {
        self.kinds.iter().find(|k| k.identifier == identifier)
    }

    pub fn kinds(&self) -> &[MeasurementKind] {
        &self.kinds
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MeasurementKind> {
        self.kinds.iter()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl<'a> IntoIterator for &'a MeasurementCatalog {
    type Item = &'a MeasurementKind;
    type IntoIter = std::slice::Iter<'a, MeasurementKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.kinds.iter()
    }
}

/// Failure to build a catalog from TOML text
#[derive(Debug, thiserror::Error)]
pub enum CatalogSourceError {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] LabError),
}

fn icp_kind() -> MeasurementKind {
    MeasurementKind {
        identifier: "ICP".to_string(),
        table: "icp_lab".to_string(),
        unique_id_column: "material_uid".to_string(),
        columns: vec![
            ColumnSpec::new("material_uid", "character varying(30) NOT NULL", "material_uid"),
            ColumnSpec::new("measurement", "character varying(10)", "Measurement"),
            ColumnSpec::new("pb_concentration", "real", "Pb Concentration"),
            ColumnSpec::new("sn_concentration", "real", "Sn Concentration"),
            ColumnSpec::new("o_concentration", "real", "O Concentration"),
            ColumnSpec::new("gas_flow_rate_l_min", "real", "Gas Flow Rate"),
            ColumnSpec::new("gas_type", "character varying(10)", "Gas Type"),
            ColumnSpec::new("plasma_temperature_celsius", "real", "Plasma Temperature"),
            ColumnSpec::new("detector_temperature_celsius", "real", "Detector Temperature"),
            ColumnSpec::new("field_strength_t", "real", "Field Strength"),
            ColumnSpec::new("plasma_observation", "character varying(40)", "Plasma Observation"),
            ColumnSpec::new("radio_requency_mhz", "real", "Radio Frequency"),
        ],
    }
}

fn hall_kind() -> MeasurementKind {
    MeasurementKind {
        identifier: "Hall".to_string(),
        table: "hall_lab".to_string(),
        unique_id_column: "material_uid".to_string(),
        columns: vec![
            ColumnSpec::new("material_uid", "character varying(30) NOT NULL", "material_uid"),
            ColumnSpec::new("measurement", "character varying(10)", "Measurement"),
            ColumnSpec::new("probe_resistance_ohm", "real", "Probe Resistance"),
            ColumnSpec::new("gas_flow_rate_l_min", "real", "Gas Flow Rate"),
            ColumnSpec::new("gas_type", "character varying(10)", "Gas Type"),
            ColumnSpec::new("probe_material", "character varying(30)", "Probe Material"),
            ColumnSpec::new("current_ma", "real", "Current"),
            ColumnSpec::new("field_strength_t", "real", "Field Strength"),
            ColumnSpec::new("sample_position", "real", "Sample Position"),
            ColumnSpec::new("magnet_reversal", "bool", "Magnet Reversal"),
        ],
    }
}
