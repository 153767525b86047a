//! Configuration management

use std::path::PathBuf;

use labmerge_common::lab_file::{DEFAULT_EXTENSION, DEFAULT_HEADER_LINES};
use labmerge_common::MeasurementCatalog;

use crate::db::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::error::{IngestError, Result};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default directory for the master CSV.
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TOML measurement catalog; the built-in ICP/Hall catalog when unset
    pub catalog_path: Option<PathBuf>,

    pub output_dir: PathBuf,
    pub lab_file_extension: String,
    pub header_lines: usize,
    pub connect_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `.env`, environment variables and defaults
    ///
    /// - `LABMERGE_CATALOG`: path to a TOML measurement catalog
    /// - `LABMERGE_OUTPUT_DIR`: directory for the master CSV
    /// - `LABMERGE_LAB_FILE_EXTENSION`: extension of lab files
    /// - `LABMERGE_HEADER_LINES`: banner lines skipped in each lab file
    /// - `DATABASE_CONNECT_TIMEOUT`: connection timeout in seconds
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            catalog_path: std::env::var("LABMERGE_CATALOG").ok().map(PathBuf::from),
            output_dir: std::env::var("LABMERGE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            lab_file_extension: std::env::var("LABMERGE_LAB_FILE_EXTENSION")
                .unwrap_or_else(|_| DEFAULT_EXTENSION.to_string()),
            header_lines: std::env::var("LABMERGE_HEADER_LINES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HEADER_LINES),
            connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.lab_file_extension.trim_start_matches('.').is_empty() {
            return Err(IngestError::config("lab file extension cannot be empty"));
        }

        if self.connect_timeout_secs == 0 {
            return Err(IngestError::config(
                "database connect timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Build the measurement catalog this configuration points at
    pub fn catalog(&self) -> Result<MeasurementCatalog> {
        let catalog = match self.catalog_path {
            Some(ref path) => MeasurementCatalog::from_toml_file(path)?,
            None => MeasurementCatalog::builtin()?,
        };
        Ok(catalog)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            lab_file_extension: DEFAULT_EXTENSION.to_string(),
            header_lines: DEFAULT_HEADER_LINES,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lab_file_extension, "txt");
        assert_eq!(config.header_lines, 2);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.validate().is_ok());
        assert_eq!(config.catalog().unwrap().len(), 2);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("LABMERGE_OUTPUT_DIR", "/tmp/exports");
        std::env::set_var("LABMERGE_HEADER_LINES", "3");

        let config = Config::load().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.header_lines, 3);

        std::env::remove_var("LABMERGE_OUTPUT_DIR");
        std::env::remove_var("LABMERGE_HEADER_LINES");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            lab_file_extension: ".".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            connect_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_catalog_file() {
        let config = Config {
            catalog_path: Some(PathBuf::from("/no/such/catalog.toml")),
            ..Config::default()
        };
        assert!(matches!(config.catalog(), Err(IngestError::Lab(_))));
    }
}
