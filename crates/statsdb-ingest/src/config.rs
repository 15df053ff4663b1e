//! Ingestion configuration

use crate::error::{IngestError, Result};
use crate::loader::DuplicatePolicy;
use crate::orchestrator::IngestOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Defaults
// ============================================================================

/// Default SQLite database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "stats.db";

/// Default number of records committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default number of files between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

/// Worker count used when none is given: the host's available parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Everything a `statsdb` run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory holding the `.stats.json` files
    pub directory: PathBuf,
    /// SQLite database file, created if missing
    pub database: PathBuf,
    pub workers: usize,
    pub batch_size: usize,
    pub progress_interval: usize,
    pub duplicate_policy: DuplicatePolicy,
    /// Move ingested files to the trash directory afterwards
    pub cleanup: bool,
    /// Do not ask before cleaning up
    pub assume_yes: bool,
}

impl IngestConfig {
    /// Configuration for `directory` with every other value at its default.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            database: PathBuf::from(DEFAULT_DATABASE_PATH),
            workers: default_workers(),
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            duplicate_policy: DuplicatePolicy::default(),
            cleanup: false,
            assume_yes: false,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.directory.is_dir() {
            return Err(IngestError::config(format!(
                "input directory {} does not exist or is not a directory",
                self.directory.display()
            )));
        }

        if self.workers == 0 {
            return Err(IngestError::config("workers must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(IngestError::config("batch size must be greater than 0"));
        }

        if self.progress_interval == 0 {
            return Err(IngestError::config(
                "progress interval must be greater than 0",
            ));
        }

        let parent = self
            .database
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if !parent.is_dir() {
            return Err(IngestError::config(format!(
                "database directory {} does not exist",
                parent.display()
            )));
        }

        Ok(())
    }

    /// Orchestrator options for this configuration.
    pub fn ingest_options(&self, show_progress: bool) -> IngestOptions {
        IngestOptions {
            workers: self.workers,
            batch_size: self.batch_size,
            progress_interval: self.progress_interval,
            duplicate_policy: self.duplicate_policy,
            show_progress,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::new("runs");
        assert_eq!(config.database, PathBuf::from("stats.db"));
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.progress_interval, 1000);
        assert!(config.workers >= 1);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Append);
        assert!(!config.cleanup);
    }

    #[test]
    fn test_validate_accepts_existing_paths() {
        let dir = TempDir::new().unwrap();
        let mut config = IngestConfig::new(dir.path());
        config.database = dir.path().join("stats.db");
        assert!(config.validate().is_ok());

        // a bare file name lives in the working directory
        config.database = PathBuf::from("stats.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let base = IngestConfig::new(dir.path());

        let cases = [
            IngestConfig::new(dir.path().join("missing")),
            IngestConfig { workers: 0, ..base.clone() },
            IngestConfig { batch_size: 0, ..base.clone() },
            IngestConfig { progress_interval: 0, ..base.clone() },
            IngestConfig {
                database: dir.path().join("no/such/dir/stats.db"),
                ..base.clone()
            },
        ];

        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, IngestError::Config(_)), "{config:?}");
        }
    }

    #[test]
    fn test_ingest_options_carry_tuning() {
        let config = IngestConfig {
            workers: 3,
            batch_size: 7,
            duplicate_policy: DuplicatePolicy::Ignore,
            ..IngestConfig::new("runs")
        };
        let options = config.ingest_options(true);
        assert_eq!(options.workers, 3);
        assert_eq!(options.batch_size, 7);
        assert_eq!(options.duplicate_policy, DuplicatePolicy::Ignore);
        assert!(options.show_progress);
    }
}
