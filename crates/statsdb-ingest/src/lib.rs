#![deny(clippy::unwrap_used, clippy::expect_used)]

//! statsdb ingestion library
//!
//! Loads a directory of lattice-simulation result files into a SQLite `stats`
//! table, one row per run.
//!
//! # Overview
//!
//! - **Filename codec** ([`filename`]): run parameters encoded in the name,
//!   `Z1=a,b,c;Z2=d,e,f;Z3=g,h,i;nn=<ints>;p=<decimal>;seed=<hex>;.stats.json`
//! - **Array codec** ([`array_codec`]): partition-size lists as BLOBs
//! - **Extraction** ([`extract`]): filename plus JSON document to one record
//! - **Scanner** ([`scanner`]): parallel, unordered extraction of a directory
//! - **Loader** ([`loader`]): transactional batch inserts, one writer
//! - **Orchestrator** ([`orchestrator`]): ties the two together and reports
//!
//! # Example
//!
//! ```no_run
//! use statsdb_ingest::{loader, orchestrator, IngestOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = loader::connect(Path::new("stats.db")).await?;
//!     let summary = orchestrator::run(Path::new("runs"), &pool, &IngestOptions::default()).await?;
//!     println!("{} rows from {} files", summary.rows_inserted, summary.total);
//!     Ok(())
//! }
//! ```

pub mod array_codec;
pub mod cleanup;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod filename;
pub mod loader;
pub mod orchestrator;
pub mod progress;
pub mod scanner;

// Re-export commonly used types
pub use config::IngestConfig;
pub use error::{ExtractionError, FailureKind, FormatError, IngestError, Result};
pub use extract::StatsRecord;
pub use loader::DuplicatePolicy;
pub use orchestrator::{IngestOptions, IngestionSummary};

use clap::Parser;
use config::{DEFAULT_BATCH_SIZE, DEFAULT_DATABASE_PATH, DEFAULT_PROGRESS_INTERVAL};
use std::path::PathBuf;

/// statsdb - load simulation result files into SQLite
#[derive(Parser, Debug)]
#[command(name = "statsdb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the .stats.json result files
    pub directory: PathBuf,

    /// SQLite database file (created if missing)
    #[arg(short, long, env = "STATSDB_DATABASE", default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,

    /// Parallel extraction workers (defaults to available parallelism)
    #[arg(short, long, env = "STATSDB_WORKERS")]
    pub workers: Option<usize>,

    /// Records per transaction
    #[arg(short, long, env = "STATSDB_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Files between progress log lines
    #[arg(long, env = "STATSDB_PROGRESS_INTERVAL", default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_interval: usize,

    /// What to do with runs that are already stored
    #[arg(
        long = "duplicates",
        env = "STATSDB_DUPLICATE_POLICY",
        value_enum,
        default_value_t = DuplicatePolicy::Append
    )]
    pub duplicate_policy: DuplicatePolicy,

    /// Move ingested files to <DIRECTORY>/trash/<date> afterwards
    #[arg(long)]
    pub cleanup: bool,

    /// Do not ask for confirmation before cleanup
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn into_config(self) -> IngestConfig {
        IngestConfig {
            directory: self.directory,
            database: self.database,
            workers: self.workers.unwrap_or_else(config::default_workers),
            batch_size: self.batch_size,
            progress_interval: self.progress_interval,
            duplicate_policy: self.duplicate_policy,
            cleanup: self.cleanup,
            assume_yes: self.yes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_flags_reach_config() {
        let cli = Cli::try_parse_from([
            "statsdb",
            "runs",
            "--database",
            "out.db",
            "-w",
            "3",
            "-b",
            "25",
            "--duplicates",
            "ignore",
            "--cleanup",
            "-y",
        ])
        .unwrap();

        let config = cli.into_config();
        assert_eq!(config.directory, PathBuf::from("runs"));
        assert_eq!(config.database, PathBuf::from("out.db"));
        assert_eq!(config.workers, 3);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Ignore);
        assert!(config.cleanup && config.assume_yes);
    }

    #[test]
    fn test_cli_requires_directory() {
        assert!(Cli::try_parse_from(["statsdb"]).is_err());
    }
}
