//! Parallel directory scanner
//!
//! Lists the `.stats.json` files of one directory (non-recursive) and runs
//! [`extract`] over them on tokio's blocking pool, at most `workers` at a
//! time. Outcomes are yielded as soon as each extraction finishes, so their
//! order has nothing to do with the directory listing.
//!
//! A file that cannot be extracted becomes a [`ScanOutcome::Failed`] value;
//! the stream itself never errors and always covers every candidate.

use crate::error::{ExtractionError, IngestError, Result};
use crate::extract::{extract, StatsRecord};
use crate::filename::STATS_SUFFIX;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Result of extracting one candidate file.
#[derive(Debug)]
pub enum ScanOutcome {
    Extracted(StatsRecord),
    Failed {
        filename: String,
        error: ExtractionError,
    },
}

impl ScanOutcome {
    pub fn is_extracted(&self) -> bool {
        matches!(self, ScanOutcome::Extracted(_))
    }
}

/// A running scan: how many files were found, and their outcomes.
pub struct Scan {
    pub total: usize,
    pub outcomes: BoxStream<'static, ScanOutcome>,
}

/// Names of the candidate files directly inside `directory`.
///
/// Only regular files (or links to them) whose name ends in
/// [`STATS_SUFFIX`] are returned. Names that are not valid UTF-8 are passed
/// on lossily and fail filename decoding later.
pub fn list_candidates(directory: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(directory).map_err(|e| {
        IngestError::config(format!(
            "cannot read input directory {}: {e}",
            directory.display()
        ))
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(STATS_SUFFIX) {
            continue;
        }
        if !entry.path().is_file() {
            debug!(name = %name, "Skipping non-file entry");
            continue;
        }
        names.push(name);
    }

    Ok(names)
}

/// Start scanning `directory` with `workers` concurrent extractions.
///
/// The directory is listed once, up front; extraction happens lazily as the
/// returned stream is polled. Calling this again re-lists the directory and
/// re-extracts everything. `workers` below 1 is treated as 1.
pub fn scan(directory: &Path, workers: usize) -> Result<Scan> {
    let names = list_candidates(directory)?;
    let total = names.len();
    let directory: Arc<PathBuf> = Arc::new(directory.to_path_buf());

    debug!(
        directory = %directory.display(),
        files = total,
        workers,
        "Starting scan"
    );

    let outcomes = stream::iter(names)
        .map(move |name| extract_one(Arc::clone(&directory), name))
        .buffer_unordered(workers.max(1))
        .boxed();

    Ok(Scan { total, outcomes })
}

async fn extract_one(directory: Arc<PathBuf>, filename: String) -> ScanOutcome {
    let task_name = filename.clone();
    let joined = tokio::task::spawn_blocking(move || extract(&task_name, &directory)).await;

    match joined {
        Ok(Ok(record)) => ScanOutcome::Extracted(record),
        Ok(Err(error)) => ScanOutcome::Failed { filename, error },
        Err(join_error) => ScanOutcome::Failed {
            error: ExtractionError::Worker {
                path: PathBuf::from(&filename),
                reason: join_error.to_string(),
            },
            filename,
        },
    }
}
