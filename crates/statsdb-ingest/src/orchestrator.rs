//! Ingestion orchestrator
//!
//! Drives the scanner and feeds the loader: extracted records go to the
//! [`BatchLoader`], failures are logged and counted. The first batch that
//! cannot be committed halts the run and is reported in the summary.
//! At most `batch_size` records wait in memory, plus whatever the scanner has
//! in flight.

use crate::error::{FailureKind, IngestError, Result};
use crate::loader::{self, BatchLoader, DuplicatePolicy};
use crate::progress;
use crate::scanner::{self, ScanOutcome};
use futures::StreamExt;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Tuning knobs for one run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub workers: usize,
    pub batch_size: usize,
    /// Log progress every this many files
    pub progress_interval: usize,
    pub duplicate_policy: DuplicatePolicy,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            workers: crate::config::default_workers(),
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            progress_interval: crate::config::DEFAULT_PROGRESS_INTERVAL,
            duplicate_policy: DuplicatePolicy::default(),
            show_progress: false,
        }
    }
}

/// A batch that was rolled back.
#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub error: IngestError,
}

/// Outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestionSummary {
    /// Candidate files found in the directory
    pub total: usize,
    /// Records in committed batches
    pub processed: usize,
    /// Files that failed extraction
    pub skipped: usize,
    pub rows_inserted: usize,
    pub duplicates: usize,
    pub batches_committed: usize,
    pub skipped_by_kind: BTreeMap<FailureKind, usize>,
    pub failed_batches: Vec<BatchFailure>,
    /// Files whose rows are in the store
    pub committed_sources: Vec<PathBuf>,
    pub duration: Duration,
}

impl IngestionSummary {
    pub fn is_success(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// Ingest every result file in `directory` into `pool`.
///
/// Creates the schema first, so even an empty directory leaves a usable
/// store. Returns `Err` only for problems that prevent the run from starting
/// or a database failure outside a batch; batch failures are reported in
/// [`IngestionSummary::failed_batches`].
pub async fn run(
    directory: &Path,
    pool: &SqlitePool,
    options: &IngestOptions,
) -> Result<IngestionSummary> {
    let start = Instant::now();

    loader::ensure_schema(pool).await?;
    let scan = scanner::scan(directory, options.workers)?;

    info!(
        directory = %directory.display(),
        files = scan.total,
        workers = options.workers,
        batch_size = options.batch_size,
        policy = ?options.duplicate_policy,
        "Starting ingestion"
    );

    let mut summary = IngestionSummary {
        total: scan.total,
        ..IngestionSummary::default()
    };
    let interval = options.progress_interval.max(1);
    let pb = progress::create_scan_progress(scan.total as u64, options.show_progress);

    let mut loader = BatchLoader::new(pool, options.batch_size, options.duplicate_policy);
    let mut outcomes = scan.outcomes;
    let mut seen = 0usize;
    let mut queued = 0usize;

    while let Some(outcome) = outcomes.next().await {
        seen += 1;
        pb.inc(1);

        match outcome {
            ScanOutcome::Extracted(record) => {
                queued += 1;
                if let Err(e) = loader.push(record).await {
                    record_failure(&mut summary, e)?;
                    break;
                }
            },
            ScanOutcome::Failed { filename, error } => {
                warn!(file = %filename, kind = %error.kind(), error = %error, "Skipping file");
                summary.skipped += 1;
                *summary.skipped_by_kind.entry(error.kind()).or_insert(0) += 1;
            },
        }

        pb.set_message(progress::counts_message(queued, summary.skipped));
        if seen % interval == 0 {
            info!(
                seen,
                total = summary.total,
                skipped = summary.skipped,
                committed = loader.report().records,
                "Ingestion progress"
            );
        }
    }

    if summary.is_success() {
        if let Err(e) = loader.flush().await {
            record_failure(&mut summary, e)?;
        }
    }
    pb.finish_and_clear();

    let report = loader.into_report();
    summary.processed = report.records;
    summary.rows_inserted = report.rows_inserted;
    summary.duplicates = report.duplicates;
    summary.batches_committed = report.batches_committed;
    summary.committed_sources = report.committed_sources;
    summary.duration = start.elapsed();

    info!(
        processed = summary.processed,
        skipped = summary.skipped,
        rows = summary.rows_inserted,
        duplicates = summary.duplicates,
        batches = summary.batches_committed,
        failed_batches = summary.failed_batches.len(),
        elapsed_ms = summary.duration.as_millis() as u64,
        "Ingestion finished"
    );

    Ok(summary)
}

/// Keep a batch failure in the summary; anything else is returned.
fn record_failure(summary: &mut IngestionSummary, error: IngestError) -> Result<()> {
    match error.failed_batch() {
        Some(index) => {
            warn!(batch = index, error = %error, "Batch rolled back, halting ingestion");
            summary.failed_batches.push(BatchFailure { index, error });
            Ok(())
        },
        None => Err(error),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOC: &str = r#"{"counts":{"links":10,"plaqs":20},"percolation":{"link":{"n_parts":2,"wrap":false,"part_nelem":[3,7]}}}"#;

    fn name(seed: u32) -> String {
        format!("Z1=1,0,0;Z2=0,1,0;Z3=0,0,1;nn=;p=0.500000;seed={seed:x};.stats.json")
    }

    fn options(batch_size: usize) -> IngestOptions {
        IngestOptions {
            workers: 2,
            batch_size,
            progress_interval: 2,
            ..IngestOptions::default()
        }
    }

    async fn setup(good: u32, bad: &[(&str, &str)]) -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("runs");
        std::fs::create_dir(&input).unwrap();
        for seed in 0..good {
            std::fs::write(input.join(name(seed)), DOC).unwrap();
        }
        for (file, body) in bad {
            std::fs::write(input.join(file), body).unwrap();
        }
        let pool = loader::connect(&dir.path().join("stats.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_counts_good_and_bad_files() {
        let (dir, pool) = setup(
            5,
            &[
                ("garbage.stats.json", DOC),
                (name(100).as_str(), "[1, 2, 3]"),
                (name(101).as_str(), "{"),
                ("notes.txt", "ignored"),
            ],
        )
        .await;

        let summary = run(&dir.path().join("runs"), &pool, &options(2)).await.unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.total, 8);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.batches_committed, 3);
        assert_eq!(summary.skipped_by_kind.get(&FailureKind::Format), Some(&1));
        assert_eq!(summary.skipped_by_kind.get(&FailureKind::Document), Some(&1));
        assert_eq!(summary.skipped_by_kind.get(&FailureKind::Parse), Some(&1));
        assert_eq!(summary.committed_sources.len(), 5);
        assert_eq!(loader::count_rows(&pool).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_empty_directory_creates_schema_only() {
        let (dir, pool) = setup(0, &[]).await;

        let summary = run(&dir.path().join("runs"), &pool, &options(10)).await.unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.batches_committed, 0);
        assert_eq!(loader::count_rows(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reject_policy_halts_and_reports_batch() {
        let (dir, pool) = setup(3, &[]).await;
        let input = dir.path().join("runs");
        run(&input, &pool, &options(10)).await.unwrap();

        let rejecting = IngestOptions {
            duplicate_policy: DuplicatePolicy::Reject,
            ..options(10)
        };
        let summary = run(&input, &pool, &rejecting).await.unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.failed_batches.len(), 1);
        assert_eq!(summary.failed_batches[0].index, 0);
        assert_eq!(summary.processed, 0);
        assert!(summary.committed_sources.is_empty());
        assert_eq!(loader::count_rows(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_directory_fails_to_start() {
        let (dir, pool) = setup(0, &[]).await;
        let err = run(&dir.path().join("absent"), &pool, &options(1)).await.unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }
}
