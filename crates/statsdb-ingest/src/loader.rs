//! Batch loader for the `stats` table
//!
//! Records are buffered and written `batch_size` at a time, each batch in
//! its own transaction. A batch either commits completely or not at all:
//! the first failing insert drops the transaction, which rolls it back, and
//! the error names the batch index.
//!
//! Only the task driving [`BatchLoader`] touches the pool. The pool holds a
//! single connection, so there is exactly one writer.

use crate::array_codec::{self, NumericArray};
use crate::document::Dimension;
use crate::error::{IngestError, Result};
use crate::extract::StatsRecord;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteJournalMode,
    SqlitePool, SqlitePoolOptions,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const STATS_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS stats (
        Z1 TEXT,
        Z2 TEXT,
        Z3 TEXT,
        nn TEXT,
        p REAL,
        seed TEXT,
        links INTEGER,
        plaqs INTEGER,
        points INTEGER,
        vols INTEGER,
        n_link_parts INTEGER,
        links_wrap BOOLEAN,
        link_part_nelem BLOB,
        n_plaq_parts INTEGER,
        plaqs_wrap BOOLEAN,
        plaq_part_nelem BLOB,
        n_vol_parts INTEGER,
        vols_wrap BOOLEAN,
        vol_part_nelem BLOB
    )
"#;

// Not unique: the same run may legitimately be stored more than once.
const SEED_INDEX_SQL: &str = "CREATE INDEX IF NOT EXISTS idx_stats_seed ON stats(seed)";

const INSERT_SQL: &str = r#"
    INSERT INTO stats (
        Z1, Z2, Z3, nn, p, seed,
        links, plaqs, points, vols,
        n_link_parts, links_wrap, link_part_nelem,
        n_plaq_parts, plaqs_wrap, plaq_part_nelem,
        n_vol_parts, vols_wrap, vol_part_nelem
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
"#;

const EXISTS_SQL: &str = r#"
    SELECT EXISTS (
        SELECT 1 FROM stats
        WHERE Z1 = ?1 AND Z2 = ?2 AND Z3 = ?3 AND nn = ?4 AND p = ?5 AND seed = ?6
    )
"#;

/// What to do with a record whose run parameters are already stored.
///
/// "Already stored" means an existing row with equal `Z1`, `Z2`, `Z3`, `nn`,
/// `p` and `seed`. No policy ever updates or deletes a row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Insert anyway; re-ingesting a directory doubles its rows
    #[default]
    Append,
    /// Leave the stored row alone and count the record as a duplicate
    #[value(alias = "skip")]
    Ignore,
    /// Fail the whole batch
    Reject,
}

/// Open (creating if needed) the SQLite store at `path`.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| IngestError::config(format!("cannot open store {}: {e}", path.display())))
}

/// Create the `stats` table and its lookup index if they are missing.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(STATS_TABLE_SQL).execute(pool).await?;
    sqlx::query(SEED_INDEX_SQL).execute(pool).await?;
    Ok(())
}

/// Totals for everything a loader committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Records in committed batches, duplicates included
    pub records: usize,
    pub rows_inserted: usize,
    /// Records left out under [`DuplicatePolicy::Ignore`]
    pub duplicates: usize,
    pub batches_committed: usize,
    /// Source files of every record in a committed batch
    pub committed_sources: Vec<PathBuf>,
}

/// Buffers records and commits them in fixed-size transactions.
pub struct BatchLoader<'a> {
    pool: &'a SqlitePool,
    batch_size: usize,
    policy: DuplicatePolicy,
    buffer: Vec<StatsRecord>,
    next_batch: usize,
    report: LoadReport,
}

impl<'a> BatchLoader<'a> {
    /// `batch_size` below 1 is treated as 1.
    pub fn new(pool: &'a SqlitePool, batch_size: usize, policy: DuplicatePolicy) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pool,
            batch_size,
            policy,
            buffer: Vec::with_capacity(batch_size),
            next_batch: 0,
            report: LoadReport::default(),
        }
    }

    /// Queue one record, committing the buffer once it is full.
    pub async fn push(&mut self, record: StatsRecord) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Commit whatever is buffered and return the totals.
    pub async fn finish(mut self) -> Result<LoadReport> {
        self.flush().await?;
        Ok(self.report)
    }

    /// Totals so far, without flushing.
    pub fn into_report(self) -> LoadReport {
        self.report
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Commit the buffered records as one batch. A no-op when empty.
    ///
    /// The buffer is consumed whether or not the commit succeeds.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch_index = self.next_batch;
        self.next_batch += 1;
        let batch = std::mem::take(&mut self.buffer);

        let schema_error = |source: sqlx::Error| IngestError::Schema {
            batch_index,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(schema_error)?;

        let mut inserted = 0;
        let mut duplicates = 0;
        for record in &batch {
            let stored = match self.policy {
                DuplicatePolicy::Append => false,
                DuplicatePolicy::Ignore | DuplicatePolicy::Reject => {
                    run_exists(&mut tx, record).await.map_err(schema_error)?
                },
            };

            if stored {
                if self.policy == DuplicatePolicy::Reject {
                    return Err(IngestError::DuplicateRun {
                        batch_index,
                        seed: record.seed.clone(),
                    });
                }
                duplicates += 1;
                continue;
            }

            bind_record(sqlx::query(INSERT_SQL), record)
                .execute(&mut *tx)
                .await
                .map_err(schema_error)?;
            inserted += 1;
        }

        tx.commit().await.map_err(schema_error)?;

        debug!(
            batch = batch_index,
            records = batch.len(),
            inserted,
            duplicates,
            "Committed batch"
        );

        self.report.records += batch.len();
        self.report.rows_inserted += inserted;
        self.report.duplicates += duplicates;
        self.report.batches_committed += 1;
        self.report
            .committed_sources
            .extend(batch.into_iter().map(|r| r.source));

        Ok(())
    }
}

/// Write every record of `records` to the store in batches of `batch_size`.
///
/// Stops at the first failed batch; batches committed before it stay.
pub async fn load<S>(
    pool: &SqlitePool,
    mut records: S,
    batch_size: usize,
    policy: DuplicatePolicy,
) -> Result<LoadReport>
where
    S: Stream<Item = StatsRecord> + Unpin,
{
    let mut loader = BatchLoader::new(pool, batch_size, policy);
    while let Some(record) = records.next().await {
        loader.push(record).await?;
    }
    let report = loader.finish().await?;

    info!(
        rows = report.rows_inserted,
        batches = report.batches_committed,
        "Load complete"
    );
    Ok(report)
}

async fn run_exists(
    conn: &mut SqliteConnection,
    record: &StatsRecord,
) -> std::result::Result<bool, sqlx::Error> {
    let exists: i64 = sqlx::query_scalar(EXISTS_SQL)
        .bind(record.z1.as_str())
        .bind(record.z2.as_str())
        .bind(record.z3.as_str())
        .bind(record.nn.as_str())
        .bind(record.p)
        .bind(record.seed.as_str())
        .fetch_one(conn)
        .await?;
    Ok(exists != 0)
}

fn bind_record<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    record: &'q StatsRecord,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = query
        .bind(record.z1.as_str())
        .bind(record.z2.as_str())
        .bind(record.z3.as_str())
        .bind(record.nn.as_str())
        .bind(record.p)
        .bind(record.seed.as_str())
        .bind(record.counts.links)
        .bind(record.counts.plaqs)
        .bind(record.counts.points)
        .bind(record.counts.vols);

    for dimension in Dimension::ALL {
        let columns = record.partition(dimension);
        query = query
            .bind(columns.n_parts)
            .bind(columns.wrap)
            .bind(columns.part_nelem.as_deref());
    }

    query
}

// ============================================================================
// Read-back helpers
// ============================================================================

/// Scalar columns of a stored row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredRun {
    pub z1: String,
    pub z2: String,
    pub z3: String,
    pub nn: String,
    pub p: f64,
    pub seed: String,
    pub links: Option<i64>,
    pub plaqs: Option<i64>,
    pub points: Option<i64>,
    pub vols: Option<i64>,
    pub n_link_parts: Option<i64>,
    pub links_wrap: Option<bool>,
    pub n_plaq_parts: Option<i64>,
    pub plaqs_wrap: Option<bool>,
    pub n_vol_parts: Option<i64>,
    pub vols_wrap: Option<bool>,
}

pub async fn count_rows(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stats")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Stored rows for `seed`, in insertion order.
pub async fn fetch_runs(pool: &SqlitePool, seed: &str) -> Result<Vec<StoredRun>> {
    let rows = sqlx::query_as::<_, StoredRun>(
        r#"
        SELECT Z1 AS z1, Z2 AS z2, Z3 AS z3, nn, p, seed,
               links, plaqs, points, vols,
               n_link_parts, links_wrap, n_plaq_parts, plaqs_wrap, n_vol_parts, vols_wrap
        FROM stats WHERE seed = ?1 ORDER BY rowid
        "#,
    )
    .bind(seed)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Decoded partition sizes of `dimension` for every row with `seed`.
///
/// `None` entries are rows whose document reported no size list.
pub async fn fetch_partition_sizes(
    pool: &SqlitePool,
    seed: &str,
    dimension: Dimension,
) -> Result<Vec<Option<NumericArray>>> {
    // the column name comes from a closed enum, never from input
    let sql = format!(
        "SELECT {} FROM stats WHERE seed = ?1 ORDER BY rowid",
        dimension.sizes_column()
    );
    let blobs: Vec<Option<Vec<u8>>> = sqlx::query_scalar(&sql).bind(seed).fetch_all(pool).await?;

    blobs
        .iter()
        .map(|blob| array_codec::decode_optional(blob.as_deref()).map_err(IngestError::from))
        .collect()
}
