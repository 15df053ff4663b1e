//! Error types for statsdb ingestion
//!
//! Per-file problems ([`FormatError`], [`ExtractionError`]) are recovered at
//! the scanner boundary and only counted. Per-batch problems surface as
//! [`IngestError`] and stop the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// A result filename does not follow the run-parameter grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("'{filename}' does not end in '{suffix}'")]
    Suffix {
        filename: String,
        suffix: &'static str,
    },

    #[error("'{filename}' does not match the run filename grammar")]
    Grammar { filename: String },

    #[error("'{filename}': field {field} holds '{value}', which is not an integer")]
    Integer {
        filename: String,
        field: &'static str,
        value: String,
    },

    #[error("'{filename}': p='{value}' is not a decimal number")]
    Probability { filename: String, value: String },
}

/// A stored partition-size blob could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrayCodecError {
    #[error("array blob is {len} bytes, shorter than its {needed}-byte header")]
    Truncated { len: usize, needed: usize },

    #[error("array blob does not start with the expected magic bytes")]
    BadMagic,

    #[error("unsupported array blob version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown array element type tag {0}")]
    UnknownElementType(u8),

    #[error("array shape {shape:?} needs {expected} payload bytes, blob carries {actual}")]
    ShapeMismatch {
        shape: Vec<u64>,
        expected: usize,
        actual: usize,
    },

    #[error("shape {shape:?} does not hold {len} elements")]
    ShapeLength { shape: Vec<u64>, len: usize },
}

/// Coarse classification of an extraction failure, used for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    Format,
    NotFound,
    Io,
    Parse,
    Document,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Format => "format",
            FailureKind::NotFound => "not_found",
            FailureKind::Io => "io",
            FailureKind::Parse => "parse",
            FailureKind::Document => "document",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One result file could not be turned into a record.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("result file {} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} has an unexpected layout: {reason}", path.display())]
    Document { path: PathBuf, reason: String },

    #[error("extraction worker for {} stopped unexpectedly: {reason}", path.display())]
    Worker { path: PathBuf, reason: String },
}

impl ExtractionError {
    pub(crate) fn io(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub(crate) fn document(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::Document {
            path,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractionError::Format(_) => FailureKind::Format,
            ExtractionError::NotFound { .. } => FailureKind::NotFound,
            ExtractionError::Io { .. } | ExtractionError::Worker { .. } => FailureKind::Io,
            ExtractionError::Parse { .. } => FailureKind::Parse,
            ExtractionError::Document { .. } => FailureKind::Document,
        }
    }
}

/// Run-level errors. Any of these ends the ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Bad directory, database path or tuning values; raised before any work
    #[error("Configuration error: {0}")]
    Config(String),

    /// A batch could not be inserted; none of its rows were committed
    #[error("Batch {batch_index} was rolled back: {source}")]
    Schema {
        batch_index: usize,
        #[source]
        source: sqlx::Error,
    },

    /// Duplicate run under `DuplicatePolicy::Reject`; the batch was rolled back
    #[error("Batch {batch_index} was rolled back: run with seed '{seed}' is already stored")]
    DuplicateRun { batch_index: usize, seed: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored partition sizes are corrupt: {0}")]
    Decode(#[from] ArrayCodecError),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Index of the batch that failed, if this is a batch failure.
    pub fn failed_batch(&self) -> Option<usize> {
        match self {
            IngestError::Schema { batch_index, .. }
            | IngestError::DuplicateRun { batch_index, .. } => Some(*batch_index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = ExtractionError::io(
            PathBuf::from("gone.stats.json"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(err.kind(), FailureKind::NotFound);

        let err = ExtractionError::io(
            PathBuf::from("locked.stats.json"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.kind(), FailureKind::Io);
    }

    #[test]
    fn test_failed_batch_index() {
        let err = IngestError::DuplicateRun {
            batch_index: 3,
            seed: "cafe".into(),
        };
        assert_eq!(err.failed_batch(), Some(3));
        assert_eq!(IngestError::config("nope").failed_batch(), None);
    }
}
