//! Record extraction: one result file in, one storage-ready row out

use crate::array_codec::{self, NumericArray};
use crate::document::{Counts, Dimension, PartitionStats, StatsDocument};
use crate::error::ExtractionError;
use crate::filename::{self, RunMetadata};
use std::path::{Path, PathBuf};

/// Percolation columns for one dimension, ready to bind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionColumns {
    pub n_parts: Option<i64>,
    pub wrap: Option<bool>,
    /// Blob from [`array_codec::encode`]; `None` when the document had no list
    pub part_nelem: Option<Vec<u8>>,
}

impl PartitionColumns {
    fn from_stats(stats: PartitionStats) -> Self {
        let sizes = stats.part_nelem.map(NumericArray::from_ints);
        Self {
            n_parts: stats.n_parts,
            wrap: stats.wrap,
            part_nelem: array_codec::encode_optional(sizes.as_ref()),
        }
    }
}

/// One row of the `stats` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRecord {
    /// Path of the file this row came from; not persisted
    pub source: PathBuf,
    pub z1: String,
    pub z2: String,
    pub z3: String,
    pub nn: String,
    pub p: f64,
    pub seed: String,
    pub counts: Counts,
    pub link: PartitionColumns,
    pub plaq: PartitionColumns,
    pub vol: PartitionColumns,
}

impl StatsRecord {
    /// Merge decoded filename metadata with a parsed document.
    pub fn new(source: PathBuf, meta: RunMetadata, doc: StatsDocument) -> Self {
        Self {
            source,
            z1: meta.z1_text(),
            z2: meta.z2_text(),
            z3: meta.z3_text(),
            nn: meta.nn_text(),
            p: meta.p,
            seed: meta.seed,
            counts: doc.counts,
            link: PartitionColumns::from_stats(doc.link),
            plaq: PartitionColumns::from_stats(doc.plaq),
            vol: PartitionColumns::from_stats(doc.vol),
        }
    }

    pub fn partition(&self, dimension: Dimension) -> &PartitionColumns {
        match dimension {
            Dimension::Link => &self.link,
            Dimension::Plaq => &self.plaq,
            Dimension::Vol => &self.vol,
        }
    }
}

/// Decode `filename`, read it from `directory` and build its record.
///
/// The filename is checked before the file is opened, so a badly named file
/// is reported as a format problem even if it is also unreadable.
pub fn extract(filename: &str, directory: &Path) -> Result<StatsRecord, ExtractionError> {
    let meta = filename::decode(filename)?;
    let path = directory.join(filename);

    let bytes = std::fs::read(&path).map_err(|e| ExtractionError::io(path.clone(), e))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|source| ExtractionError::Parse {
            path: path.clone(),
            source,
        })?;
    let doc = StatsDocument::from_value(value)
        .map_err(|e| ExtractionError::document(path.clone(), e.to_string()))?;

    Ok(StatsRecord::new(path, meta, doc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use tempfile::TempDir;

    const SAMPLE: &str = "Z1=1,0,0;Z2=0,1,0;Z3=0,0,1;nn=1,2;p=0.050000;seed=deadbeef;.stats.json";

    fn write(dir: &TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(name), body).unwrap();
    }

    #[test]
    fn test_extract_sample() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            SAMPLE,
            r#"{"counts":{"links":10},"percolation":{"link":{"n_parts":2,"wrap":false,"part_nelem":[3,7]}}}"#,
        );

        let record = extract(SAMPLE, dir.path()).unwrap();
        assert_eq!(record.source, dir.path().join(SAMPLE));
        assert_eq!(record.z1, "1,0,0");
        assert_eq!(record.nn, "1,2");
        assert_eq!(record.p, 0.05);
        assert_eq!(record.seed, "deadbeef");
        assert_eq!(record.counts.links, Some(10));
        assert_eq!(record.link.n_parts, Some(2));
        assert_eq!(record.link.wrap, Some(false));

        let sizes = array_codec::decode(record.link.part_nelem.as_deref().unwrap()).unwrap();
        assert_eq!(sizes.as_ints(), Some(&[3, 7][..]));

        assert_eq!(record.vol, PartitionColumns::default());
    }

    #[test]
    fn test_bad_name_is_format_error_without_reading() {
        let dir = TempDir::new().unwrap();
        let err = extract("notes.stats.json", dir.path()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Format);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = extract(SAMPLE, dir.path()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, SAMPLE, r#"{"counts": {"links": 10"#);
        let err = extract(SAMPLE, dir.path()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_wrong_shape_is_document_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, SAMPLE, r#"{"counts": {"links": [1]}}"#);
        let err = extract(SAMPLE, dir.path()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Document);
        assert!(err.to_string().contains(SAMPLE));
    }
}
