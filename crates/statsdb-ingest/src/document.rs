//! Result document model
//!
//! Simulation versions disagree on which keys they write, so every field is
//! optional: a missing key (or an explicit `null`) becomes `None`. A key that
//! is present with the wrong JSON type is rejected, since that means the file
//! is not what we think it is.
//!
//! Two percolation layouts are understood:
//!
//! ```json
//! {"percolation": {"link": {"n_parts": 2, "wrap": false, "part_nelem": [3, 7]}}}
//! {"percolation": {"n_plaq_parts": 2, "plaqs_wrap": true, "plaq_part_nelem": [4, 1]}}
//! ```
//!
//! When both spell the same field, the nested form wins.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Geometric structure a percolation analysis ran over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Link,
    Plaq,
    Vol,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Link, Dimension::Plaq, Dimension::Vol];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Link => "link",
            Dimension::Plaq => "plaq",
            Dimension::Vol => "vol",
        }
    }

    /// Column holding the partition count, e.g. `n_link_parts`.
    pub fn parts_column(&self) -> &'static str {
        match self {
            Dimension::Link => "n_link_parts",
            Dimension::Plaq => "n_plaq_parts",
            Dimension::Vol => "n_vol_parts",
        }
    }

    /// Column holding the wrap flag, e.g. `links_wrap`.
    pub fn wrap_column(&self) -> &'static str {
        match self {
            Dimension::Link => "links_wrap",
            Dimension::Plaq => "plaqs_wrap",
            Dimension::Vol => "vols_wrap",
        }
    }

    /// Column holding the encoded partition sizes, e.g. `link_part_nelem`.
    pub fn sizes_column(&self) -> &'static str {
        match self {
            Dimension::Link => "link_part_nelem",
            Dimension::Plaq => "plaq_part_nelem",
            Dimension::Vol => "vol_part_nelem",
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link" => Ok(Dimension::Link),
            "plaq" => Ok(Dimension::Plaq),
            "vol" => Ok(Dimension::Vol),
            other => Err(format!("unknown dimension '{other}' (expected link, plaq or vol)")),
        }
    }
}

/// The document is valid JSON but not shaped like a result document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LayoutError(String);

/// Named lattice counters from the `counts` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Counts {
    pub links: Option<i64>,
    pub plaqs: Option<i64>,
    pub points: Option<i64>,
    pub vols: Option<i64>,
}

/// Percolation results for one [`Dimension`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PartitionStats {
    pub n_parts: Option<i64>,
    pub wrap: Option<bool>,
    /// One entry per connected component
    pub part_nelem: Option<Vec<i64>>,
}

impl PartitionStats {
    fn or(self, fallback: PartitionStats) -> PartitionStats {
        PartitionStats {
            n_parts: self.n_parts.or(fallback.n_parts),
            wrap: self.wrap.or(fallback.wrap),
            part_nelem: self.part_nelem.or(fallback.part_nelem),
        }
    }
}

/// Parsed contents of one `.stats.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsDocument {
    pub counts: Counts,
    pub link: PartitionStats,
    pub plaq: PartitionStats,
    pub vol: PartitionStats,
}

impl StatsDocument {
    /// Build a document from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, LayoutError> {
        if !value.is_object() {
            return Err(LayoutError(format!(
                "top level is {}, expected an object",
                json_kind(&value)
            )));
        }

        let raw: RawDocument =
            serde_json::from_value(value).map_err(|e| LayoutError(e.to_string()))?;
        let perc = raw.percolation.unwrap_or_default();

        Ok(StatsDocument {
            counts: raw.counts.unwrap_or_default(),
            link: perc.link.unwrap_or_default().or(PartitionStats {
                n_parts: perc.n_link_parts,
                wrap: perc.links_wrap,
                part_nelem: perc.link_part_nelem,
            }),
            plaq: perc.plaq.unwrap_or_default().or(PartitionStats {
                n_parts: perc.n_plaq_parts,
                wrap: perc.plaqs_wrap,
                part_nelem: perc.plaq_part_nelem,
            }),
            vol: perc.vol.unwrap_or_default().or(PartitionStats {
                n_parts: perc.n_vol_parts,
                wrap: perc.vols_wrap,
                part_nelem: perc.vol_part_nelem,
            }),
        })
    }

    pub fn partition(&self, dimension: Dimension) -> &PartitionStats {
        match dimension {
            Dimension::Link => &self.link,
            Dimension::Plaq => &self.plaq,
            Dimension::Vol => &self.vol,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawDocument {
    counts: Option<Counts>,
    percolation: Option<RawPercolation>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawPercolation {
    link: Option<PartitionStats>,
    plaq: Option<PartitionStats>,
    vol: Option<PartitionStats>,

    n_link_parts: Option<i64>,
    links_wrap: Option<bool>,
    link_part_nelem: Option<Vec<i64>>,

    n_plaq_parts: Option<i64>,
    plaqs_wrap: Option<bool>,
    plaq_part_nelem: Option<Vec<i64>>,

    n_vol_parts: Option<i64>,
    vols_wrap: Option<bool>,
    vol_part_nelem: Option<Vec<i64>>,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_layout() {
        let doc = StatsDocument::from_value(json!({
            "counts": {"links": 10},
            "percolation": {"link": {"n_parts": 2, "wrap": false, "part_nelem": [3, 7]}}
        }))
        .unwrap();

        assert_eq!(doc.counts.links, Some(10));
        assert_eq!(doc.counts.plaqs, None);
        assert_eq!(doc.link.n_parts, Some(2));
        assert_eq!(doc.link.wrap, Some(false));
        assert_eq!(doc.link.part_nelem, Some(vec![3, 7]));
        assert_eq!(doc.vol, PartitionStats::default());
    }

    #[test]
    fn test_flat_layout_from_simulation() {
        let doc = StatsDocument::from_value(json!({
            "counts": {"links": 48, "plaqs": 96, "points": 16, "vols": 8},
            "percolation": {
                "n_plaq_parts": 3, "plaq_part_nelem": [50, 40, 6], "plaqs_wrap": true,
                "n_vol_parts": 1, "vol_part_nelem": [8], "vols_wrap": false
            }
        }))
        .unwrap();

        assert_eq!(doc.counts.vols, Some(8));
        assert_eq!(doc.plaq.part_nelem, Some(vec![50, 40, 6]));
        assert_eq!(doc.partition(Dimension::Vol).wrap, Some(false));
        assert_eq!(doc.link.n_parts, None);
    }

    #[test]
    fn test_nested_wins_over_flat() {
        let doc = StatsDocument::from_value(json!({
            "percolation": {"vol": {"n_parts": 5}, "n_vol_parts": 9, "vols_wrap": true}
        }))
        .unwrap();
        assert_eq!(doc.vol.n_parts, Some(5));
        assert_eq!(doc.vol.wrap, Some(true));
    }

    #[test]
    fn test_missing_and_null_sections_are_empty() {
        assert_eq!(
            StatsDocument::from_value(json!({})).unwrap(),
            StatsDocument::default()
        );
        assert_eq!(
            StatsDocument::from_value(json!({"counts": null, "percolation": null, "extra": 1}))
                .unwrap(),
            StatsDocument::default()
        );
    }

    #[test]
    fn test_empty_partition_list_is_kept() {
        let doc = StatsDocument::from_value(json!({
            "percolation": {"link": {"n_parts": 0, "part_nelem": []}}
        }))
        .unwrap();
        assert_eq!(doc.link.part_nelem, Some(vec![]));
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        assert!(StatsDocument::from_value(json!([1, 2])).is_err());
        assert!(StatsDocument::from_value(json!({"counts": {"links": "ten"}})).is_err());
        assert!(StatsDocument::from_value(json!({
            "percolation": {"link": {"wrap": 1}}
        }))
        .is_err());
    }

    #[test]
    fn test_dimension_columns() {
        let columns: Vec<_> = Dimension::ALL.iter().map(|d| d.wrap_column()).collect();
        assert_eq!(columns, ["links_wrap", "plaqs_wrap", "vols_wrap"]);
        assert_eq!("plaq".parse::<Dimension>().unwrap(), Dimension::Plaq);
        assert!("edge".parse::<Dimension>().is_err());
    }
}
