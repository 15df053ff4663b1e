//! Run-parameter filename codec
//!
//! The simulation names every result file after the parameters of its run:
//!
//! ```text
//! Z1=1,0,0;Z2=0,1,0;Z3=0,0,1;nn=1,2;p=0.050000;seed=deadbeef;.stats.json
//! ```
//!
//! Fields appear in exactly this order and each one is terminated by `;`.
//! `Z1`..`Z3` are the lattice basis vectors (three signed integers each),
//! `nn` is a possibly empty list of integers, `p` a plain decimal and `seed`
//! lowercase hex. Decoding is a pure string operation; nothing here touches
//! the filesystem.

use crate::error::FormatError;
use regex::Regex;
use std::sync::LazyLock;

/// Suffix shared by every result document the scanner picks up.
pub const STATS_SUFFIX: &str = ".stats.json";

#[allow(clippy::expect_used)]
static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^Z1=(-?\d+),(-?\d+),(-?\d+);",
        r"Z2=(-?\d+),(-?\d+),(-?\d+);",
        r"Z3=(-?\d+),(-?\d+),(-?\d+);",
        r"nn=((?:-?\d+(?:,-?\d+)*)?);",
        r"p=(\d+(?:\.\d*)?|\.\d+);",
        r"seed=([0-9a-f]+);",
        r"\.stats\.json$",
    ))
    .expect("filename pattern is a valid regex")
});

/// Parameters of one simulation run, decoded from its filename.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub z1: [i64; 3],
    pub z2: [i64; 3],
    pub z3: [i64; 3],
    /// Neighbour shells removed from the lattice; may be empty
    pub nn: Vec<i64>,
    /// Dilution probability, not range-checked
    pub p: f64,
    pub seed: String,
}

impl RunMetadata {
    /// `Z1` as stored: comma separated, no spaces.
    pub fn z1_text(&self) -> String {
        join_ints(&self.z1)
    }

    pub fn z2_text(&self) -> String {
        join_ints(&self.z2)
    }

    pub fn z3_text(&self) -> String {
        join_ints(&self.z3)
    }

    pub fn nn_text(&self) -> String {
        join_ints(&self.nn)
    }
}

/// Decode a bare filename (no directory component) into its run parameters.
///
/// Either every field is recovered or a [`FormatError`] is returned; there is
/// no partially filled result.
pub fn decode(filename: &str) -> Result<RunMetadata, FormatError> {
    if !filename.ends_with(STATS_SUFFIX) {
        return Err(FormatError::Suffix {
            filename: filename.to_string(),
            suffix: STATS_SUFFIX,
        });
    }

    let caps = FILENAME_PATTERN
        .captures(filename)
        .ok_or_else(|| FormatError::Grammar {
            filename: filename.to_string(),
        })?;

    let int = |index: usize, field: &'static str| -> Result<i64, FormatError> {
        parse_int(filename, field, &caps[index])
    };

    let z1 = [int(1, "Z1")?, int(2, "Z1")?, int(3, "Z1")?];
    let z2 = [int(4, "Z2")?, int(5, "Z2")?, int(6, "Z2")?];
    let z3 = [int(7, "Z3")?, int(8, "Z3")?, int(9, "Z3")?];

    let nn = match &caps[10] {
        "" => Vec::new(),
        list => list
            .split(',')
            .map(|v| parse_int(filename, "nn", v))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let p_text = &caps[11];
    let p = p_text
        .parse::<f64>()
        .map_err(|_| FormatError::Probability {
            filename: filename.to_string(),
            value: p_text.to_string(),
        })?;

    Ok(RunMetadata {
        z1,
        z2,
        z3,
        nn,
        p,
        seed: caps[12].to_string(),
    })
}

/// Render run parameters back into a filename.
///
/// `p` is written with six decimals, the precision the sweep driver uses, so
/// probabilities with more digits do not survive a round trip.
pub fn encode(meta: &RunMetadata) -> String {
    format!(
        "Z1={};Z2={};Z3={};nn={};p={:.6};seed={};{}",
        meta.z1_text(),
        meta.z2_text(),
        meta.z3_text(),
        meta.nn_text(),
        meta.p,
        meta.seed,
        STATS_SUFFIX
    )
}

fn parse_int(filename: &str, field: &'static str, value: &str) -> Result<i64, FormatError> {
    value.parse().map_err(|_| FormatError::Integer {
        filename: filename.to_string(),
        field,
        value: value.to_string(),
    })
}

fn join_ints(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
