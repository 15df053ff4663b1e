//! Dense numeric array codec for BLOB columns
//!
//! Partition-size arrays are stored as self-describing blobs so they can be
//! read back without any side information:
//!
//! ```text
//! offset  size        field
//! 0       4           magic "SDBA"
//! 4       1           format version (1)
//! 5       1           element type: 1 = i64, 2 = f64
//! 6       1           number of dimensions (n)
//! 7       1           reserved, 0
//! 8       8 * n       dimensions, u64 little endian
//! 8+8n    8 * prod    elements, little endian, row-major
//! ```
//!
//! An empty array is still a blob (header plus one zero dimension). "No data
//! reported" is not a blob at all: [`encode_optional`] maps it to `None`,
//! which the loader binds as SQL `NULL`.

use crate::error::ArrayCodecError;

const MAGIC: &[u8; 4] = b"SDBA";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 8;
const ELEMENT_LEN: usize = 8;
const MAX_DIMS: usize = u8::MAX as usize;

const TAG_I64: u8 = 1;
const TAG_F64: u8 = 2;

/// Element storage of a [`NumericArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValues {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl ArrayValues {
    pub fn len(&self) -> usize {
        match self {
            ArrayValues::Int(v) => v.len(),
            ArrayValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tag(&self) -> u8 {
        match self {
            ArrayValues::Int(_) => TAG_I64,
            ArrayValues::Float(_) => TAG_F64,
        }
    }
}

/// A dense, row-major array of integers or floats with an explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    shape: Vec<u64>,
    values: ArrayValues,
}

impl NumericArray {
    /// One-dimensional integer array.
    pub fn from_ints(values: Vec<i64>) -> Self {
        Self {
            shape: vec![values.len() as u64],
            values: ArrayValues::Int(values),
        }
    }

    /// One-dimensional float array.
    pub fn from_floats(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len() as u64],
            values: ArrayValues::Float(values),
        }
    }

    /// Array with an explicit shape; the element count must match it.
    /// At most 255 dimensions are representable.
    pub fn with_shape(shape: Vec<u64>, values: ArrayValues) -> Result<Self, ArrayCodecError> {
        match element_count(&shape) {
            Some(count) if count == values.len() && shape.len() <= MAX_DIMS => {
                Ok(Self { shape, values })
            },
            _ => Err(ArrayCodecError::ShapeLength {
                len: values.len(),
                shape,
            }),
        }
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn values(&self) -> &ArrayValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The elements when this is an integer array.
    pub fn as_ints(&self) -> Option<&[i64]> {
        match &self.values {
            ArrayValues::Int(v) => Some(v),
            ArrayValues::Float(_) => None,
        }
    }
}

/// Serialize an array into its blob form.
pub fn encode(array: &NumericArray) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(HEADER_LEN + ELEMENT_LEN * (array.shape.len() + array.values.len()));

    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.push(array.values.tag());
    // constructors cap the dimension count at MAX_DIMS
    out.push(array.shape.len() as u8);
    out.push(0);

    for dim in &array.shape {
        out.extend_from_slice(&dim.to_le_bytes());
    }

    match &array.values {
        ArrayValues::Int(values) => {
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        },
        ArrayValues::Float(values) => {
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        },
    }

    out
}

/// Parse a blob produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<NumericArray, ArrayCodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(ArrayCodecError::Truncated {
            len: bytes.len(),
            needed: HEADER_LEN,
        });
    }
    if &bytes[..4] != MAGIC {
        return Err(ArrayCodecError::BadMagic);
    }
    if bytes[4] != VERSION {
        return Err(ArrayCodecError::UnsupportedVersion(bytes[4]));
    }

    let tag = bytes[5];
    if tag != TAG_I64 && tag != TAG_F64 {
        return Err(ArrayCodecError::UnknownElementType(tag));
    }

    let ndim = bytes[6] as usize;
    let dims_end = HEADER_LEN + ndim * ELEMENT_LEN;
    if bytes.len() < dims_end {
        return Err(ArrayCodecError::Truncated {
            len: bytes.len(),
            needed: dims_end,
        });
    }

    let shape: Vec<u64> = bytes[HEADER_LEN..dims_end]
        .chunks_exact(ELEMENT_LEN)
        .map(|chunk| u64::from_le_bytes(word(chunk)))
        .collect();

    let payload = &bytes[dims_end..];
    let expected = element_count(&shape).and_then(|n| n.checked_mul(ELEMENT_LEN));
    if expected != Some(payload.len()) {
        return Err(ArrayCodecError::ShapeMismatch {
            shape,
            expected: expected.unwrap_or(usize::MAX),
            actual: payload.len(),
        });
    }

    let words = payload.chunks_exact(ELEMENT_LEN).map(word);
    let values = if tag == TAG_I64 {
        ArrayValues::Int(words.map(i64::from_le_bytes).collect())
    } else {
        ArrayValues::Float(words.map(f64::from_le_bytes).collect())
    };

    Ok(NumericArray { shape, values })
}

/// Encode an array that may be absent. `None` stays `None` (SQL `NULL`).
pub fn encode_optional(array: Option<&NumericArray>) -> Option<Vec<u8>> {
    array.map(encode)
}

/// Inverse of [`encode_optional`].
pub fn decode_optional(bytes: Option<&[u8]>) -> Result<Option<NumericArray>, ArrayCodecError> {
    bytes.map(decode).transpose()
}

fn element_count(shape: &[u64]) -> Option<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(usize::try_from(dim).ok()?))
}

fn word(chunk: &[u8]) -> [u8; ELEMENT_LEN] {
    let mut buf = [0u8; ELEMENT_LEN];
    buf.copy_from_slice(chunk);
    buf
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_and_singleton_survive() {
        for values in [vec![], vec![0], vec![7]] {
            let array = NumericArray::from_ints(values.clone());
            let back = decode(&encode(&array)).unwrap();
            assert_eq!(back.as_ints().unwrap(), values.as_slice());
            assert_eq!(back.shape(), &[values.len() as u64]);
        }
    }

    #[test]
    fn test_empty_blob_is_not_null() {
        let empty = NumericArray::from_ints(vec![]);
        let blob = encode_optional(Some(&empty));
        assert_eq!(blob.as_ref().map(Vec::len), Some(HEADER_LEN + ELEMENT_LEN));
        assert_eq!(encode_optional(None), None);

        assert_eq!(decode_optional(None).unwrap(), None);
        assert_eq!(
            decode_optional(blob.as_deref()).unwrap(),
            Some(NumericArray::from_ints(vec![]))
        );
    }

    #[test]
    fn test_element_type_is_recorded() {
        let ints = encode(&NumericArray::from_ints(vec![1, 2]));
        let floats = encode(&NumericArray::from_floats(vec![1.0, 2.0]));
        assert_eq!(ints[5], TAG_I64);
        assert_eq!(floats[5], TAG_F64);
        assert_eq!(
            decode(&floats).unwrap().values(),
            &ArrayValues::Float(vec![1.0, 2.0])
        );
    }

    #[test]
    fn test_two_dimensional_shape() {
        let array =
            NumericArray::with_shape(vec![2, 3], ArrayValues::Int(vec![1, 2, 3, 4, 5, 6])).unwrap();
        let back = decode(&encode(&array)).unwrap();
        assert_eq!(back.shape(), &[2, 3]);
        assert_eq!(back, array);

        let err = NumericArray::with_shape(vec![2, 2], ArrayValues::Int(vec![1])).unwrap_err();
        assert!(matches!(err, ArrayCodecError::ShapeLength { len: 1, .. }));
    }

    #[test]
    fn test_rejects_corrupt_blobs() {
        let good = encode(&NumericArray::from_ints(vec![3, 7]));

        assert!(matches!(
            decode(&good[..5]),
            Err(ArrayCodecError::Truncated { .. })
        ));

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert_eq!(decode(&bad_magic), Err(ArrayCodecError::BadMagic));

        let mut bad_version = good.clone();
        bad_version[4] = 9;
        assert_eq!(decode(&bad_version), Err(ArrayCodecError::UnsupportedVersion(9)));

        let mut bad_tag = good.clone();
        bad_tag[5] = 42;
        assert_eq!(decode(&bad_tag), Err(ArrayCodecError::UnknownElementType(42)));

        let short_payload = &good[..good.len() - 1];
        assert!(matches!(
            decode(short_payload),
            Err(ArrayCodecError::ShapeMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_int_arrays_round_trip(values in prop::collection::vec(any::<i64>(), 0..64)) {
            let array = NumericArray::from_ints(values);
            prop_assert_eq!(decode(&encode(&array)).unwrap(), array);
        }

        #[test]
        fn prop_float_arrays_round_trip(values in prop::collection::vec(-1e12f64..1e12, 0..64)) {
            let array = NumericArray::from_floats(values);
            prop_assert_eq!(decode(&encode(&array)).unwrap(), array);
        }
    }
}
