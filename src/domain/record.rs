// ============================================================
// Layer 3 — Record Domain Type
// ============================================================
// Represents one training example as a pair of raw byte blobs.
// Each blob is the little-endian flattening of a fixed-shape
// numeric array. The blobs carry NO shape or dtype metadata —
// whoever reads a record back must already know both, exactly
// like decoding a raw tensor string.
//
// Reference: Rust Book §5 (Structs)
//            serde crate documentation

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A single serialisable training example.
///
/// `feature` and `label` are opaque byte strings. The writer applies
/// optional preprocessing to each blob before it hits disk; the reader
/// decodes them using a caller-supplied shape and element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Flattened feature array, e.g. image pixels
    pub feature: Vec<u8>,

    /// Flattened label array, e.g. a one-hot class vector
    pub label: Vec<u8>,
}

impl Record {
    /// Create a new Record from two pre-encoded blobs.
    pub fn new(feature: Vec<u8>, label: Vec<u8>) -> Self {
        Self { feature, label }
    }

    /// Create a Record from two f32 slices, encoding both little-endian.
    pub fn from_f32(features: &[f32], labels: &[f32]) -> Self {
        Self {
            feature: f32_bytes(features),
            label:   f32_bytes(labels),
        }
    }
}

/// Encode an f32 slice as little-endian bytes.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Map raw u8 pixels into [0, 1] floats and encode them as bytes.
/// This is the standard image preprocessing step applied at write time
/// so the training pipeline can stream f32 features directly.
pub fn normalize_pixels(pixels: &[u8]) -> Vec<u8> {
    let floats: Vec<f32> = pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
    f32_bytes(&floats)
}

/// Encode a class index as a one-hot f32 vector of `num_classes` entries.
/// An out-of-range class produces an all-zero vector; callers are expected
/// to validate class ranges before writing.
pub fn one_hot_bytes(class: usize, num_classes: usize) -> Vec<u8> {
    let mut floats = vec![0.0f32; num_classes];
    if class < num_classes {
        floats[class] = 1.0;
    }
    f32_bytes(&floats)
}

// ─── ElementType ──────────────────────────────────────────────────────────────
/// The numeric element type of a blob.
///
/// A record does not store this — the reader declares it, and the blob's
/// byte length must be a whole multiple of the element width. Every type
/// decodes to f32 because that is what the training tensors are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElementType::U8  => 1,
            ElementType::I32 => 4,
            ElementType::I64 => 8,
            ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }

    /// Decode a little-endian blob into a flat f32 array.
    ///
    /// Fails when the blob length is not a multiple of the element width —
    /// the first sign that the declared type does not match what was written.
    pub fn decode_to_f32(self, bytes: &[u8]) -> Result<Vec<f32>> {
        let width = self.size_in_bytes();
        if bytes.len() % width != 0 {
            return Err(anyhow::anyhow!(
                "Blob of {} bytes is not a multiple of the {}-byte {:?} element width",
                bytes.len(),
                width,
                self,
            ));
        }

        let values = match self {
            ElementType::U8 => bytes.iter().map(|&b| f32::from(b)).collect(),
            ElementType::I32 => bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32)
                .collect(),
            ElementType::I64 => bytes
                .chunks_exact(8)
                .map(|c| {
                    i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32
                })
                .collect(),
            ElementType::F32 => bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            ElementType::F64 => bytes
                .chunks_exact(8)
                .map(|c| {
                    f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32
                })
                .collect(),
        };

        Ok(values)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_bytes_round_trip() {
        let values  = [1.0f32, -2.5, 0.0, 1e-4];
        let bytes   = f32_bytes(&values);
        let decoded = ElementType::F32.decode_to_f32(&bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_u8_decodes_without_scaling() {
        let decoded = ElementType::U8.decode_to_f32(&[0, 1, 255]).unwrap();
        assert_eq!(decoded, vec![0.0, 1.0, 255.0]);
    }

    #[test]
    fn test_misaligned_blob_is_rejected() {
        // 5 bytes cannot hold a whole number of 4-byte f32 elements
        let err = ElementType::F32.decode_to_f32(&[0u8; 5]).unwrap_err();
        assert!(err.to_string().contains("not a multiple"));
    }

    #[test]
    fn test_normalize_pixels_scales_into_unit_range() {
        let bytes   = normalize_pixels(&[0, 255, 51]);
        let decoded = ElementType::F32.decode_to_f32(&bytes).unwrap();
        assert_eq!(decoded[0], 0.0);
        assert_eq!(decoded[1], 1.0);
        assert!((decoded[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_one_hot_sets_exactly_one_entry() {
        let bytes   = one_hot_bytes(2, 4);
        let decoded = ElementType::F32.decode_to_f32(&bytes).unwrap();
        assert_eq!(decoded, vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_one_hot_out_of_range_is_all_zero() {
        let bytes   = one_hot_bytes(7, 3);
        let decoded = ElementType::F32.decode_to_f32(&bytes).unwrap();
        assert_eq!(decoded, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_i64_decode() {
        let bytes: Vec<u8> = [-3i64, 12]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let decoded = ElementType::I64.decode_to_f32(&bytes).unwrap();
        assert_eq!(decoded, vec![-3.0, 12.0]);
    }
}
