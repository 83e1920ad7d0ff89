use std::convert::TryFrom;

use anyhow::{anyhow, bail, Result};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Packs a vector as little-endian f32 bytes.
pub fn encode_vector(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]. Rejects blobs that are not a whole number
/// of f32 values or that contain NaN or infinity.
pub fn decode_vector(bytes: &[u8], field: &str) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        bail!(
            "{field} blob length {} is not a multiple of 4",
            bytes.len()
        );
    }

    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if let Some(index) = values.iter().position(|value| !value.is_finite()) {
        bail!("{field} blob has a non-finite value at index {index}");
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_blob_is_little_endian() {
        let bytes = encode_vector(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_vector(&bytes, "feature").unwrap(), vec![1.0, -2.5]);
        assert!(decode_vector(&[], "feature").unwrap().is_empty());
    }

    #[test]
    fn truncated_or_non_finite_blobs_are_rejected() {
        let mut bytes = encode_vector(&[1.0, 2.0]);
        bytes.pop();
        assert!(decode_vector(&bytes, "feature").is_err());

        let nan = encode_vector(&[0.5, f32::NAN]);
        let err = decode_vector(&nan, "feature").unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn integer_conversions_are_checked() {
        assert_eq!(to_i64(7).unwrap(), 7);
        assert!(to_i64(u64::MAX).is_err());
        assert!(to_u64(-1, "sample_count").is_err());
    }
}
