//! Readers for the IDX files the MNIST database is distributed as.
//!
//! Every file starts with a big endian `u32` magic number, followed by one big endian `u32` per
//! dimension and then the raw `u8` data.

use ndarray::Array4;

use crate::{MlErr, Result};

pub const IMAGES_MAGIC: u32 = 0x0000_0803;
pub const LABELS_MAGIC: u32 = 0x0000_0801;

/// Parses an `idx3-ubyte` images file into a `(count, 1, rows, cols)` array scaled to `[0, 1]`.
pub fn parse_images(bytes: &[u8]) -> Result<Array4<f32>> {
    let dims = header(bytes, IMAGES_MAGIC, 3)?;
    let (count, rows, cols) = (dims[0], dims[1], dims[2]);

    let len = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| MlErr::MalformedIdx("image dimensions overflow".to_string()))?;

    let body = body(bytes, 3, len)?;
    let pixels = body.iter().map(|&p| p as f32 / 255.).collect();

    Ok(Array4::from_shape_vec((count, 1, rows, cols), pixels)?)
}

/// Parses an `idx1-ubyte` labels file.
pub fn parse_labels(bytes: &[u8]) -> Result<Vec<usize>> {
    let dims = header(bytes, LABELS_MAGIC, 1)?;
    let body = body(bytes, 1, dims[0])?;

    Ok(body.iter().map(|&label| label as usize).collect())
}

fn header(bytes: &[u8], magic: u32, ndims: usize) -> Result<Vec<usize>> {
    let got = read_u32(bytes, 0)?;
    if got != magic {
        return Err(MlErr::MalformedIdx(format!(
            "expected magic number {magic:#010x}, got {got:#010x}"
        )));
    }

    (1..=ndims)
        .map(|i| read_u32(bytes, i).map(|dim| dim as usize))
        .collect()
}

fn body(bytes: &[u8], ndims: usize, expected: usize) -> Result<&[u8]> {
    let body = &bytes[4 * (ndims + 1)..];
    if body.len() != expected {
        return Err(MlErr::MalformedIdx(format!(
            "expected {expected} bytes of data, got {}",
            body.len()
        )));
    }

    Ok(body)
}

fn read_u32(bytes: &[u8], i: usize) -> Result<u32> {
    bytes
        .get(4 * i..4 * (i + 1))
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| MlErr::MalformedIdx("truncated header".to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encodes an images file, used to build fixtures.
    pub(crate) fn encode_images(count: u32, rows: u32, cols: u32, pixels: &[u8]) -> Vec<u8> {
        [IMAGES_MAGIC, count, rows, cols]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .chain(pixels.iter().copied())
            .collect()
    }

    pub(crate) fn encode_labels(labels: &[u8]) -> Vec<u8> {
        [LABELS_MAGIC, labels.len() as u32]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .chain(labels.iter().copied())
            .collect()
    }

    #[test]
    fn parses_and_normalizes_images() {
        let bytes = encode_images(2, 1, 2, &[0, 255, 51, 102]);

        let images = parse_images(&bytes).unwrap();

        assert_eq!(images.dim(), (2, 1, 1, 2));
        assert_eq!(images[[0, 0, 0, 1]], 1.);
        assert!((images[[1, 0, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parses_labels() {
        let labels = parse_labels(&encode_labels(&[7, 2, 1])).unwrap();

        assert_eq!(labels, [7, 2, 1]);
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = encode_labels(&[1]);

        let err = parse_images(&bytes).unwrap_err();
        assert!(matches!(err, MlErr::MalformedIdx(_)));
        assert!(err.to_string().contains("0x00000803"));
    }

    #[test]
    fn rejects_overflowing_dimensions() {
        let bytes = encode_images(u32::MAX, u32::MAX, u32::MAX, &[]);

        let err = parse_images(&bytes).unwrap_err();
        assert!(matches!(err, MlErr::MalformedIdx(ref msg) if msg.contains("overflow")));
    }

    #[test]
    fn rejects_truncated_files() {
        let bytes = encode_images(2, 2, 2, &[0; 7]);
        assert!(matches!(parse_images(&bytes), Err(MlErr::MalformedIdx(_))));

        assert!(matches!(
            parse_labels(&LABELS_MAGIC.to_be_bytes()),
            Err(MlErr::MalformedIdx(_))
        ));
    }
}
