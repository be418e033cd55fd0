//! Vector tile byte handling.
//!
//! Vector tile servers frequently gzip the protobuf body without setting
//! `Content-Encoding`, so the decoder sniffs the gzip magic and inflates.
//! Feature parsing is left to the consumer.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;

use super::{DecodeError, Decoder};

/// First two bytes of every gzip stream.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest inflated vector tile accepted by default (16 MiB).
pub const MAX_INFLATED_TILE_BYTES: usize = 16 * 1024 * 1024;

/// Yields the (inflated) protobuf bytes of a vector tile.
#[derive(Debug, Clone, Copy)]
pub struct VectorTileDecoder {
    max_inflated: usize,
}

impl Default for VectorTileDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorTileDecoder {
    pub fn new() -> Self {
        Self {
            max_inflated: MAX_INFLATED_TILE_BYTES,
        }
    }

    /// Sets the inflated size above which a gzipped tile is rejected.
    pub fn with_max_inflated_size(mut self, bytes: usize) -> Self {
        self.max_inflated = bytes;
        self
    }

    /// Returns true if `data` starts with the gzip magic number.
    pub fn is_gzipped(data: &[u8]) -> bool {
        data.starts_with(&GZIP_MAGIC)
    }
}

impl Decoder for VectorTileDecoder {
    type Payload = Bytes;

    fn decode(&self, data: &[u8]) -> Result<Bytes, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        if !Self::is_gzipped(data) {
            return Ok(Bytes::copy_from_slice(data));
        }

        // One byte past the cap is enough to tell an oversized body apart
        let limit = self.max_inflated as u64 + 1;
        let mut inflated = Vec::new();
        GzDecoder::new(data)
            .take(limit)
            .read_to_end(&mut inflated)
            .map_err(|e| DecodeError::Inflate(e.to_string()))?;
        if inflated.len() > self.max_inflated {
            return Err(DecodeError::Inflate(format!(
                "inflated tile exceeds {} bytes",
                self.max_inflated
            )));
        }
        Ok(Bytes::from(inflated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_plain_bytes_pass_through() {
        let decoded = VectorTileDecoder::new().decode(&[0x1a, 0x02, 0x08]).unwrap();
        assert_eq!(&decoded[..], &[0x1a, 0x02, 0x08]);
    }

    #[test]
    fn test_gzipped_bytes_are_inflated() {
        let body = b"\x1a\x0blayer bytes";
        let compressed = gzip(body);
        assert!(VectorTileDecoder::is_gzipped(&compressed));

        let decoded = VectorTileDecoder::new().decode(&compressed).unwrap();
        assert_eq!(&decoded[..], &body[..]);
    }

    #[test]
    fn test_corrupt_gzip_fails() {
        // Valid gzip header, then a deflate block with the reserved type
        let mut corrupt = vec![0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];
        corrupt.extend_from_slice(&[0xff; 16]);

        let result = VectorTileDecoder::new().decode(&corrupt);
        assert!(matches!(result, Err(DecodeError::Inflate(_))));
    }

    #[test]
    fn test_inflated_size_is_capped() {
        let decoder = VectorTileDecoder::new().with_max_inflated_size(1024);

        let at_cap = decoder.decode(&gzip(&[0u8; 1024])).unwrap();
        assert_eq!(at_cap.len(), 1024);

        let result = decoder.decode(&gzip(&[0u8; 1025]));
        assert_eq!(
            result,
            Err(DecodeError::Inflate("inflated tile exceeds 1024 bytes".to_string()))
        );
    }

    #[test]
    fn test_default_cap_rejects_highly_compressed_bomb() {
        let bomb = gzip(&vec![0u8; MAX_INFLATED_TILE_BYTES + 1]);
        assert!(bomb.len() < 64 * 1024);

        let result = VectorTileDecoder::new().decode(&bomb);
        assert!(matches!(result, Err(DecodeError::Inflate(_))));
    }

    #[test]
    fn test_empty_fails() {
        assert_eq!(VectorTileDecoder::new().decode(&[]), Err(DecodeError::Empty));
    }
}
