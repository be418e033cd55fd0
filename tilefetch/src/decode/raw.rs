//! Pass-through decoder.

use bytes::Bytes;

use super::{DecodeError, Decoder};

/// Delivers the tile bytes unchanged.
///
/// An empty body is rejected: a server answering 200 with no content has
/// not produced a tile.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl RawDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RawDecoder {
    type Payload = Bytes;

    fn decode(&self, data: &[u8]) -> Result<Bytes, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Bytes::copy_from_slice(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_decoder_passes_bytes_through() {
        let payload = RawDecoder::new().decode(&[1, 2, 3]).unwrap();
        assert_eq!(&payload[..], &[1, 2, 3]);
    }

    #[test]
    fn test_raw_decoder_rejects_empty() {
        assert_eq!(RawDecoder::new().decode(&[]), Err(DecodeError::Empty));
    }
}
