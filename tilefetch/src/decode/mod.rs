//! Tile payload decoders
//!
//! Fetch tasks hand raw bytes (from the cache or the network) to a
//! [`Decoder`]; the decoded value is what the consumer receives. The
//! orchestrator never looks inside a payload.
//!
//! | Decoder               | Payload       | Input                         |
//! |-----------------------|---------------|-------------------------------|
//! | [`RawDecoder`]        | `Bytes`       | anything non-empty            |
//! | [`ImageDecoder`]      | `RgbaImage`   | PNG / JPEG / WebP / ...       |
//! | [`VectorTileDecoder`] | `Bytes`       | vector tile, gzipped or plain |

mod raster;
mod raw;
mod vector;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use raster::{ImageDecoder, PREMULTIPLIED_ALPHA_SUPPORTED};
pub use raw::RawDecoder;
pub use vector::{VectorTileDecoder, GZIP_MAGIC, MAX_INFLATED_TILE_BYTES};

/// Errors produced while decoding a tile payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing to decode
    #[error("Empty payload")]
    Empty,

    /// Raster data could not be decoded
    #[error("Image decode failed: {0}")]
    Image(String),

    /// Compressed data could not be inflated
    #[error("Decompression failed: {0}")]
    Inflate(String),

    /// The decoder did not run to completion (panicked or was aborted)
    #[error("Decoder aborted: {0}")]
    Aborted(String),
}

/// Turns raw tile bytes into a payload.
///
/// Implementations are shared between concurrent fetch tasks.
pub trait Decoder: Send + Sync {
    /// Decoded tile type delivered to the consumer.
    type Payload: Send + Sync + 'static;

    /// Decodes one tile.
    fn decode(&self, data: &[u8]) -> Result<Self::Payload, DecodeError>;
}

/// Payload format of a source, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileFormat {
    /// Raster image tiles
    #[default]
    Raster,
    /// Vector tiles (optionally gzipped)
    Vector,
    /// Bytes passed through untouched
    Raw,
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileFormat::Raster => "raster",
            TileFormat::Vector => "vector",
            TileFormat::Raw => "raw",
        };
        f.write_str(name)
    }
}

impl FromStr for TileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raster" | "image" => Ok(TileFormat::Raster),
            "vector" | "mvt" | "pbf" => Ok(TileFormat::Vector),
            "raw" => Ok(TileFormat::Raw),
            other => Err(format!("unknown tile format '{}'", other)),
        }
    }
}
