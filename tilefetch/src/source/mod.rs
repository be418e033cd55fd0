//! Remote tile sources
//!
//! A [`TileSource`] describes where one frame of a layer comes from: a URL
//! template, the zoom range it serves and how its tiles are named in the
//! cache. A [`SourceSet`] holds one source per frame; its length is the
//! multiplex depth of every tile in the layer.
//!
//! # URL Templates
//!
//! Templates use `{z}`, `{x}` and `{y}` placeholders:
//!
//! ```
//! use tilefetch::coord::TileId;
//! use tilefetch::source::TileSource;
//!
//! let source = TileSource::new("https://tiles.example.com/radar/{z}/{x}/{y}.png", 0, 12);
//! let url = source.build_url(&TileId::new(3, 4, 2));
//! assert_eq!(url, "https://tiles.example.com/radar/3/4/2.png");
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::coord::{FrameIndex, TileId};

/// Default file extension for cached tiles.
pub const DEFAULT_EXTENSION: &str = "png";

/// Length of the hex digest used as a cache namespace for unnamed sources.
const NAMESPACE_DIGEST_LEN: usize = 16;

/// Row numbering used by the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// Row 0 is the first row of the local scheme (XYZ / slippy map).
    #[default]
    Xyz,
    /// Row 0 is at the opposite edge (TMS); rows are flipped in URLs.
    Tms,
}

/// Errors building a source set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// No sources were given
    #[error("At least one tile source is required")]
    NoSources,

    /// A source's own zoom range is inverted
    #[error("Source {index} has min zoom {min} above max zoom {max}")]
    InvalidZoomRange { index: usize, min: u8, max: u8 },

    /// The sources share no common zoom level
    #[error("Sources share no zoom level (min {min} > max {max})")]
    DisjointZoomRanges { min: u8, max: u8 },
}

/// One remote tile source (one frame of a multiplexed layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSource {
    url_template: String,
    min_zoom: u8,
    max_zoom: u8,
    name: Option<String>,
    extension: String,
    row_order: RowOrder,
}

impl TileSource {
    /// Creates a source with XYZ row order and the default extension.
    pub fn new(url_template: impl Into<String>, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            url_template: url_template.into(),
            min_zoom,
            max_zoom,
            name: None,
            extension: DEFAULT_EXTENSION.to_string(),
            row_order: RowOrder::Xyz,
        }
    }

    /// Sets the cache namespace used for this source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the extension of cached files.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the remote row order.
    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }

    /// The URL template.
    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    /// Lowest zoom served.
    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    /// Highest zoom served.
    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Cached file extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Remote row order.
    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    /// Returns true if the source serves tiles at `level`.
    pub fn supports_level(&self, level: u8) -> bool {
        level >= self.min_zoom && level <= self.max_zoom
    }

    /// Builds the remote URL for a tile.
    pub fn build_url(&self, tile: &TileId) -> String {
        let y = match self.row_order {
            RowOrder::Xyz => tile.y,
            RowOrder::Tms => tile.flip_y(),
        };
        self.url_template
            .replace("{z}", &tile.level.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &y.to_string())
    }

    /// Directory-safe namespace separating this source's cache entries.
    ///
    /// Uses the configured name, or a digest of the URL template so two
    /// unnamed sources never share cache files.
    pub fn cache_namespace(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let digest = Sha256::digest(self.url_template.as_bytes());
                let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
                hex[..NAMESPACE_DIGEST_LEN].to_string()
            }
        }
    }
}

/// The sources of a multiplexed layer, one per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    sources: Vec<TileSource>,
    min_zoom: u8,
    max_zoom: u8,
}

impl SourceSet {
    /// Builds a source set, intersecting the sources' zoom ranges.
    pub fn new(sources: Vec<TileSource>) -> Result<Self, SourceError> {
        let first = sources.first().ok_or(SourceError::NoSources)?;
        let mut min_zoom = first.min_zoom;
        let mut max_zoom = first.max_zoom;

        for (index, source) in sources.iter().enumerate() {
            if source.min_zoom > source.max_zoom {
                return Err(SourceError::InvalidZoomRange {
                    index,
                    min: source.min_zoom,
                    max: source.max_zoom,
                });
            }
            min_zoom = min_zoom.max(source.min_zoom);
            max_zoom = max_zoom.min(source.max_zoom);
        }

        if min_zoom > max_zoom {
            return Err(SourceError::DisjointZoomRanges {
                min: min_zoom,
                max: max_zoom,
            });
        }

        Ok(Self {
            sources,
            min_zoom,
            max_zoom,
        })
    }

    /// Convenience for a non-multiplexed layer.
    pub fn single(source: TileSource) -> Result<Self, SourceError> {
        Self::new(vec![source])
    }

    /// Number of frames per tile.
    pub fn depth(&self) -> usize {
        self.sources.len()
    }

    /// Source for a frame.
    pub fn get(&self, frame: FrameIndex) -> Option<&TileSource> {
        self.sources.get(frame as usize)
    }

    /// Lowest zoom served by every source.
    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    /// Highest zoom served by every source.
    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Returns true if every source serves `level`.
    pub fn supports_level(&self, level: u8) -> bool {
        level >= self.min_zoom && level <= self.max_zoom
    }

    /// Iterates over the sources in frame order.
    pub fn iter(&self) -> impl Iterator<Item = &TileSource> {
        self.sources.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_xyz() {
        let source = TileSource::new("http://t/{z}/{x}/{y}.png", 0, 10);
        assert_eq!(source.build_url(&TileId::new(5, 10, 12)), "http://t/5/10/12.png");
    }

    #[test]
    fn test_build_url_tms_flips_row() {
        let source =
            TileSource::new("http://t/{z}/{x}/{y}.png", 0, 10).with_row_order(RowOrder::Tms);
        // 8 rows at level 3: 8 - 2 - 1 = 5
        assert_eq!(source.build_url(&TileId::new(3, 4, 2)), "http://t/3/4/5.png");
    }

    #[test]
    fn test_cache_namespace_named() {
        let source = TileSource::new("http://t/{z}/{x}/{y}", 0, 10).with_name("radar");
        assert_eq!(source.cache_namespace(), "radar");
    }

    #[test]
    fn test_cache_namespace_digest_is_stable_and_distinct() {
        let a = TileSource::new("http://a/{z}/{x}/{y}", 0, 10);
        let b = TileSource::new("http://b/{z}/{x}/{y}", 0, 10);
        assert_eq!(a.cache_namespace(), a.clone().cache_namespace());
        assert_eq!(a.cache_namespace().len(), NAMESPACE_DIGEST_LEN);
        assert_ne!(a.cache_namespace(), b.cache_namespace());
    }

    #[test]
    fn test_source_set_intersects_zoom() {
        let set = SourceSet::new(vec![
            TileSource::new("http://a", 2, 12),
            TileSource::new("http://b", 4, 14),
        ])
        .unwrap();
        assert_eq!(set.depth(), 2);
        assert_eq!(set.min_zoom(), 4);
        assert_eq!(set.max_zoom(), 12);
        assert!(set.supports_level(4));
        assert!(!set.supports_level(13));
    }

    #[test]
    fn test_source_set_rejects_empty() {
        assert_eq!(SourceSet::new(vec![]), Err(SourceError::NoSources));
    }

    #[test]
    fn test_source_set_rejects_disjoint() {
        let result = SourceSet::new(vec![
            TileSource::new("http://a", 0, 3),
            TileSource::new("http://b", 5, 9),
        ]);
        assert_eq!(
            result,
            Err(SourceError::DisjointZoomRanges { min: 5, max: 3 })
        );
    }

    #[test]
    fn test_source_set_rejects_inverted_source() {
        let result = SourceSet::new(vec![TileSource::new("http://a", 9, 3)]);
        assert!(matches!(
            result,
            Err(SourceError::InvalidZoomRange { index: 0, .. })
        ));
    }
}
