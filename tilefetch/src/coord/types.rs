//! Coordinate type definitions

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Lowest zoom level a tile can be requested at.
pub const MIN_LEVEL: u8 = 0;

/// Highest zoom level a tile can be requested at.
///
/// `2^30` rows/columns still fits in a `u32` index.
pub const MAX_LEVEL: u8 = 30;

/// Tile identifier in a quadtree tiling scheme.
///
/// Field order is significant: the derived `Ord` compares by level, then x,
/// then y, which is the iteration order of the tile registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId {
    /// Zoom level
    pub level: u8,
    /// Column, 0 at west
    pub x: u32,
    /// Row, 0 at the origin row of the local scheme
    pub y: u32,
}

impl TileId {
    /// Creates a tile identifier without validation.
    pub const fn new(level: u8, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Number of rows (and columns) at this tile's level.
    #[inline]
    pub fn grid_size(&self) -> u64 {
        1u64 << self.level
    }

    /// Checks that the level is supported and x/y fall inside the grid.
    pub fn validate(&self) -> Result<(), CoordError> {
        if self.level > MAX_LEVEL {
            return Err(CoordError::InvalidLevel(self.level));
        }
        let n = self.grid_size();
        if u64::from(self.x) >= n || u64::from(self.y) >= n {
            return Err(CoordError::OutOfGrid(*self));
        }
        Ok(())
    }

    /// Returns the row counted from the opposite edge (TMS ↔ XYZ).
    ///
    /// Only meaningful for a validated tile.
    #[inline]
    pub fn flip_y(&self) -> u32 {
        (self.grid_size() - 1 - u64::from(self.y)) as u32
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ({},{})", self.level, self.x, self.y)
    }
}

/// Index of one frame within a multiplexed tile.
pub type FrameIndex = u32;

/// Which frames of a tile a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSelector {
    /// Every frame of the tile, reported together.
    All,
    /// One frame, reported on its own.
    Single(FrameIndex),
}

impl FrameSelector {
    /// Textual value used for [`FrameSelector::All`] in configs and the CLI.
    pub const ALL_FRAMES: i64 = -1;

    /// Returns true if the selector covers `frame`.
    pub fn covers(&self, frame: FrameIndex) -> bool {
        match self {
            FrameSelector::All => true,
            FrameSelector::Single(f) => *f == frame,
        }
    }

    /// Returns the single frame, if any.
    pub fn frame(&self) -> Option<FrameIndex> {
        match self {
            FrameSelector::All => None,
            FrameSelector::Single(f) => Some(*f),
        }
    }
}

impl fmt::Display for FrameSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSelector::All => write!(f, "all"),
            FrameSelector::Single(frame) => write!(f, "{}", frame),
        }
    }
}

impl FromStr for FrameSelector {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(FrameSelector::All);
        }
        let value: i64 = s
            .parse()
            .map_err(|_| CoordError::InvalidFrame(s.to_string()))?;
        if value == Self::ALL_FRAMES {
            return Ok(FrameSelector::All);
        }
        FrameIndex::try_from(value)
            .map(FrameSelector::Single)
            .map_err(|_| CoordError::InvalidFrame(s.to_string()))
    }
}

/// Errors for tile and frame identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Level exceeds [`MAX_LEVEL`]
    #[error("Invalid level: {0} (max {max})", max = MAX_LEVEL)]
    InvalidLevel(u8),

    /// Column or row outside the grid for the tile's level
    #[error("Tile {0} is outside the grid for its level")]
    OutOfGrid(TileId),

    /// Frame text is neither a non-negative index nor the all-frames value
    #[error("Invalid frame selector: '{0}'")]
    InvalidFrame(String),
}
