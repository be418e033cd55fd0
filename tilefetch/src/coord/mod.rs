//! Tile and frame identifiers
//!
//! A tile is addressed by `(level, x, y)`. Multiplexed layers carry several
//! frames per tile; a [`FrameSelector`] picks one of them or all of them.

mod types;

pub use types::{CoordError, FrameIndex, FrameSelector, TileId, MAX_LEVEL, MIN_LEVEL};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tile_ordering_level_first() {
        let a = TileId::new(2, 3, 3);
        let b = TileId::new(3, 0, 0);
        assert!(a < b);
    }

    #[test]
    fn test_tile_ordering_x_then_y() {
        assert!(TileId::new(3, 1, 7) < TileId::new(3, 2, 0));
        assert!(TileId::new(3, 2, 0) < TileId::new(3, 2, 1));
    }

    #[test]
    fn test_validate_accepts_grid_corners() {
        assert!(TileId::new(0, 0, 0).validate().is_ok());
        assert!(TileId::new(3, 7, 7).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_outside_grid() {
        let tile = TileId::new(3, 8, 0);
        assert_eq!(tile.validate(), Err(CoordError::OutOfGrid(tile)));
    }

    #[test]
    fn test_validate_rejects_level() {
        let tile = TileId::new(31, 0, 0);
        assert_eq!(tile.validate(), Err(CoordError::InvalidLevel(31)));
    }

    #[test]
    fn test_flip_y() {
        // maxY = 1 << level, remote = maxY - y - 1
        assert_eq!(TileId::new(3, 4, 2).flip_y(), 5);
        assert_eq!(TileId::new(0, 0, 0).flip_y(), 0);
        assert_eq!(TileId::new(5, 10, 31).flip_y(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(TileId::new(5, 10, 12).to_string(), "5: (10,12)");
    }

    #[test]
    fn test_frame_selector_parse() {
        assert_eq!("all".parse::<FrameSelector>(), Ok(FrameSelector::All));
        assert_eq!("-1".parse::<FrameSelector>(), Ok(FrameSelector::All));
        assert_eq!("2".parse::<FrameSelector>(), Ok(FrameSelector::Single(2)));
        assert!("-2".parse::<FrameSelector>().is_err());
        assert!("two".parse::<FrameSelector>().is_err());
    }

    #[test]
    fn test_frame_selector_covers() {
        assert!(FrameSelector::All.covers(5));
        assert!(FrameSelector::Single(1).covers(1));
        assert!(!FrameSelector::Single(1).covers(0));
    }

    proptest! {
        #[test]
        fn prop_ordering_matches_tuple(a in (0u8..=20, 0u32..1000, 0u32..1000),
                                       b in (0u8..=20, 0u32..1000, 0u32..1000)) {
            let ta = TileId::new(a.0, a.1, a.2);
            let tb = TileId::new(b.0, b.1, b.2);
            prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
        }

        #[test]
        fn prop_flip_y_is_involution(level in 0u8..=20, y in 0u32..u32::MAX) {
            let y = (u64::from(y) % (1u64 << level)) as u32;
            let tile = TileId::new(level, 0, y);
            let flipped = TileId::new(level, 0, tile.flip_y());
            prop_assert_eq!(flipped.flip_y(), y);
        }
    }
}
