//! Orchestrator types and errors

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::coord::{CoordError, FrameIndex, FrameSelector, TileId};
use crate::decode::DecodeError;

/// Identifies one accepted `request_tile` call.
///
/// Echoed back in the consumer callback answering that request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    /// Raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Identifies one fetch task instance.
///
/// A frame that is canceled and requested again gets a new task with a new
/// id, so completions of the old task can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Why a frame fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection failure or unexpected HTTP status. Never retried.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server definitively has no such tile (HTTP 404).
    #[error("Tile not found")]
    NotFound,

    /// The payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Terminal result of one frame fetch.
///
/// `Canceled` is not an error: it is never reported to the consumer.
#[derive(Debug, Clone)]
pub enum FetchOutcome<P> {
    Success(Arc<P>),
    Failure(FetchError),
    Canceled,
}

impl<P> FetchOutcome<P> {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, FetchOutcome::Canceled)
    }
}

/// Errors returned synchronously by the orchestrator API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The orchestrator has been shut down
    #[error("Orchestrator is shut down")]
    ShutDown,

    /// Coordinates outside the tiling scheme
    #[error("Invalid tile: {0}")]
    InvalidTile(#[from] CoordError),

    /// Level outside the zoom range served by every source
    #[error("Zoom level {level} not served (sources cover {min}..={max})")]
    UnsupportedZoom { level: u8, min: u8, max: u8 },

    /// Frame index not below the multiplex depth
    #[error("Frame {frame} out of range for depth {depth}")]
    InvalidFrame { frame: FrameIndex, depth: usize },

    /// `build()` was called outside a tokio runtime without an explicit handle
    #[error("No tokio runtime available")]
    NoRuntime,
}

/// Data delivered for a successful request.
#[derive(Debug)]
pub enum TileData<P> {
    /// Payload of the one requested frame.
    Single(Arc<P>),
    /// Payloads of every frame, in frame order.
    Frames(Vec<Arc<P>>),
}

impl<P> Clone for TileData<P> {
    fn clone(&self) -> Self {
        match self {
            TileData::Single(p) => TileData::Single(Arc::clone(p)),
            TileData::Frames(frames) => TileData::Frames(frames.clone()),
        }
    }
}

impl<P> TileData<P> {
    /// Number of frames carried.
    pub fn len(&self) -> usize {
        match self {
            TileData::Single(_) => 1,
            TileData::Frames(frames) => frames.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payloads in frame order.
    pub fn payloads(&self) -> Vec<Arc<P>> {
        match self {
            TileData::Single(p) => vec![Arc::clone(p)],
            TileData::Frames(frames) => frames.clone(),
        }
    }
}

/// Receives tile results.
///
/// Calls are made one at a time from a single dispatcher task, never
/// concurrently. Every accepted request gets at most one call: exactly one
/// unless it is canceled or the orchestrator shuts down first.
///
/// Implementations should return quickly; a slow consumer delays every
/// following delivery.
pub trait TileConsumer<P>: Send + Sync {
    /// The requested frame(s) resolved successfully.
    fn on_tile_loaded(
        &self,
        request: RequestId,
        tile: TileId,
        selector: FrameSelector,
        data: TileData<P>,
    );

    /// The requested frame (or at least one frame of an all-frames request)
    /// failed.
    fn on_tile_failed(&self, request: RequestId, tile: TileId, selector: FrameSelector);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_from_decode() {
        let err: FetchError = DecodeError::Empty.into();
        assert_eq!(err, FetchError::Decode(DecodeError::Empty));
        assert_eq!(err.to_string(), "Decode error: Empty payload");
    }

    #[test]
    fn test_orchestrator_error_from_coord() {
        let err: OrchestratorError = CoordError::InvalidLevel(40).into();
        assert!(matches!(err, OrchestratorError::InvalidTile(_)));
    }

    #[test]
    fn test_tile_data_payloads() {
        let data = TileData::Frames(vec![Arc::new(1u8), Arc::new(2u8)]);
        assert_eq!(data.len(), 2);
        let values: Vec<u8> = data.payloads().iter().map(|p| **p).collect();
        assert_eq!(values, vec![1, 2]);

        let single = TileData::Single(Arc::new(7u8));
        assert_eq!(single.len(), 1);
        assert!(!single.is_empty());
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(FetchOutcome::Success(Arc::new(())).is_success());
        assert!(FetchOutcome::<()>::Canceled.is_canceled());
        assert!(!FetchOutcome::<()>::Failure(FetchError::NotFound).is_success());
    }
}
