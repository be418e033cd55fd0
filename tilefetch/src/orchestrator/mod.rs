//! Tile fetch orchestration.
//!
//! Deduplicates and tracks fetches per tile and per frame, multiplexes the
//! frames of a tile into one completion, falls back from cache to network,
//! and delivers each result exactly once to a single consumer.
//!
//! # Architecture
//!
//! ```text
//! request_tile(tile, selector)
//!        │
//!        ▼
//! ┌──────────────────────────────────────────────┐
//! │ TileRegistry (one mutex)                     │
//! │   TileId ─► FrameSet                         │
//! │               slots[frame]: payload | task   │
//! │               waiters: Single(f) | All       │
//! └───────┬──────────────────────────▲───────────┘
//!         │ start (lock released)    │ resolve(tile, frame, task id)
//!         ▼                          │
//!   TileFetchTask ── cache ──► network ── decode
//!                                    │
//!                       deliveries   ▼
//!                  ResultDispatcher ──► TileConsumer (one task, serial)
//! ```
//!
//! A FrameSet is dropped from the registry as soon as none of its tasks is
//! running, whether the last task resolved or was canceled. Completions for
//! tasks that were canceled (or for tiles no longer tracked) are ignored.

mod dispatcher;
mod fetcher;
mod frame_set;
mod registry;
mod task;
mod types;

pub use fetcher::{FetchOrchestrator, FetchOrchestratorBuilder};
pub use task::TaskState;
pub use types::{
    FetchError, FetchOutcome, OrchestratorError, RequestId, TileConsumer, TileData,
};
