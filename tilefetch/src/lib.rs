//! tilefetch - multiplexed map tile fetching
//!
//! Fetches map tiles for layers that carry several frames per tile (for
//! example an animated radar loop), with:
//! - One fetch per `(tile, frame)` no matter how many requests overlap
//! - Cache first, network second, with optional write-back
//! - Cancellation of single frames or whole tiles at any time
//! - Exactly one result per request, delivered serially to one consumer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use tilefetch::coord::{FrameSelector, TileId};
//! use tilefetch::decode::RawDecoder;
//! use tilefetch::network::ReqwestClient;
//! use tilefetch::orchestrator::{FetchOrchestrator, RequestId, TileConsumer, TileData};
//! use tilefetch::source::{SourceSet, TileSource};
//!
//! struct Printer;
//!
//! impl TileConsumer<Bytes> for Printer {
//!     fn on_tile_loaded(
//!         &self,
//!         request: RequestId,
//!         tile: TileId,
//!         _selector: FrameSelector,
//!         data: TileData<Bytes>,
//!     ) {
//!         println!("{request}: {tile} loaded ({} frames)", data.len());
//!     }
//!
//!     fn on_tile_failed(&self, request: RequestId, tile: TileId, _selector: FrameSelector) {
//!         println!("{request}: {tile} failed");
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = TileSource::new("https://tiles.example.com/{z}/{x}/{y}.png", 0, 12);
//! let sources = SourceSet::single(source)?;
//! let network = Arc::new(ReqwestClient::new()?);
//!
//! let orchestrator = FetchOrchestrator::builder(
//!     sources,
//!     network,
//!     Arc::new(RawDecoder::new()),
//!     Arc::new(Printer),
//! )
//! .build()?;
//!
//! orchestrator.request_tile(TileId::new(3, 4, 2), FrameSelector::All)?;
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod decode;
pub mod logging;
pub mod network;
pub mod orchestrator;
pub mod source;
pub mod telemetry;

pub use coord::{FrameIndex, FrameSelector, TileId};
pub use orchestrator::{
    FetchError, FetchOrchestrator, FetchOutcome, OrchestratorError, RequestId, TileConsumer,
    TileData,
};
