//! Fetch command - load one tile (one frame or all frames) and report it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use clap::Args;
use image::{Rgba, RgbaImage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tilefetch::cache::DiskCacheStore;
use tilefetch::config::ConfigFile;
use tilefetch::coord::{FrameSelector, TileId};
use tilefetch::decode::{Decoder, ImageDecoder, RawDecoder, TileFormat, VectorTileDecoder};
use tilefetch::network::ReqwestClient;
use tilefetch::orchestrator::{FetchOrchestrator, RequestId, TileConsumer, TileData};

use crate::error::CliError;

/// Edge length of the blank raster tile.
const BLANK_TILE_SIZE: u32 = 256;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Zoom level
    pub level: u8,

    /// Tile column
    pub x: u32,

    /// Tile row
    pub y: u32,

    /// Frame to fetch ("all" or a frame index)
    #[arg(long, default_value = "all")]
    pub frame: FrameSelector,

    /// Directory to write the fetched frames into
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Bypass the on-disk cache
    #[arg(long)]
    pub no_cache: bool,

    /// Substitute a transparent tile for raster data that fails to decode
    #[arg(long)]
    pub blank_on_error: bool,

    /// Premultiply alpha of decoded raster tiles
    #[arg(long)]
    pub premultiply: bool,
}

/// Payload types the CLI knows how to describe and save.
trait Artifact: Send + Sync + 'static {
    fn describe(&self) -> String;
    fn save(&self, path: &Path) -> Result<(), String>;
}

impl Artifact for RgbaImage {
    fn describe(&self) -> String {
        format!("{}x{} RGBA", self.width(), self.height())
    }

    fn save(&self, path: &Path) -> Result<(), String> {
        RgbaImage::save(self, path).map_err(|e| e.to_string())
    }
}

impl Artifact for Bytes {
    fn describe(&self) -> String {
        format!("{} bytes", self.len())
    }

    fn save(&self, path: &Path) -> Result<(), String> {
        fs::write(path, self).map_err(|e| e.to_string())
    }
}

enum Outcome<P> {
    Loaded(TileData<P>),
    Failed,
}

/// Forwards orchestrator callbacks to the command's main task.
struct ChannelConsumer<P> {
    tx: mpsc::UnboundedSender<(RequestId, Outcome<P>)>,
}

impl<P: Send + Sync + 'static> TileConsumer<P> for ChannelConsumer<P> {
    fn on_tile_loaded(
        &self,
        request: RequestId,
        _tile: TileId,
        _selector: FrameSelector,
        data: TileData<P>,
    ) {
        let _ = self.tx.send((request, Outcome::Loaded(data)));
    }

    fn on_tile_failed(&self, request: RequestId, _tile: TileId, _selector: FrameSelector) {
        let _ = self.tx.send((request, Outcome::Failed));
    }
}

/// Run the fetch command.
pub fn run(config_path: &Path, args: FetchArgs) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;
    if config.sources.is_empty() {
        return Err(CliError::NoSources(config_path.to_path_buf()));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || interrupt.cancel()) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let tile = TileId::new(args.level, args.x, args.y);
    runtime.block_on(async {
        match config.format() {
            TileFormat::Raster => {
                let decoder = ImageDecoder::new().with_premultiplied_alpha(args.premultiply);
                let blank = args
                    .blank_on_error
                    .then(|| ImageDecoder::blank(BLANK_TILE_SIZE, Rgba([0, 0, 0, 0])));
                fetch_tile(&config, decoder, blank, tile, &args, "png", cancel).await
            }
            TileFormat::Vector => {
                fetch_tile(&config, VectorTileDecoder::new(), None, tile, &args, "mvt", cancel)
                    .await
            }
            TileFormat::Raw => {
                let extension = config.sources[0].extension.clone();
                fetch_tile(&config, RawDecoder::new(), None, tile, &args, &extension, cancel)
                    .await
            }
        }
    })
}

async fn fetch_tile<D>(
    config: &ConfigFile,
    decoder: D,
    blank: Option<D::Payload>,
    tile: TileId,
    args: &FetchArgs,
    extension: &str,
    cancel: CancellationToken,
) -> Result<(), CliError>
where
    D: Decoder + 'static,
    D::Payload: Artifact,
{
    let sources = config.source_set()?;
    let network = ReqwestClient::with_config(config.network.timeout, &config.network.user_agent)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<(RequestId, Outcome<D::Payload>)>();

    let mut builder = FetchOrchestrator::<D::Payload>::builder(
        sources,
        Arc::new(network),
        Arc::new(decoder),
        Arc::new(ChannelConsumer { tx }),
    )
    .config(config.orchestrator_config());
    if let Some(blank) = blank {
        builder = builder.blank_payload(blank);
    }
    match (&config.cache.directory, args.no_cache) {
        (Some(dir), false) => {
            debug!(dir = %dir.display(), "Using disk cache");
            builder = builder.cache(Arc::new(DiskCacheStore::new(dir.clone())));
        }
        _ => debug!("Disk cache disabled"),
    }
    let orchestrator = builder.build()?;

    info!(%tile, selector = %args.frame, depth = orchestrator.depth(), "Fetching tile");
    let request = orchestrator.request_tile(tile, args.frame)?;

    let outcome = tokio::select! {
        received = rx.recv() => received,
        _ = cancel.cancelled() => {
            orchestrator.cancel_tile(tile);
            orchestrator.shutdown().await;
            return Err(CliError::Interrupted);
        }
    };
    orchestrator.shutdown().await;

    let data = match outcome {
        Some((answered, Outcome::Loaded(data))) if answered == request => data,
        _ => return Err(CliError::TileFailed(tile.to_string())),
    };

    let first_frame = match args.frame {
        FrameSelector::Single(frame) => frame,
        FrameSelector::All => 0,
    };
    for (offset, payload) in data.payloads().iter().enumerate() {
        let frame = first_frame + offset as u32;
        println!("{} frame {}: {}", tile, frame, payload.describe());

        if let Some(dir) = &args.output {
            let path = dir.join(format!(
                "{}_{}_{}_{}.{}",
                tile.level, tile.x, tile.y, frame, extension
            ));
            write_artifact(&**payload, &path)?;
        }
    }

    println!();
    println!("{}", orchestrator.metrics());
    Ok(())
}

fn write_artifact<P: Artifact>(payload: &P, path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CliError::FileWrite {
            path: parent.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    payload.save(path).map_err(|error| CliError::FileWrite {
        path: path.to_path_buf(),
        error,
    })?;
    info!(path = %path.display(), "Wrote frame");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_artifact_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("out").join("tile.mvt");

        write_artifact(&Bytes::from_static(b"\x1a\x02"), &path).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"\x1a\x02");
    }

    #[test]
    fn test_image_artifact_is_png() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("tile.png");
        let image = ImageDecoder::blank(4, Rgba([10, 20, 30, 255]));

        write_artifact(&image, &path).unwrap();

        let decoded = ImageDecoder::new().decode(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_describe() {
        assert_eq!(Bytes::from_static(b"abc").describe(), "3 bytes");
        assert_eq!(ImageDecoder::blank(8, Rgba([0, 0, 0, 0])).describe(), "8x8 RGBA");
    }
}
