//! Host-facing fetch orchestrator.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::dispatcher::ResultDispatcher;
use super::registry::TileRegistry;
use super::task::{FetchContext, TaskKey, TaskSink, TaskState, TileFetchTask};
use super::types::{FetchOutcome, OrchestratorError, RequestId, TaskId, TileConsumer};
use crate::cache::{CacheStore, TileCacheClient};
use crate::config::OrchestratorConfig;
use crate::coord::{FrameIndex, FrameSelector, TileId};
use crate::decode::Decoder;
use crate::network::NetworkClient;
use crate::source::SourceSet;
use crate::telemetry::{FetchMetrics, TelemetrySnapshot};

/// State shared between the orchestrator handle and its fetch tasks.
///
/// Tasks only hold a `Weak` reference, so dropping the orchestrator frees
/// this even while tasks are still winding down.
struct Shared<P> {
    registry: TileRegistry<P>,
    dispatcher: ResultDispatcher<P>,
    context: RwLock<Option<Arc<FetchContext<P>>>>,
    metrics: Arc<FetchMetrics>,
    shut_down: AtomicBool,
    next_task: AtomicU64,
    runtime: Handle,
}

impl<P: Send + Sync + 'static> Shared<P> {
    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn next_task_id(&self) -> TaskId {
        TaskId(self.next_task.fetch_add(1, Ordering::Relaxed))
    }

    /// Synchronous part of shutdown: refuse new work, cancel every task,
    /// release collaborators and stop delivering. Returns false if shutdown
    /// had already begun.
    fn begin_shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return false;
        }

        let drained = self.registry.lock().drain();
        let mut canceled = 0;
        for mut set in drained {
            canceled += set.cancel_all();
        }
        self.context.write().take();
        self.dispatcher.close();

        info!(canceled_tasks = canceled, "Fetch orchestrator shut down");
        true
    }
}

impl<P: Send + Sync + 'static> TaskSink<P> for Shared<P> {
    fn context(&self) -> Option<Arc<FetchContext<P>>> {
        self.context.read().clone()
    }

    fn resolve(&self, key: TaskKey, outcome: FetchOutcome<P>) {
        let deliveries = {
            let mut registry = self.registry.lock();
            // Never re-create a set for a late completion
            let Some(set) = registry.lookup_mut(&key.tile) else {
                return;
            };
            let Some(deliveries) = set.on_task_resolved(key.frame, key.task, outcome) else {
                return;
            };
            registry.remove_if_idle(&key.tile);
            deliveries
        };
        self.dispatcher.post_all(deliveries);
    }
}

/// Fetches multiplexed tiles and reports them to a [`TileConsumer`].
///
/// Every frame of a tile is fetched at most once at a time, cache first.
/// Each accepted request is answered by at most one consumer callback, made
/// from a single dispatcher task.
///
/// # Example
///
/// ```ignore
/// let orchestrator = FetchOrchestrator::builder(sources, network, decoder, consumer)
///     .cache(Arc::new(DiskCacheStore::new(cache_dir)))
///     .build()?;
///
/// let request = orchestrator.request_tile(TileId::new(5, 17, 11), FrameSelector::All)?;
/// // ... consumer.on_tile_loaded(request, tile, FrameSelector::All, TileData::Frames(..))
///
/// orchestrator.shutdown().await;
/// ```
pub struct FetchOrchestrator<P: Send + Sync + 'static> {
    shared: Arc<Shared<P>>,
    next_request: AtomicU64,
    depth: usize,
    min_zoom: u8,
    max_zoom: u8,
}

impl<P: Send + Sync + 'static> FetchOrchestrator<P> {
    /// Starts building an orchestrator from its required collaborators.
    pub fn builder(
        sources: SourceSet,
        network: Arc<dyn NetworkClient>,
        decoder: Arc<dyn Decoder<Payload = P>>,
        consumer: Arc<dyn TileConsumer<P>>,
    ) -> FetchOrchestratorBuilder<P> {
        FetchOrchestratorBuilder {
            sources,
            network,
            decoder,
            consumer,
            cache: None,
            config: OrchestratorConfig::default(),
            blank: None,
            runtime: None,
        }
    }

    /// Requests one frame or all frames of a tile.
    ///
    /// Frames already resolved or in flight are not fetched again. The
    /// returned id is echoed in the consumer callback answering this
    /// request; an already-resolved single frame is answered right away.
    pub fn request_tile(
        &self,
        tile: TileId,
        selector: FrameSelector,
    ) -> Result<RequestId, OrchestratorError> {
        if self.shared.is_shut_down() {
            return Err(OrchestratorError::ShutDown);
        }
        tile.validate()?;
        if tile.level < self.min_zoom || tile.level > self.max_zoom {
            return Err(OrchestratorError::UnsupportedZoom {
                level: tile.level,
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if let FrameSelector::Single(frame) = selector {
            if frame as usize >= self.depth {
                return Err(OrchestratorError::InvalidFrame {
                    frame,
                    depth: self.depth,
                });
            }
        }

        let weak = Arc::downgrade(&self.shared);
        let sink: Weak<dyn TaskSink<P>> = weak;
        let mut tasks = Vec::new();

        let (request, deliveries) = {
            let mut registry = self.shared.registry.lock();
            // Checked again under the lock: shutdown drains the registry
            // under this same lock after setting the flag.
            if self.shared.is_shut_down() {
                return Err(OrchestratorError::ShutDown);
            }
            let request = RequestId(self.next_request.fetch_add(1, Ordering::Relaxed));

            let set = registry.get_or_create(tile, self.depth);
            for frame in set.frames_to_fetch(selector) {
                let task = TileFetchTask::new(
                    tile,
                    frame,
                    self.shared.next_task_id(),
                    sink.clone(),
                    Arc::clone(&self.shared.metrics),
                );
                set.attach_task(frame, task.handle().clone());
                tasks.push(task);
            }
            let deliveries = set.add_waiter(request, selector);
            registry.remove_if_idle(&tile);
            (request, deliveries)
        };

        self.shared.metrics.request_accepted();
        if tasks.is_empty() {
            self.shared.metrics.request_deduplicated();
        }
        debug!(%tile, %selector, %request, new_tasks = tasks.len(), "Tile requested");

        for task in tasks {
            task.start(&self.shared.runtime);
        }
        self.shared.dispatcher.post_all(deliveries);
        Ok(request)
    }

    /// Cancels every frame of a tile. Pending requests for it get no
    /// callback. Unknown tiles are ignored.
    pub fn cancel_tile(&self, tile: TileId) {
        let mut registry = self.shared.registry.lock();
        if let Some(set) = registry.lookup_mut(&tile) {
            let canceled = set.cancel_all();
            registry.remove_if_idle(&tile);
            debug!(%tile, canceled, "Tile canceled");
        }
    }

    /// Cancels one frame of a tile, dropping the requests that depend on it
    /// (single-frame requests for `frame` and all-frames requests).
    pub fn cancel_frame(&self, tile: TileId, frame: FrameIndex) {
        let mut registry = self.shared.registry.lock();
        if let Some(set) = registry.lookup_mut(&tile) {
            let canceled = set.cancel_frame(frame);
            registry.remove_if_idle(&tile);
            debug!(%tile, frame, canceled, "Frame canceled");
        }
    }

    /// Cancels all work and stops the dispatcher.
    ///
    /// Idempotent. Completions arriving afterwards are discarded and no
    /// further callbacks are made. Must not be awaited from inside a
    /// consumer callback.
    pub async fn shutdown(&self) {
        self.shared.begin_shutdown();
        self.shared.dispatcher.shutdown().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shut_down()
    }

    /// Tiles with work in flight, in `TileId` order.
    pub fn tracked_tiles(&self) -> Vec<TileId> {
        self.shared.registry.lock().tiles()
    }

    /// Frames of `tile` with a running fetch.
    pub fn active_frames(&self, tile: TileId) -> Vec<FrameIndex> {
        self.shared
            .registry
            .lock()
            .lookup(&tile)
            .map(|set| set.active_frames())
            .unwrap_or_default()
    }

    /// State of the running fetch for one frame of `tile`, if any.
    pub fn task_state(&self, tile: TileId, frame: FrameIndex) -> Option<TaskState> {
        self.shared
            .registry
            .lock()
            .lookup(&tile)
            .and_then(|set| set.task_state(frame))
    }

    /// Number of frames per tile.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn metrics(&self) -> TelemetrySnapshot {
        self.shared.metrics.snapshot()
    }
}

impl<P: Send + Sync + 'static> Drop for FetchOrchestrator<P> {
    fn drop(&mut self) {
        self.shared.begin_shutdown();
    }
}

/// Builder for [`FetchOrchestrator`].
pub struct FetchOrchestratorBuilder<P> {
    sources: SourceSet,
    network: Arc<dyn NetworkClient>,
    decoder: Arc<dyn Decoder<Payload = P>>,
    consumer: Arc<dyn TileConsumer<P>>,
    cache: Option<Arc<dyn CacheStore>>,
    config: OrchestratorConfig,
    blank: Option<P>,
    runtime: Option<Handle>,
}

impl<P: Send + Sync + 'static> FetchOrchestratorBuilder<P> {
    /// Enables the cache: probed before the network, written after it.
    pub fn cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Payload delivered in place of tiles that fail to decode.
    pub fn blank_payload(mut self, blank: P) -> Self {
        self.blank = Some(blank);
        self
    }

    /// Runtime for fetch tasks and the dispatcher. Defaults to the current
    /// runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the orchestrator and starts its dispatcher.
    pub fn build(self) -> Result<FetchOrchestrator<P>, OrchestratorError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| OrchestratorError::NoRuntime)?,
        };

        let metrics = Arc::new(FetchMetrics::new());
        let cache = self
            .cache
            .map(|store| TileCacheClient::with_metrics(store, Arc::clone(&metrics)));
        let depth = self.sources.depth();
        let min_zoom = self.sources.min_zoom();
        let max_zoom = self.sources.max_zoom();

        let context = FetchContext {
            sources: self.sources,
            network: self.network,
            cache,
            decoder: self.decoder,
            config: self.config,
            blank: self.blank.map(Arc::new),
            metrics: Arc::clone(&metrics),
        };

        let dispatcher = ResultDispatcher::spawn(self.consumer, Arc::clone(&metrics), &runtime);
        let shared = Arc::new(Shared {
            registry: TileRegistry::new(),
            dispatcher,
            context: RwLock::new(Some(Arc::new(context))),
            metrics,
            shut_down: AtomicBool::new(false),
            next_task: AtomicU64::new(1),
            runtime,
        });

        debug!(depth, min_zoom, max_zoom, "Fetch orchestrator started");
        Ok(FetchOrchestrator {
            shared,
            next_request: AtomicU64::new(1),
            depth,
            min_zoom,
            max_zoom,
        })
    }
}
