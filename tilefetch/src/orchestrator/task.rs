//! Tile fetch task: one outstanding fetch for one frame of one tile.
//!
//! ```text
//! Pending ──► CacheLookup ──┬──────────────────────► Completed
//!                           │ (miss / undecodable)
//!                           └──► NetworkInFlight ──► Completed
//!
//! cancel() from any state ──► Canceled
//! ```
//!
//! A task never touches orchestrator state directly. It holds a weak link to
//! a [`TaskSink`] and reports its outcome once, keyed by `(tile, frame,
//! task id)`. The sink ignores keys that no longer match an active slot.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::types::{FetchError, FetchOutcome, TaskId};
use crate::cache::TileCacheClient;
use crate::config::OrchestratorConfig;
use crate::coord::{FrameIndex, TileId};
use crate::decode::{DecodeError, Decoder};
use crate::network::{NetworkClient, NetworkError};
use crate::source::SourceSet;
use crate::telemetry::FetchMetrics;

/// Lifecycle state of a fetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Pending = 0,
    CacheLookup = 1,
    NetworkInFlight = 2,
    Completed = 3,
    Canceled = 4,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Pending,
            1 => TaskState::CacheLookup,
            2 => TaskState::NetworkInFlight,
            3 => TaskState::Completed,
            _ => TaskState::Canceled,
        }
    }

    /// Returns true once the task can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Canceled)
    }
}

/// Identity of a task as seen by its frame set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaskKey {
    pub tile: TileId,
    pub frame: FrameIndex,
    pub task: TaskId,
}

/// Collaborators shared by every task of one orchestrator.
pub(crate) struct FetchContext<P> {
    pub sources: SourceSet,
    pub network: Arc<dyn NetworkClient>,
    pub cache: Option<TileCacheClient>,
    pub decoder: Arc<dyn Decoder<Payload = P>>,
    pub config: OrchestratorConfig,
    pub blank: Option<Arc<P>>,
    pub metrics: Arc<FetchMetrics>,
}

/// Where tasks get their collaborators and report their outcome.
pub(crate) trait TaskSink<P>: Send + Sync {
    /// Current collaborators, or `None` once shut down.
    fn context(&self) -> Option<Arc<FetchContext<P>>>;

    /// Applies a task outcome. Stale keys are ignored.
    fn resolve(&self, key: TaskKey, outcome: FetchOutcome<P>);
}

/// Cancel handle and state of a task, owned by its frame set slot.
#[derive(Debug, Clone)]
pub(crate) struct TaskHandle {
    id: TaskId,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
}

impl TaskHandle {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            cancel: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(TaskState::Pending as u8)),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Marks the task canceled and signals any in-flight network call.
    pub fn cancel(&self) {
        self.state.store(TaskState::Canceled as u8, Ordering::Release);
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_state(&self, state: TaskState) {
        // Canceled is sticky
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != TaskState::Canceled as u8).then_some(state as u8)
            });
    }
}

/// One fetch for one `(tile, frame)`.
///
/// `start` consumes the task, so it runs at most once.
pub(crate) struct TileFetchTask<P> {
    key: TaskKey,
    handle: TaskHandle,
    sink: Weak<dyn TaskSink<P>>,
    metrics: Arc<FetchMetrics>,
}

impl<P: Send + Sync + 'static> TileFetchTask<P> {
    pub fn new(
        tile: TileId,
        frame: FrameIndex,
        id: TaskId,
        sink: Weak<dyn TaskSink<P>>,
        metrics: Arc<FetchMetrics>,
    ) -> Self {
        Self {
            key: TaskKey {
                tile,
                frame,
                task: id,
            },
            handle: TaskHandle::new(id),
            sink,
            metrics,
        }
    }

    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    /// Spawns the fetch on `runtime`.
    pub fn start(self, runtime: &Handle) {
        self.metrics.task_started();
        runtime.spawn(self.run());
    }

    async fn run(self) {
        let outcome = if self.handle.is_canceled() {
            FetchOutcome::Canceled
        } else {
            match self.sink.upgrade().and_then(|sink| sink.context()) {
                Some(ctx) => self.fetch(&ctx).await,
                None => FetchOutcome::Canceled,
            }
        };
        self.finish(outcome);
    }

    async fn fetch(&self, ctx: &FetchContext<P>) -> FetchOutcome<P> {
        let TaskKey { tile, frame, .. } = self.key;
        let verbose = ctx.config.debug_output();

        let Some(source) = ctx.sources.get(frame) else {
            return FetchOutcome::Failure(FetchError::Transport(format!(
                "no source for frame {}",
                frame
            )));
        };

        // Cache first
        if let Some(cache) = &ctx.cache {
            self.handle.set_state(TaskState::CacheLookup);
            if let Some(bytes) = cache.get(source, &tile, frame).await {
                match decode_blocking(&ctx.decoder, Bytes::from(bytes)).await {
                    Ok(payload) => {
                        if verbose {
                            info!(tile = %tile, frame, "Loaded tile from cache");
                        } else {
                            debug!(tile = %tile, frame, "Loaded tile from cache");
                        }
                        return FetchOutcome::Success(Arc::new(payload));
                    }
                    Err(e) => {
                        warn!(
                            tile = %tile,
                            frame,
                            error = %e,
                            "Cached tile undecodable, refetching"
                        );
                    }
                }
            }
        }

        if self.handle.is_canceled() {
            return FetchOutcome::Canceled;
        }

        self.handle.set_state(TaskState::NetworkInFlight);
        let url = source.build_url(&tile);
        ctx.metrics.network_request();
        if verbose {
            info!(url = %url, frame, "Fetching tile");
        } else {
            debug!(url = %url, frame, "Fetching tile");
        }

        let response = match ctx.network.fetch(&url, &self.handle.cancel).await {
            Ok(response) => response,
            Err(NetworkError::Canceled) => return FetchOutcome::Canceled,
            Err(NetworkError::Transport(msg)) => {
                ctx.metrics.transport_error();
                warn!(url = %url, error = %msg, "Tile fetch failed");
                return FetchOutcome::Failure(FetchError::Transport(msg));
            }
        };

        // Clients may answer after the token fired; nothing below may be
        // persisted for a canceled task
        if self.handle.is_canceled() {
            return FetchOutcome::Canceled;
        }

        if response.is_not_found() {
            ctx.metrics.not_found();
            debug!(url = %url, "Tile not found");
            return FetchOutcome::Failure(FetchError::NotFound);
        }
        if !response.is_success() {
            ctx.metrics.transport_error();
            warn!(url = %url, status = response.status, "Unexpected HTTP status");
            return FetchOutcome::Failure(FetchError::Transport(format!(
                "HTTP {}",
                response.status
            )));
        }
        ctx.metrics.bytes_downloaded(response.body.len());

        match decode_blocking(&ctx.decoder, response.body.clone()).await {
            Ok(payload) => {
                if ctx.config.persist_to_cache() && !self.handle.is_canceled() {
                    if let Some(cache) = &ctx.cache {
                        cache.set(source, &tile, frame, response.body.to_vec()).await;
                    }
                }
                FetchOutcome::Success(Arc::new(payload))
            }
            Err(e) => {
                ctx.metrics.decode_error();
                match &ctx.blank {
                    Some(blank) => {
                        warn!(url = %url, error = %e, "Tile failed to decode, using blank tile");
                        FetchOutcome::Success(Arc::clone(blank))
                    }
                    None => {
                        warn!(url = %url, error = %e, "Tile failed to decode");
                        FetchOutcome::Failure(FetchError::Decode(e))
                    }
                }
            }
        }
    }

    /// Single exit point: checks the cancel flag once, then reports once.
    fn finish(self, outcome: FetchOutcome<P>) {
        self.metrics.task_finished();
        let canceled = self.handle.is_canceled();

        if canceled || outcome.is_canceled() {
            self.handle.set_state(TaskState::Canceled);
            self.metrics.task_canceled();
            trace!(tile = %self.key.tile, frame = self.key.frame, "Fetch task canceled");
        } else {
            self.handle.set_state(TaskState::Completed);
        }

        // The slot released this task when it was canceled
        if canceled {
            return;
        }
        if let Some(sink) = self.sink.upgrade() {
            sink.resolve(self.key, outcome);
        }
    }
}

/// Decodes on the blocking pool; image decoding and inflating are CPU-bound
/// and must not hold a runtime worker.
async fn decode_blocking<P: Send + Sync + 'static>(
    decoder: &Arc<dyn Decoder<Payload = P>>,
    data: Bytes,
) -> Result<P, DecodeError> {
    let decoder = Arc::clone(decoder);
    tokio::task::spawn_blocking(move || decoder.decode(&data))
        .await
        .map_err(|e| DecodeError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, CacheStore, MemoryCacheStore};
    use crate::decode::RawDecoder;
    use crate::network::{FetchResponse, MockNetworkClient};
    use crate::source::TileSource;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    const URL: &str = "http://tiles.test/radar/3/1/2.png";

    struct RecordingSink {
        context: Mutex<Option<Arc<FetchContext<Bytes>>>>,
        tx: mpsc::UnboundedSender<(TaskKey, FetchOutcome<Bytes>)>,
    }

    impl TaskSink<Bytes> for RecordingSink {
        fn context(&self) -> Option<Arc<FetchContext<Bytes>>> {
            self.context.lock().clone()
        }

        fn resolve(&self, key: TaskKey, outcome: FetchOutcome<Bytes>) {
            let _ = self.tx.send((key, outcome));
        }
    }

    struct Fixture {
        sink: Arc<RecordingSink>,
        rx: mpsc::UnboundedReceiver<(TaskKey, FetchOutcome<Bytes>)>,
        network: Arc<MockNetworkClient>,
        store: Arc<MemoryCacheStore>,
        metrics: Arc<FetchMetrics>,
    }

    fn source() -> TileSource {
        TileSource::new("http://tiles.test/radar/{z}/{x}/{y}.png", 0, 10).with_name("radar")
    }

    fn fixture(config: OrchestratorConfig, blank: Option<Bytes>) -> Fixture {
        fixture_with_decoder(config, blank, Arc::new(RawDecoder::new()))
    }

    fn fixture_with_decoder(
        config: OrchestratorConfig,
        blank: Option<Bytes>,
        decoder: Arc<dyn Decoder<Payload = Bytes>>,
    ) -> Fixture {
        let network = Arc::new(MockNetworkClient::new());
        let store = Arc::new(MemoryCacheStore::new());
        let metrics = Arc::new(FetchMetrics::new());
        let context = FetchContext {
            sources: SourceSet::single(source()).unwrap(),
            network: network.clone(),
            cache: Some(TileCacheClient::with_metrics(
                store.clone(),
                Arc::clone(&metrics),
            )),
            decoder,
            config,
            blank: blank.map(Arc::new),
            metrics: Arc::clone(&metrics),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(RecordingSink {
            context: Mutex::new(Some(Arc::new(context))),
            tx,
        });
        Fixture {
            sink,
            rx,
            network,
            store,
            metrics,
        }
    }

    fn task(f: &Fixture) -> TileFetchTask<Bytes> {
        let weak = Arc::downgrade(&f.sink);
        let sink: Weak<dyn TaskSink<Bytes>> = weak;
        TileFetchTask::new(TileId::new(3, 1, 2), 0, TaskId(1), sink, Arc::clone(&f.metrics))
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let mut f = fixture(OrchestratorConfig::default(), None);
        let key = CacheKey::for_frame(&source(), &TileId::new(3, 1, 2), 0);
        f.store.write(&key, vec![5, 5]).await.unwrap();

        let task = task(&f);
        let handle = task.handle().clone();
        task.start(&Handle::current());

        let (key, outcome) = f.rx.recv().await.unwrap();
        assert_eq!(key.task, TaskId(1));
        match outcome {
            FetchOutcome::Success(p) => assert_eq!(&p[..], &[5, 5]),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(f.network.call_count(), 0);
        assert_eq!(handle.state(), TaskState::Completed);
    }

    #[tokio::test]
    async fn test_network_success_persists_to_cache() {
        let mut f = fixture(OrchestratorConfig::default(), None);
        f.network
            .respond(URL, Ok(FetchResponse::new(200, vec![1, 2, 3])));

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        assert!(outcome.is_success());
        let key = CacheKey::for_frame(&source(), &TileId::new(3, 1, 2), 0);
        assert_eq!(f.store.read(&key).await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_persistence_disabled_skips_cache_write() {
        let config = OrchestratorConfig::default().with_persist_to_cache(false);
        let mut f = fixture(config, None);
        f.network
            .respond(URL, Ok(FetchResponse::new(200, vec![1, 2, 3])));

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        assert!(outcome.is_success());
        let key = CacheKey::for_frame(&source(), &TileId::new(3, 1, 2), 0);
        assert_eq!(f.store.read(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_not_found_is_failure_without_cache_write() {
        let mut f = fixture(OrchestratorConfig::default(), None);

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Failure(FetchError::NotFound)));
        assert_eq!(f.network.calls_for(URL), 1);
        assert_eq!(f.store.entry_count(), 0);
        assert_eq!(f.metrics.snapshot().not_found, 1);
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let mut f = fixture(OrchestratorConfig::default(), None);
        f.network.respond(URL, Ok(FetchResponse::new(503, vec![])));

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Failure(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_decode_failure_without_blank() {
        let mut f = fixture(OrchestratorConfig::default(), None);
        f.network.respond(URL, Ok(FetchResponse::new(200, vec![])));

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Failure(FetchError::Decode(_))));
        assert_eq!(f.metrics.snapshot().decode_errors, 1);
    }

    #[tokio::test]
    async fn test_decode_failure_uses_blank_and_skips_cache() {
        let mut f = fixture(OrchestratorConfig::default(), Some(Bytes::from_static(b"blank")));
        f.network.respond(URL, Ok(FetchResponse::new(200, vec![])));

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        match outcome {
            FetchOutcome::Success(p) => assert_eq!(&p[..], b"blank"),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(f.store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_falls_back_to_network() {
        let mut f = fixture(OrchestratorConfig::default(), None);
        let key = CacheKey::for_frame(&source(), &TileId::new(3, 1, 2), 0);
        f.store.write(&key, Vec::new()).await.unwrap();
        f.network.respond(URL, Ok(FetchResponse::new(200, vec![4])));

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(f.network.call_count(), 1);
    }

    struct PanickingDecoder;

    impl Decoder for PanickingDecoder {
        type Payload = Bytes;

        fn decode(&self, _data: &[u8]) -> Result<Bytes, DecodeError> {
            panic!("decoder bug");
        }
    }

    #[tokio::test]
    async fn test_panicking_decoder_fails_task_without_cache_write() {
        let mut f = fixture_with_decoder(
            OrchestratorConfig::default(),
            None,
            Arc::new(PanickingDecoder),
        );
        f.network.respond(URL, Ok(FetchResponse::new(200, vec![1])));

        task(&f).start(&Handle::current());

        let (_, outcome) = f.rx.recv().await.unwrap();
        assert!(matches!(
            outcome,
            FetchOutcome::Failure(FetchError::Decode(DecodeError::Aborted(_)))
        ));
        assert_eq!(f.store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_canceled_task_reports_nothing() {
        let mut f = fixture(OrchestratorConfig::default(), None);
        f.network
            .respond(URL, Ok(FetchResponse::new(200, vec![1])));

        let task = task(&f);
        let handle = task.handle().clone();
        handle.cancel();
        task.start(&Handle::current());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(f.sink);
        assert!(f.rx.recv().await.is_none());
        assert_eq!(handle.state(), TaskState::Canceled);
        assert_eq!(f.network.call_count(), 0);
    }

    #[test]
    fn test_canceled_state_is_sticky() {
        let handle = TaskHandle::new(TaskId(9));
        assert_eq!(handle.state(), TaskState::Pending);
        handle.cancel();
        handle.set_state(TaskState::NetworkInFlight);
        assert_eq!(handle.state(), TaskState::Canceled);
        assert!(handle.state().is_terminal());
    }
}
