//! Serialized result delivery.
//!
//! Fetch completions happen on arbitrary runtime workers. Every consumer
//! callback instead goes through one channel drained by one task, so the
//! consumer sees calls one at a time, in posting order.
//!
//! ```text
//! request_tile ─┐
//! task resolve ─┼──► mpsc (unbounded) ──► dispatcher task ──► TileConsumer
//! task resolve ─┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::types::{RequestId, TileConsumer, TileData};
use crate::coord::{FrameSelector, TileId};
use crate::telemetry::FetchMetrics;

/// One consumer callback, ready to be made.
pub(crate) enum Delivery<P> {
    Loaded {
        request: RequestId,
        tile: TileId,
        selector: FrameSelector,
        data: TileData<P>,
    },
    Failed {
        request: RequestId,
        tile: TileId,
        selector: FrameSelector,
    },
}

impl<P> Delivery<P> {
    pub fn request(&self) -> RequestId {
        match self {
            Delivery::Loaded { request, .. } | Delivery::Failed { request, .. } => *request,
        }
    }

    fn deliver(self, consumer: &dyn TileConsumer<P>, metrics: &FetchMetrics) {
        match self {
            Delivery::Loaded {
                request,
                tile,
                selector,
                data,
            } => {
                metrics.tile_loaded();
                trace!(%request, %tile, %selector, frames = data.len(), "Delivering tile");
                consumer.on_tile_loaded(request, tile, selector, data);
            }
            Delivery::Failed {
                request,
                tile,
                selector,
            } => {
                metrics.tile_failed();
                trace!(%request, %tile, %selector, "Delivering tile failure");
                consumer.on_tile_failed(request, tile, selector);
            }
        }
    }
}

/// Owns the delivery channel and the task draining it.
pub(crate) struct ResultDispatcher<P> {
    tx: Mutex<Option<mpsc::UnboundedSender<Delivery<P>>>>,
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<P: Send + Sync + 'static> ResultDispatcher<P> {
    /// Starts the dispatcher task on `runtime`.
    pub fn spawn(
        consumer: Arc<dyn TileConsumer<P>>,
        metrics: Arc<FetchMetrics>,
        runtime: &Handle,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<P>>();
        let closed = Arc::new(AtomicBool::new(false));

        let worker_closed = Arc::clone(&closed);
        let worker = runtime.spawn(async move {
            while let Some(delivery) = rx.recv().await {
                if worker_closed.load(Ordering::Acquire) {
                    continue;
                }
                delivery.deliver(consumer.as_ref(), &metrics);
            }
            debug!("Result dispatcher stopped");
        });

        Self {
            tx: Mutex::new(Some(tx)),
            closed,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues one delivery. Dropped silently once closed.
    pub fn post(&self, delivery: Delivery<P>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(delivery);
        }
    }

    pub fn post_all(&self, deliveries: impl IntoIterator<Item = Delivery<P>>) {
        for delivery in deliveries {
            self.post(delivery);
        }
    }

    /// Stops accepting and delivering. Queued deliveries are discarded.
    ///
    /// Synchronous half of [`ResultDispatcher::shutdown`], safe to call
    /// from `Drop`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.tx.lock().take();
    }

    /// Closes the channel and waits for the dispatcher task to exit.
    ///
    /// A callback already running completes first. Must not be awaited from
    /// inside a consumer callback.
    pub async fn shutdown(&self) {
        self.close();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}
