//! Per-tile frame multiplexing.
//!
//! A [`FrameSet`] tracks every frame of one tile: the resolved payload (if
//! any), the active fetch task (if any) and the requests waiting on them.
//!
//! ```text
//! slot 0: [payload]  task: -         waiters: Single(0) ─► reported on resolve
//! slot 1: [   -   ]  task: #17       waiters: All       ─► reported when no
//! slot 2: [   -   ]  task: #18                              task is active
//! ```
//!
//! All methods run under the registry lock. Methods return the deliveries
//! they produce instead of posting them, so posting happens after the lock
//! is released.

use std::sync::Arc;

use tracing::trace;

use super::dispatcher::Delivery;
use super::task::{TaskHandle, TaskState};
use super::types::{FetchOutcome, RequestId, TaskId, TileData};
use crate::coord::{FrameIndex, FrameSelector, TileId};

struct Slot<P> {
    payload: Option<Arc<P>>,
    task: Option<TaskHandle>,
}

impl<P> Slot<P> {
    fn empty() -> Self {
        Self {
            payload: None,
            task: None,
        }
    }
}

/// One accepted request that has not been reported yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Waiter {
    request: RequestId,
    selector: FrameSelector,
}

/// All frames of one tile.
pub(crate) struct FrameSet<P> {
    tile: TileId,
    slots: Vec<Slot<P>>,
    active_tasks: usize,
    waiters: Vec<Waiter>,
}

impl<P> FrameSet<P> {
    pub fn new(tile: TileId, depth: usize) -> Self {
        Self {
            tile,
            slots: (0..depth).map(|_| Slot::empty()).collect(),
            active_tasks: 0,
            waiters: Vec::new(),
        }
    }

    pub fn tile(&self) -> TileId {
        self.tile
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn active_tasks(&self) -> usize {
        self.active_tasks
    }

    /// No task of this set is running; the registry drops idle sets.
    pub fn is_idle(&self) -> bool {
        self.active_tasks == 0
    }

    /// Every frame holds a payload.
    pub fn is_done(&self) -> bool {
        self.slots.iter().all(|slot| slot.payload.is_some())
    }

    /// Frames with a running task, in frame order.
    pub fn active_frames(&self) -> Vec<FrameIndex> {
        self.frames()
            .filter(|&frame| self.slot(frame).is_some_and(|slot| slot.task.is_some()))
            .collect()
    }

    /// State of the running task for `frame`, if any.
    pub fn task_state(&self, frame: FrameIndex) -> Option<TaskState> {
        self.slot(frame)
            .and_then(|slot| slot.task.as_ref())
            .map(TaskHandle::state)
    }

    /// Frames the selector covers that have neither a payload nor a task.
    ///
    /// Frames already in flight are left alone, so at most one task exists
    /// per `(tile, frame)`.
    pub fn frames_to_fetch(&self, selector: FrameSelector) -> Vec<FrameIndex> {
        self.frames()
            .filter(|&frame| selector.covers(frame))
            .filter(|&frame| {
                self.slot(frame)
                    .is_some_and(|slot| slot.payload.is_none() && slot.task.is_none())
            })
            .collect()
    }

    /// Records a newly created task for `frame`.
    pub fn attach_task(&mut self, frame: FrameIndex, handle: TaskHandle) {
        if let Some(slot) = self.slots.get_mut(frame as usize) {
            debug_assert!(slot.task.is_none(), "frame already has a task");
            if slot.task.replace(handle).is_none() {
                self.active_tasks += 1;
            }
        }
    }

    /// Registers a request, reporting it at once if it is already satisfied.
    pub fn add_waiter(
        &mut self,
        request: RequestId,
        selector: FrameSelector,
    ) -> Vec<Delivery<P>> {
        let waiter = Waiter { request, selector };
        let ready = match selector {
            FrameSelector::Single(frame) => self
                .slot(frame)
                .and_then(|slot| slot.payload.clone())
                .map(|payload| self.loaded(waiter, TileData::Single(payload))),
            FrameSelector::All if self.is_idle() && self.is_done() => {
                Some(self.loaded(waiter, TileData::Frames(self.payloads())))
            }
            FrameSelector::All => None,
        };

        match ready {
            Some(delivery) => vec![delivery],
            None => {
                self.waiters.push(waiter);
                Vec::new()
            }
        }
    }

    /// Applies the outcome of task `task` for `frame`.
    ///
    /// Returns `None` if the task is not the active task of that slot
    /// (it was canceled or replaced); nothing changes in that case.
    pub fn on_task_resolved(
        &mut self,
        frame: FrameIndex,
        task: TaskId,
        outcome: FetchOutcome<P>,
    ) -> Option<Vec<Delivery<P>>> {
        let slot = self.slots.get_mut(frame as usize)?;
        if slot.task.as_ref().map(TaskHandle::id) != Some(task) {
            trace!(tile = %self.tile, frame, %task, "Ignoring stale task completion");
            return None;
        }
        slot.task = None;
        self.active_tasks -= 1;

        let mut deliveries = Vec::new();
        match outcome {
            FetchOutcome::Success(payload) => {
                slot.payload = Some(Arc::clone(&payload));
                for waiter in self.take_waiters(|w| w.selector == FrameSelector::Single(frame)) {
                    let data = TileData::Single(Arc::clone(&payload));
                    deliveries.push(self.loaded(waiter, data));
                }
            }
            FetchOutcome::Failure(_) => {
                for waiter in self.take_waiters(|w| w.selector == FrameSelector::Single(frame)) {
                    deliveries.push(self.failed(waiter));
                }
            }
            FetchOutcome::Canceled => {
                self.take_waiters(|w| w.selector.covers(frame));
            }
        }

        if self.is_idle() {
            deliveries.extend(self.settle_all_waiters());
        }
        Some(deliveries)
    }

    /// Cancels one frame: its task stops, its payload is cleared and every
    /// request depending on it is dropped without a callback.
    ///
    /// Returns the number of tasks canceled.
    pub fn cancel_frame(&mut self, frame: FrameIndex) -> usize {
        let Some(slot) = self.slots.get_mut(frame as usize) else {
            return 0;
        };
        slot.payload = None;
        let canceled = match slot.task.take() {
            Some(handle) => {
                handle.cancel();
                self.active_tasks -= 1;
                1
            }
            None => 0,
        };
        self.take_waiters(|w| w.selector.covers(frame));
        canceled
    }

    /// Cancels every frame and drops every waiter. Returns the number of
    /// tasks canceled.
    pub fn cancel_all(&mut self) -> usize {
        let mut canceled = 0;
        for slot in &mut self.slots {
            slot.payload = None;
            if let Some(handle) = slot.task.take() {
                handle.cancel();
                canceled += 1;
            }
        }
        self.active_tasks = 0;
        self.waiters.clear();
        canceled
    }

    /// Reports every all-frames waiter. Only valid once the set is idle.
    fn settle_all_waiters(&mut self) -> Vec<Delivery<P>> {
        let waiters = self.take_waiters(|w| w.selector == FrameSelector::All);
        if waiters.is_empty() {
            return Vec::new();
        }
        let payloads = self.is_done().then(|| self.payloads());
        waiters
            .into_iter()
            .map(|waiter| match &payloads {
                Some(payloads) => self.loaded(waiter, TileData::Frames(payloads.clone())),
                None => self.failed(waiter),
            })
            .collect()
    }

    fn take_waiters(&mut self, pred: impl Fn(&Waiter) -> bool) -> Vec<Waiter> {
        let (taken, kept): (Vec<Waiter>, Vec<Waiter>) = self.waiters.drain(..).partition(pred);
        self.waiters = kept;
        taken
    }

    fn payloads(&self) -> Vec<Arc<P>> {
        self.slots
            .iter()
            .filter_map(|slot| slot.payload.clone())
            .collect()
    }

    fn frames(&self) -> impl Iterator<Item = FrameIndex> {
        0..self.slots.len() as FrameIndex
    }

    fn slot(&self, frame: FrameIndex) -> Option<&Slot<P>> {
        self.slots.get(frame as usize)
    }

    fn loaded(&self, waiter: Waiter, data: TileData<P>) -> Delivery<P> {
        Delivery::Loaded {
            request: waiter.request,
            tile: self.tile,
            selector: waiter.selector,
            data,
        }
    }

    fn failed(&self, waiter: Waiter) -> Delivery<P> {
        Delivery::Failed {
            request: waiter.request,
            tile: self.tile,
            selector: waiter.selector,
        }
    }
}
