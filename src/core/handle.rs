//! Cancellable handles for scheduled work.
//!
//! Every scheduling call returns a [`ScheduleHandle`]. The executor keeps
//! only a weak bookkeeping entry per handle so it can cancel everything on
//! shutdown; the running timer and the caller's handle hold the strong
//! references. Closing is idempotent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::AbortHandle;

/// Anything that can be cancelled more than once without effect.
pub trait Cancellable {
    /// Cancel; later calls are no-ops.
    fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

/// Shared state between a handle, its timer task and the registry.
#[derive(Debug)]
pub(crate) struct HandleState {
    id: u64,
    closed: AtomicBool,
    abort: Mutex<Option<AbortHandle>>,
}

impl HandleState {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_abort(&self, abort: AbortHandle) {
        *self.abort.lock() = Some(abort);
    }

    /// Flip to closed and abort the timer. Returns false if already closed.
    fn cancel(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(abort) = self.abort.lock().take() {
            abort.abort();
        }
        true
    }
}

/// Executor-side bookkeeping of outstanding handles.
#[derive(Debug, Default)]
pub(crate) struct HandleRegistry {
    entries: Mutex<HashMap<u64, Weak<HandleState>>>,
    next_id: AtomicU64,
}

impl HandleRegistry {
    /// Create and track a fresh handle state.
    pub(crate) fn register(&self) -> Arc<HandleState> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(HandleState {
            id,
            closed: AtomicBool::new(false),
            abort: Mutex::new(None),
        });
        self.entries.lock().insert(id, Arc::downgrade(&state));
        state
    }

    /// Drop the bookkeeping entry for `id`, if still present.
    pub(crate) fn remove(&self, id: u64) {
        self.entries.lock().remove(&id);
    }

    /// Cancel every outstanding handle. Returns how many were cancelled.
    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<Weak<HandleState>> =
            self.entries.lock().drain().map(|(_, state)| state).collect();
        drained
            .into_iter()
            .filter_map(|state| state.upgrade())
            .filter(|state| state.cancel())
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Token for a pending or recurring timer on a scheduling executor.
///
/// Dropping the handle does not cancel the work; call [`close`](Cancellable::close).
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    state: Arc<HandleState>,
    registry: Weak<HandleRegistry>,
}

impl ScheduleHandle {
    pub(crate) fn new(state: Arc<HandleState>, registry: &Arc<HandleRegistry>) -> Self {
        Self {
            state,
            registry: Arc::downgrade(registry),
        }
    }

    /// Identifier unique within the issuing executor.
    pub fn id(&self) -> u64 {
        self.state.id
    }
}

impl Cancellable for ScheduleHandle {
    fn close(&self) {
        if !self.state.cancel() {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.state.id);
        }
    }

    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

impl HandleState {
    pub(crate) const fn id(&self) -> u64 {
        self.id
    }
}
