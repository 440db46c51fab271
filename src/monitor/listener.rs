//! Thread-safe multi-subscriber registry.
//!
//! Each listener is registered together with the executor it wants to be
//! called on. Notifications are dispatched under the registry lock, so every
//! listener sees values in notification order; listeners on different
//! executors are not ordered relative to each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::{Cancellable, SchedulingExecutor, ToolkitError};

/// Callback receiving notified values.
pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Registration<T> {
    executor: SchedulingExecutor,
    callback: Listener<T>,
}

struct RegistryState<T> {
    listeners: HashMap<Uuid, Registration<T>>,
    last_value: Option<T>,
}

/// Set of listeners plus the last notified value.
pub struct ListenerRegistry<T> {
    state: Arc<Mutex<RegistryState<T>>>,
}

/// Registration token; closing removes the listener.
pub struct ListenerHandle<T> {
    id: Uuid,
    state: Weak<Mutex<RegistryState<T>>>,
    closed: AtomicBool,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for ListenerRegistry<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListenerRegistry<T>
where
    T: Clone + Send + 'static,
{
    /// Empty registry with no known value.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                listeners: HashMap::new(),
                last_value: None,
            })),
        }
    }

    /// Register `callback` to be invoked on `executor`.
    ///
    /// If `current_value` yields a value, the callback receives it
    /// asynchronously before any later notification. The supplier runs
    /// before the registry lock is taken, so it may read this registry.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::DuplicateListener` if the same callback
    /// instance is already registered, or `ToolkitError::ExecutorNotRunning`
    /// if the replay cannot be queued.
    pub fn add_listener<S>(
        &self,
        executor: &SchedulingExecutor,
        current_value: S,
        callback: Listener<T>,
    ) -> Result<ListenerHandle<T>, ToolkitError>
    where
        S: FnOnce() -> Option<T>,
    {
        let current = current_value();
        let mut state = self.state.lock();
        register(&mut state, executor, current, callback).map(|id| self.handle(id))
    }

    /// Register `callback`, replaying the last notified value if there is one.
    ///
    /// # Errors
    ///
    /// Same as [`add_listener`](Self::add_listener).
    pub fn add_listener_with_last(
        &self,
        executor: &SchedulingExecutor,
        callback: Listener<T>,
    ) -> Result<ListenerHandle<T>, ToolkitError> {
        let mut state = self.state.lock();
        let current = state.last_value.clone();
        register(&mut state, executor, current, callback).map(|id| self.handle(id))
    }

    /// Record `value` and dispatch it to every registered listener.
    pub fn notify(&self, value: T) {
        let mut state = self.state.lock();
        for (id, registration) in &state.listeners {
            let callback = Arc::clone(&registration.callback);
            let delivered = value.clone();
            if let Err(e) = registration.executor.execute(move || callback(delivered)) {
                warn!(listener = %id, error = %e, "dropping notification");
            }
        }
        state.last_value = Some(value);
    }

    /// Last notified value.
    pub fn last_value(&self) -> Option<T> {
        self.state.lock().last_value.clone()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.state.lock().listeners.is_empty()
    }

    fn handle(&self, id: Uuid) -> ListenerHandle<T> {
        ListenerHandle {
            id,
            state: Arc::downgrade(&self.state),
            closed: AtomicBool::new(false),
        }
    }
}

fn register<T>(
    state: &mut RegistryState<T>,
    executor: &SchedulingExecutor,
    current: Option<T>,
    callback: Listener<T>,
) -> Result<Uuid, ToolkitError>
where
    T: Send + 'static,
{
    if state
        .listeners
        .values()
        .any(|existing| Arc::ptr_eq(&existing.callback, &callback))
    {
        return Err(ToolkitError::DuplicateListener);
    }

    if let Some(value) = current {
        let replay = Arc::clone(&callback);
        executor.execute(move || replay(value))?;
    }

    let id = Uuid::new_v4();
    state.listeners.insert(
        id,
        Registration {
            executor: executor.clone(),
            callback,
        },
    );
    debug!(listener = %id, executor = %executor.name(), "listener registered");
    Ok(id)
}

impl<T> ListenerHandle<T> {
    /// Registration id.
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

impl<T> Cancellable for ListenerHandle<T> {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(state) = self.state.upgrade() {
            state.lock().listeners.remove(&self.id);
            debug!(listener = %self.id, "listener removed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
