//! Dedicated worker thread with its own single-threaded tokio runtime.
//!
//! The thread drains a job channel in submission order while the same
//! runtime drives timers spawned through [`WorkerThread::handle`]. Because the
//! runtime is current-thread, jobs and timer callbacks never run in parallel
//! with each other.
//!
//! Shutdown is signal-driven: dropping every job sender ends the drain loop,
//! and the thread reports its exit over a crossbeam channel so the owner can
//! wait with a deadline instead of joining unconditionally.

use std::io;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use tokio::runtime::{Builder, Handle};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

/// A unit of work queued to the worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a drain wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The worker drained its queue and exited.
    Drained,
    /// The grace period elapsed first; the thread was detached.
    TimedOut,
    /// Called from the worker itself, so waiting would deadlock.
    SelfJoin,
}

/// Owner's view of a running worker thread.
pub struct WorkerThread {
    name: String,
    handle: Handle,
    thread: JoinHandle<()>,
    done_rx: Receiver<()>,
}

impl WorkerThread {
    /// Build the runtime, then spawn thread `name` draining `jobs`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the runtime or the OS thread cannot be created.
    pub fn spawn(name: &str, mut jobs: UnboundedReceiver<Job>) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        let handle = runtime.handle().clone();
        let (done_tx, done_rx) = bounded::<()>(1);
        let thread_name = name.to_string();

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(worker = %thread_name, "worker thread started");
                runtime.block_on(async {
                    while let Some(job) = jobs.recv().await {
                        job();
                    }
                });
                // Cancels any timers still registered with this runtime.
                drop(runtime);
                debug!(worker = %thread_name, "worker thread exiting");
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            name: name.to_string(),
            handle,
            thread,
            done_rx,
        })
    }

    /// Runtime handle for spawning timers onto this worker.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Worker thread id.
    pub fn thread_id(&self) -> ThreadId {
        self.thread.thread().id()
    }

    /// Wait up to `grace` for the worker to exit. The job senders must
    /// already be dropped, otherwise the worker never finishes draining.
    pub fn join_within(self, grace: Duration) -> DrainOutcome {
        if thread::current().id() == self.thread_id() {
            debug!(worker = %self.name, "close called from the worker itself, not waiting");
            return DrainOutcome::SelfJoin;
        }

        match self.done_rx.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    warn!(worker = %self.name, "worker thread panicked");
                }
                debug!(worker = %self.name, "worker joined");
                DrainOutcome::Drained
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    worker = %self.name,
                    grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    "worker did not drain within grace period - detaching"
                );
                DrainOutcome::TimedOut
            }
        }
    }
}
