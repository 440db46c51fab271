//! Executor-backed monitors: listener fan-out, throttling, liveness.

pub mod listener;
pub mod liveness;
pub mod throttle;

pub use listener::{Listener, ListenerHandle, ListenerRegistry};
pub use liveness::{LivenessChecker, TimestampedRecord, HISTORY_CAPACITY};
pub use throttle::ThrottlingConsumer;
