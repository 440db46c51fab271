//! Retry and suppression policies.

pub mod backoff;
pub mod gate;

pub use backoff::{retry, BackOff, ExponentialBackOff, SynchronizedBackOff};
pub use gate::{ThresholdGate, ThresholdWindowedGate};
