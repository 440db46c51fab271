//! Runtime adapters backing the scheduling executor.

pub mod worker_thread;

pub use worker_thread::{DrainOutcome, Job, WorkerThread};
