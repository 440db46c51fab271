//! Configuration models for executors and timing policies.

pub mod toolkit;

pub use toolkit::{
    BackoffConfig, ExecutorConfig, LivenessConfig, ThrottleConfig, ToolkitConfig,
    DEFAULT_SHUTDOWN_GRACE_MS,
};
