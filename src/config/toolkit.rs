//! Executor, backoff, liveness and throttle configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time `close()` waits for a worker to drain.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 10_000;

fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

/// Scheduling executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Label used to name the worker thread.
    pub thread_name: String,
    /// How long `close()` waits for the worker to drain, in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

/// Exponential backoff configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BackoffConfig {
    /// First retry interval in milliseconds.
    pub initial_interval_ms: u64,
    /// Growth factor applied after each step (must exceed 1).
    pub multiplier: f64,
    /// Symmetric jitter as a fraction of the interval, in `[0, 1)`.
    pub randomization_factor: f64,
    /// Cap on a single interval in milliseconds.
    pub max_interval_ms: u64,
    /// Total time after which retrying stops, in milliseconds.
    pub max_elapsed_time_ms: u64,
}

/// Liveness checker configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Maximum silence before a source is declared missing, in milliseconds.
    pub threshold_ms: u64,
}

/// Throttling consumer configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum spacing between deliveries, in milliseconds.
    pub window_ms: u64,
}

/// Root configuration for one connector's toolkit components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolkitConfig {
    /// Worker executor settings.
    pub executor: ExecutorConfig,
    /// Retry policy, if the connector retries.
    #[serde(default)]
    pub backoff: Option<BackoffConfig>,
    /// Heartbeat monitoring, if the connector watches a data source.
    #[serde(default)]
    pub liveness: Option<LivenessConfig>,
    /// Update coalescing, if the connector throttles.
    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,
}

impl ExecutorConfig {
    /// Configuration with the given thread label and the default grace period.
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self {
            thread_name: thread_name.into(),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }

    /// Override the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Shutdown grace period as a duration.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validate executor configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_name.trim().is_empty() {
            return Err("thread_name must not be empty".into());
        }
        if self.shutdown_grace_ms == 0 {
            return Err("shutdown_grace_ms must be greater than 0".into());
        }
        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval_ms: 60_000,
            max_elapsed_time_ms: 900_000,
        }
    }
}

impl BackoffConfig {
    /// Validate backoff configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_interval_ms == 0 {
            return Err("initial_interval_ms must be greater than 0".into());
        }
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err("multiplier must be greater than 1".into());
        }
        if !(0.0..1.0).contains(&self.randomization_factor) {
            return Err("randomization_factor must be in [0, 1)".into());
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err("max_interval_ms must not be less than initial_interval_ms".into());
        }
        if self.max_elapsed_time_ms == 0 {
            return Err("max_elapsed_time_ms must be greater than 0".into());
        }
        Ok(())
    }
}

impl LivenessConfig {
    /// Missing-data threshold as a duration.
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }

    /// Validate liveness configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.threshold_ms == 0 {
            return Err("threshold_ms must be greater than 0".into());
        }
        Ok(())
    }
}

impl ThrottleConfig {
    /// Throttle window as a duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Validate throttle configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_ms == 0 {
            return Err("window_ms must be greater than 0".into());
        }
        Ok(())
    }
}

impl ToolkitConfig {
    /// Validate every configured section.
    pub fn validate(&self) -> Result<(), String> {
        self.executor
            .validate()
            .map_err(|e| format!("executor invalid: {e}"))?;
        if let Some(backoff) = &self.backoff {
            backoff.validate().map_err(|e| format!("backoff invalid: {e}"))?;
        }
        if let Some(liveness) = &self.liveness {
            liveness
                .validate()
                .map_err(|e| format!("liveness invalid: {e}"))?;
        }
        if let Some(throttle) = &self.throttle {
            throttle
                .validate()
                .map_err(|e| format!("throttle invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse toolkit configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
