//! # hearthkit
//!
//! Concurrency and timing primitives shared by home-automation connectors.
//!
//! Every integration with a flaky device or cloud service needs the same
//! building blocks. This crate provides them with explicit failure
//! semantics:
//!
//! - **Scheduling Executor**: one dedicated worker per executor running
//!   immediate, delayed and fixed-rate periodic tasks, each returning a
//!   cancellable handle. Task panics are reported, never propagated.
//! - **Listener Registry**: multi-subscriber fan-out through executors, with
//!   replay of the current value to new subscribers.
//! - **Throttling Consumer**: leading plus trailing edge throttling.
//! - **Liveness Checker**: detects a silent data source and its recovery.
//! - **Exponential Backoff**: jittered, capped retry intervals.
//! - **Threshold Gates**: pass one occurrence once a repetition threshold
//!   is crossed, used to keep transient failures out of the error log.
//! - **Job Scheduler**: monthly jobs at 03:00 local time.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hearthkit::builders::ExecutorFactory;
//! use hearthkit::core::{Service, TracingReportSink};
//! use hearthkit::monitor::LivenessChecker;
//! use hearthkit::util::SystemClock;
//! use std::time::Duration;
//!
//! let factory = ExecutorFactory::new(TracingReportSink::shared());
//! let executor = factory.create("meter")?;
//!
//! let liveness = LivenessChecker::new(
//!     "meter",
//!     executor.clone(),
//!     SystemClock::shared(),
//!     Duration::from_secs(300),
//!     |history: Vec<_>| tracing::error!(records = history.len(), "meter silent"),
//!     |_, _| tracing::info!("meter back"),
//! )?;
//! liveness.start()?;
//!
//! liveness.accept(42.0_f64);
//!
//! liveness.stop()?;
//! executor.close();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Lifecycle, executor, guarding, handles, reports and job scheduling.
pub mod core;
/// Configuration models for executors and timing policies.
pub mod config;
/// Builders to construct toolkit components from configuration.
pub mod builders;
/// Executor-backed monitors: listeners, throttling, liveness.
pub mod monitor;
/// Retry backoff and threshold gates.
pub mod policy;
/// Worker thread runtime backing executors.
pub mod runtime;
/// Shared utilities: clocks and tracing setup.
pub mod util;
