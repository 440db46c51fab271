//! Builders that assemble toolkit components from configuration.

pub mod executor_factory;

pub use executor_factory::ExecutorFactory;
