#![deny(missing_docs)]
//! Library half of the `nlq` binary.
//!
//! Wires reference parsers, configuration loading and logging around the
//! `nlq-resilience` acquisition engine.

/// Configuration file loading and overrides.
pub mod config;
/// Error types for the binary.
pub mod errors;
/// Tracing subscriber setup.
pub mod logging;
/// Reference parsers, one per strategy.
pub mod parsers;
/// Orchestrator construction.
pub mod setup;

pub use config::{AppConfig, Overrides};
pub use errors::CliError;
pub use setup::build_orchestrator;
