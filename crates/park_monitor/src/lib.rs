//! # Park Monitor
//!
//! This crate provides the polling agent that watches configured parks for newly
//! available campsites and permits. It loads the YAML configuration, decides which
//! results are new, and drives the notification dispatcher on a fixed schedule.

/// YAML configuration loading and validation
mod config;
pub use config::*;

/// Fingerprint based duplicate notification suppression
mod dedup;
pub use dedup::*;

/// Error types for configuration and startup
mod error;
pub use error::*;

/// Single-pass and scheduled poll loop
mod executor;
pub use executor::*;
