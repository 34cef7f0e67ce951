//! # RecGov
//!
//! This crate provides a client for the Recreation.gov API and the availability queries
//! built on top of it: listing the campgrounds of a park and collecting the sites that
//! are open for booking inside a target date range.

/// Locations, date ranges and availability slots shared by the monitor crates.
mod types;
pub use types::*;

/// HTTP client for the Recreation.gov search and availability endpoints.
mod client;
pub use client::*;

/// Per-location availability scans with sub-entity failure isolation.
mod query;
pub use query::*;
