//! Data layer for mail-pulse.
//!
//! Parses platform CSV exports, converts them into typed records, resolves
//! flow step order and computes the aggregates the read API serves.

pub mod aggregator;
pub mod analysis;
pub mod audience;
pub mod columns;
pub mod comparison;
pub mod reader;
pub mod rollups;
pub mod sequence;
pub mod transform;

pub use pulse_core as core;
