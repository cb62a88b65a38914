//! Runtime layer for Mail Pulse.
//!
//! Loads export files asynchronously and holds the resulting dataset behind
//! a read-only query API.

pub mod data_store;
pub mod loader;

pub use pulse_core as core;
pub use pulse_data as data;
