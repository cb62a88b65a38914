//! Core domain layer for mail-pulse.
//!
//! Typed records, the error type, parsing helpers for the loosely formatted
//! cells of platform exports, rate arithmetic, date windows and CLI settings.

pub mod calculations;
pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod periods;
pub mod settings;
pub mod time_utils;

pub use error::{IngestError, PulseError, Result};
