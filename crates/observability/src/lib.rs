//! Tracing and logging setup shared by binaries and test harnesses.
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! left to the embedding process through [`init`] or [`init_with`].

pub mod tracing;

pub use crate::tracing::{ConfigError, LogFormat, TracingConfig, init, init_with};
