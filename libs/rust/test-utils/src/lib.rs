//! Shared test utilities for the Vault lease manager.
//!
//! This crate provides:
//! - A scriptable in-memory secret backend with call counters
//! - A manually driven clock
//! - Proptest generators for lease and confidentiality values
//! - Configuration fixtures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
pub use mocks::{CallCounts, ManualClock, MockSecretBackend};
