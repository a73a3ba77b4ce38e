//! Shared types, adapter traits, and error types for Strata.
//!
//! This crate contains the foundational types shared between the engine crate
//! and all adapter implementations. Keeping them separate lets adapter crates
//! compile without pulling in the cache and cascade machinery.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod backing_store;
pub mod error;
pub mod prelude;
pub mod setting;
pub mod settings_adapter;
pub mod types;

// vim: ts=4
