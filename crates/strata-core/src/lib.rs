//! Core engine for Strata.
//!
//! Two subsystems live here:
//!
//! - [`cache`]: the two-tier cache. Tier 1 is a registry of named,
//!   self-refreshing entries with single-flight refresh and stale-on-error
//!   semantics; tier 2 is a passive key/value backing store.
//! - [`settings`]: the scoped configuration store, the lock-aware cascade
//!   resolver and the settings facade built on top of them.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod prelude;
pub mod settings;

pub use cache::{CacheEntry, CacheRegistry, CacheRegistryBuilder, CacheSource, RefreshPolicy};
pub use settings::{CascadeResolver, ConfigurationStore, EffectiveSetting, SettingsFacade, UpsertOptions};

// vim: ts=4
