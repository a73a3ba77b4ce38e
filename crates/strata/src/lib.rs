//! Strata: hierarchical settings with scope locking, and a self-refreshing
//! cache registry.
//!
//! # Features
//!
//! - Settings at three scopes (System, Workspace, User)
//!     - a locked System or Workspace row overrides every scope below it
//!     - otherwise the most specific row wins
//!     - setting definitions with types, defaults and validators
//! - Cache registry
//!     - named, typed entries with optional TTL
//!     - single-flight refresh, stale value kept on failure
//!     - cancellable refreshes, explicit disposal at shutdown
//! - Pluggable persistence ([`settings_adapter::SettingsAdapter`]) and tier-2
//!   store ([`backing_store::BackingStore`])
//!
//! Everything is wired explicitly through [`app::AppBuilder`].

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

// Re-export shared types and adapter traits from strata-types
pub use strata_types::backing_store;
pub use strata_types::error;
pub use strata_types::setting;
pub use strata_types::settings_adapter;
pub use strata_types::types;

// Engine re-exports
pub use strata_core::cache;
pub use strata_core::settings;

// Local modules
pub mod app;
pub mod config;
pub mod core_settings;
pub mod logging;
pub mod prelude;

pub use app::{App, AppBuilder, AppState};
pub use config::StrataConfig;

// vim: ts=4
