//! Two-tier cache
//!
//! # Architecture
//!
//! - **Backing** (`backing.rs`): in-process tier-2 store (LRU bounded, per-key expiry)
//! - **Entry** (`entry.rs`): self-refreshing tier-1 unit with single-flight refresh
//! - **Registry** (`registry.rs`): owns entries by unique key, diagnostics, disposal
//!
//! Entries are registered explicitly at startup through [`CacheRegistryBuilder`]
//! and the builder is frozen into an immutable [`CacheRegistry`].

pub mod backing;
pub mod entry;
pub mod registry;

pub use backing::MemoryBackingStore;
pub use entry::{CacheDiagnostic, CacheEntry, CacheSource, CacheStats, RefreshPolicy};
pub use registry::{CacheRegistry, CacheRegistryBuilder};

// vim: ts=4
