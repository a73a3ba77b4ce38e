//! In-process backing store
//!
//! LRU-bounded map with lazy per-key expiry: expired items are dropped when
//! they are next touched, or evicted by the LRU when capacity is reached.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

use crate::prelude::*;
use strata_types::backing_store::BackingStore;

/// Limits memory when no capacity is configured
const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct StoredItem {
	value: serde_json::Value,
	expires_at: Option<Instant>,
}

impl StoredItem {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|at| now >= at)
	}
}

#[derive(Debug)]
pub struct MemoryBackingStore {
	items: RwLock<LruCache<String, StoredItem>>,
}

impl MemoryBackingStore {
	pub fn new(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
		Self { items: RwLock::new(LruCache::new(capacity)) }
	}

	/// Number of stored items, including expired ones not yet dropped
	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.read().is_empty()
	}

	/// Drop every expired item, returning the number dropped
	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut items = self.items.write();
		let expired: Vec<String> = items
			.iter()
			.filter(|(_, item)| item.is_expired(now))
			.map(|(key, _)| key.clone())
			.collect();
		for key in &expired {
			items.pop(key);
		}
		expired.len()
	}
}

impl Default for MemoryBackingStore {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[async_trait]
impl BackingStore for MemoryBackingStore {
	async fn get_raw(&self, key: &str) -> ClResult<Option<serde_json::Value>> {
		let now = Instant::now();
		let mut items = self.items.write();
		match items.get(key) {
			Some(item) if !item.is_expired(now) => return Ok(Some(item.value.clone())),
			Some(_) => {}
			None => return Ok(None),
		}
		items.pop(key);
		Ok(None)
	}

	async fn set_raw(
		&self,
		key: &str,
		value: serde_json::Value,
		expiry: Option<Duration>,
	) -> ClResult<()> {
		let expires_at = expiry.map(|ttl| Instant::now() + ttl);
		self.items.write().put(key.to_string(), StoredItem { value, expires_at });
		Ok(())
	}

	async fn remove(&self, key: &str) -> ClResult<bool> {
		let now = Instant::now();
		Ok(self.items.write().pop(key).is_some_and(|item| !item.is_expired(now)))
	}

	async fn exists(&self, key: &str) -> ClResult<bool> {
		let now = Instant::now();
		// peek: existence checks do not count as use for the LRU
		Ok(self.items.read().peek(key).is_some_and(|item| !item.is_expired(now)))
	}

	async fn remove_prefix(&self, prefix: &str) -> ClResult<usize> {
		let mut items = self.items.write();
		let keys: Vec<String> =
			items.iter().filter(|(key, _)| key.starts_with(prefix)).map(|(key, _)| key.clone()).collect();
		for key in &keys {
			items.pop(key);
		}
		debug!("Backing store: removed {} keys with prefix '{}'", keys.len(), prefix);
		Ok(keys.len())
	}
}


// vim: ts=4
