//! Cache registry
//!
//! Entries are registered on a [`CacheRegistryBuilder`] during startup and the
//! builder is frozen into a [`CacheRegistry`]. Lookups are by key; the value
//! type is checked at lookup time.

use async_trait::async_trait;
use futures::future::join_all;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

use super::entry::{CacheDiagnostic, CacheEntry, CacheSource, CacheStats};
use crate::prelude::*;

/// Diagnostics events buffered before new ones are dropped
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 256;

/// Type-erased view of a `CacheEntry<T>`
#[async_trait]
trait ErasedEntry: Send + Sync {
	fn key(&self) -> &str;
	fn value_type(&self) -> &'static str;
	fn is_expired(&self) -> bool;
	fn stats(&self) -> CacheStats;
	fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
	async fn force_refresh(&self, cancel: &CancellationToken) -> ClResult<()>;
	async fn refresh_if_expired(&self, cancel: &CancellationToken) -> ClResult<bool>;
	async fn dispose(&self);
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ErasedEntry for CacheEntry<T> {
	fn key(&self) -> &str {
		CacheEntry::key(self)
	}

	fn value_type(&self) -> &'static str {
		CacheEntry::value_type(self)
	}

	fn is_expired(&self) -> bool {
		CacheEntry::is_expired(self)
	}

	fn stats(&self) -> CacheStats {
		CacheEntry::stats(self)
	}

	fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
		self
	}

	async fn force_refresh(&self, cancel: &CancellationToken) -> ClResult<()> {
		self.refresh(cancel).await.map(|_| ())
	}

	async fn refresh_if_expired(&self, cancel: &CancellationToken) -> ClResult<bool> {
		CacheEntry::refresh_if_expired(self, cancel).await
	}

	async fn dispose(&self) {
		CacheEntry::dispose(self).await;
	}
}

pub struct CacheRegistryBuilder {
	entries: Vec<Arc<dyn ErasedEntry>>,
	index: HashMap<Box<str>, usize>,
	diagnostics_tx: flume::Sender<CacheDiagnostic>,
	diagnostics_rx: flume::Receiver<CacheDiagnostic>,
}

impl CacheRegistryBuilder {
	pub fn new() -> Self {
		Self::with_diagnostics_capacity(DEFAULT_DIAGNOSTICS_CAPACITY)
	}

	pub fn with_diagnostics_capacity(capacity: usize) -> Self {
		let (diagnostics_tx, diagnostics_rx) = flume::bounded(capacity.max(1));
		Self { entries: Vec::new(), index: HashMap::new(), diagnostics_tx, diagnostics_rx }
	}

	/// Register a source. Fails if its key is empty or already registered.
	pub fn register<S: CacheSource>(&mut self, source: S) -> ClResult<()> {
		let source: Arc<dyn CacheSource<Value = S::Value>> = Arc::new(source);
		self.register_arc(source)
	}

	pub fn register_arc<T: Clone + Send + Sync + 'static>(
		&mut self,
		source: Arc<dyn CacheSource<Value = T>>,
	) -> ClResult<()> {
		let key: Box<str> = source.key().into();
		if key.is_empty() {
			return Err(Error::ValidationError("cache key must not be empty".into()));
		}
		if self.index.contains_key(&key) {
			return Err(Error::DuplicateKeyRegistration(key.to_string()));
		}

		debug!("Registering cache entry: {} ({})", key, type_name::<T>());
		let entry: Arc<dyn ErasedEntry> =
			Arc::new(CacheEntry::new(source, self.diagnostics_tx.clone()));
		self.index.insert(key, self.entries.len());
		self.entries.push(entry);
		Ok(())
	}

	pub fn contains(&self, key: &str) -> bool {
		self.index.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Freeze the registry. No entries can be added afterwards.
	pub fn build(self) -> CacheRegistry {
		info!("Cache registry frozen with {} entries", self.entries.len());
		CacheRegistry {
			entries: self.entries,
			index: self.index,
			diagnostics: self.diagnostics_rx,
			disposed: AtomicBool::new(false),
		}
	}
}

impl Default for CacheRegistryBuilder {
	fn default() -> Self {
		Self::new()
	}
}

pub struct CacheRegistry {
	entries: Vec<Arc<dyn ErasedEntry>>,
	index: HashMap<Box<str>, usize>,
	diagnostics: flume::Receiver<CacheDiagnostic>,
	disposed: AtomicBool,
}

impl CacheRegistry {
	fn lookup(&self, key: &str) -> ClResult<&Arc<dyn ErasedEntry>> {
		if self.disposed.load(Ordering::Acquire) {
			return Err(Error::Disposed(key.to_string()));
		}
		self.index
			.get(key)
			.and_then(|&idx| self.entries.get(idx))
			.ok_or_else(|| Error::UnknownCacheKey(key.to_string()))
	}

	/// Typed handle to an entry
	pub fn entry<T: Clone + Send + Sync + 'static>(&self, key: &str) -> ClResult<Arc<CacheEntry<T>>> {
		let entry = self.lookup(key)?;
		let expected = entry.value_type();
		Arc::clone(entry).into_any().downcast::<CacheEntry<T>>().map_err(|_| {
			Error::CacheTypeMismatch { key: key.to_string(), expected, requested: type_name::<T>() }
		})
	}

	/// Current value of an entry, refreshing it first if it is expired
	pub async fn get_value<T: Clone + Send + Sync + 'static>(&self, key: &str) -> ClResult<T> {
		self.entry::<T>(key)?.get_value().await
	}

	pub async fn force_refresh(&self, key: &str) -> ClResult<()> {
		self.force_refresh_with(key, &CancellationToken::new()).await
	}

	/// Refresh an entry regardless of its TTL
	pub async fn force_refresh_with(&self, key: &str, cancel: &CancellationToken) -> ClResult<()> {
		let entry = self.lookup(key)?;
		info!("Forcing refresh of cache entry '{}'", key);
		entry.force_refresh(cancel).await
	}

	pub fn is_expired(&self, key: &str) -> ClResult<bool> {
		Ok(self.lookup(key)?.is_expired())
	}

	/// Refresh every expired entry concurrently. Returns the number of entries
	/// a refresh was attempted for.
	pub async fn refresh_expired(&self, cancel: &CancellationToken) -> ClResult<usize> {
		if self.disposed.load(Ordering::Acquire) {
			return Err(Error::Disposed("cache registry".into()));
		}
		let results = join_all(self.entries.iter().map(|entry| async move {
			(entry.key(), entry.refresh_if_expired(cancel).await)
		}))
		.await;

		let mut attempted = 0;
		for (key, result) in results {
			match result {
				Ok(true) => attempted += 1,
				Ok(false) => {}
				Err(err) => {
					attempted += 1;
					debug!("Refresh of expired entry '{}' gave no value: {}", key, err);
				}
			}
		}
		Ok(attempted)
	}

	/// Keys in registration order
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|entry| entry.key())
	}

	pub fn contains(&self, key: &str) -> bool {
		self.index.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn stats(&self) -> Vec<CacheStats> {
		self.entries.iter().map(|entry| entry.stats()).collect()
	}

	/// Receiver for refresh failures and cancellations. Events are dropped
	/// when the channel is full.
	pub fn diagnostics(&self) -> flume::Receiver<CacheDiagnostic> {
		self.diagnostics.clone()
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	/// Dispose every entry in registration order. Idempotent.
	pub async fn dispose_all(&self) {
		if self.disposed.swap(true, Ordering::AcqRel) {
			return;
		}
		info!("Disposing {} cache entries", self.entries.len());
		for entry in &self.entries {
			entry.dispose().await;
		}
	}
}

impl std::fmt::Debug for CacheRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CacheRegistry")
			.field("keys", &self.keys().collect::<Vec<_>>())
			.field("disposed", &self.is_disposed())
			.finish()
	}
}


// vim: ts=4
