//! Shared setup for strata-core integration tests
//!
//! Each test builds its own store on a fresh in-memory adapter, so tests do
//! not share state.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

use strata_core::cache::MemoryBackingStore;
use strata_core::settings::{
	CascadeResolver, ConfigurationStore, FrozenSettingsRegistry, SettingsFacade, SettingsRegistry,
};
use strata_settings_adapter_memory::SettingsAdapterMemory;
use strata_types::backing_store::BackingStore;
use strata_types::error::ClResult;
use strata_types::setting::{Setting, SettingLocator};
use strata_types::settings_adapter::SettingsAdapter;

/// Initialize tracing output for tests that need it
pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

pub fn memory_store() -> Arc<ConfigurationStore> {
	Arc::new(ConfigurationStore::new(Arc::new(SettingsAdapterMemory::new())))
}

/// Store reading through an in-memory backing store. The adapter is returned
/// so tests can change rows behind the store's back.
pub fn cached_store(
	ttl: Option<Duration>,
) -> (Arc<ConfigurationStore>, Arc<SettingsAdapterMemory>, Arc<MemoryBackingStore>) {
	let adapter = Arc::new(SettingsAdapterMemory::new());
	let backing = Arc::new(MemoryBackingStore::new(1000));
	let store = ConfigurationStore::new(adapter.clone()).with_read_through(backing.clone(), ttl);
	(Arc::new(store), adapter, backing)
}

pub fn resolver() -> CascadeResolver {
	CascadeResolver::new(memory_store())
}

pub fn facade(registry: SettingsRegistry) -> SettingsFacade {
	let registry: Arc<FrozenSettingsRegistry> = Arc::new(registry.freeze());
	SettingsFacade::new(registry, memory_store(), 100)
}

/// Backing store whose writes can be held until released, to simulate a slow
/// remote store
#[derive(Debug)]
pub struct HeldBackingStore {
	inner: MemoryBackingStore,
	hold: AtomicBool,
	pub entered: Notify,
	release: Semaphore,
}

impl HeldBackingStore {
	pub fn new() -> Self {
		Self {
			inner: MemoryBackingStore::new(1000),
			hold: AtomicBool::new(false),
			entered: Notify::new(),
			release: Semaphore::new(0),
		}
	}

	/// Park the next writes in `set_raw` until `release` is called
	pub fn hold_writes(&self, hold: bool) {
		self.hold.store(hold, Ordering::SeqCst);
	}

	pub fn release(&self) {
		self.release.add_permits(1);
	}
}

#[async_trait]
impl BackingStore for HeldBackingStore {
	async fn get_raw(&self, key: &str) -> ClResult<Option<serde_json::Value>> {
		self.inner.get_raw(key).await
	}

	async fn set_raw(
		&self,
		key: &str,
		value: serde_json::Value,
		expiry: Option<Duration>,
	) -> ClResult<()> {
		if self.hold.load(Ordering::SeqCst) {
			self.entered.notify_one();
			self.release.acquire().await.unwrap().forget();
		}
		self.inner.set_raw(key, value, expiry).await
	}

	async fn remove(&self, key: &str) -> ClResult<bool> {
		self.inner.remove(key).await
	}

	async fn exists(&self, key: &str) -> ClResult<bool> {
		self.inner.exists(key).await
	}

	async fn remove_prefix(&self, prefix: &str) -> ClResult<usize> {
		self.inner.remove_prefix(prefix).await
	}
}

/// Settings adapter that pauses inside every read and can block writes, so
/// that interleaved writers actually overlap
#[derive(Debug, Default)]
pub struct SlowAdapter {
	inner: SettingsAdapterMemory,
	/// Reads that found no row
	pub misses: AtomicUsize,
	block_writes: AtomicBool,
	pub write_entered: Notify,
}

impl SlowAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make writes hang until the calling future is dropped
	pub fn block_writes(&self, block: bool) {
		self.block_writes.store(block, Ordering::SeqCst);
	}
}

#[async_trait]
impl SettingsAdapter for SlowAdapter {
	async fn list_settings(&self, locator: &SettingLocator) -> ClResult<Vec<Setting>> {
		self.inner.list_settings(locator).await
	}

	async fn read_setting(&self, locator: &SettingLocator, key: &str) -> ClResult<Option<Setting>> {
		let row = self.inner.read_setting(locator, key).await?;
		tokio::time::sleep(Duration::from_millis(2)).await;
		if row.is_none() {
			self.misses.fetch_add(1, Ordering::SeqCst);
		}
		Ok(row)
	}

	async fn write_setting(&self, setting: &Setting) -> ClResult<()> {
		if self.block_writes.load(Ordering::SeqCst) {
			self.write_entered.notify_one();
			std::future::pending::<()>().await;
		}
		self.inner.write_setting(setting).await
	}

	async fn delete_setting(&self, locator: &SettingLocator, key: &str) -> ClResult<bool> {
		self.inner.delete_setting(locator, key).await
	}
}

// vim: ts=4
