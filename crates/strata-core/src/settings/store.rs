//! Scoped configuration store
//!
//! CRUD over persisted settings through a [`SettingsAdapter`]. Every operation
//! validates the locator, keys are normalized before they reach the adapter,
//! and writes to the same row are serialized by a per-row async lock.
//!
//! With a [`BackingStore`] attached, reads go through it and every write drops
//! the cached entries of the written scope.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::prelude::*;
use strata_types::backing_store::{BackingStore, BackingStoreExt};
use strata_types::setting::{Setting, SettingLocator, SettingScope, ValueType, normalize_key};
use strata_types::settings_adapter::SettingsAdapter;

type RowId = (SettingLocator, String);

/// Row lock plus the number of writers holding or awaiting it
struct RowSlot {
	mutex: Arc<tokio::sync::Mutex<()>>,
	users: usize,
}

type RowTable = parking_lot::Mutex<HashMap<RowId, RowSlot>>;

/// Registration of one writer for a row. Dropping it, also when the write
/// future is dropped mid-flight, prunes the row lock once nobody uses it.
struct RowLock<'a> {
	table: &'a RowTable,
	id: RowId,
	mutex: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for RowLock<'_> {
	fn drop(&mut self) {
		let mut table = self.table.lock();
		if let Some(slot) = table.get_mut(&self.id) {
			slot.users = slot.users.saturating_sub(1);
			if slot.users == 0 {
				table.remove(&self.id);
			}
		}
	}
}

/// Options for [`ConfigurationStore::upsert`]
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
	/// Type hint; keeps the existing row's type when None, else `String`
	pub value_type: Option<ValueType>,
	pub locked: bool,
	/// Kept from the existing row when None
	pub category: Option<String>,
	/// Kept from the existing row when None
	pub description: Option<String>,
	pub actor: Option<UserId>,
}

impl UpsertOptions {
	pub fn typed(value_type: ValueType) -> Self {
		Self { value_type: Some(value_type), ..Self::default() }
	}

	pub fn locked(mut self, locked: bool) -> Self {
		self.locked = locked;
		self
	}

	pub fn category(mut self, category: impl Into<String>) -> Self {
		self.category = Some(category.into());
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn actor(mut self, actor: impl Into<UserId>) -> Self {
		self.actor = Some(actor.into());
		self
	}
}

struct ReadThrough {
	store: Arc<dyn BackingStore>,
	ttl: Option<Duration>,
	/// Bumped on every write before the scope is dropped. A fill whose read
	/// started in an older generation is discarded, or removed again if it
	/// landed after the bump.
	generation: AtomicU64,
}

pub struct ConfigurationStore {
	adapter: Arc<dyn SettingsAdapter>,
	cache: Option<ReadThrough>,
	write_locks: RowTable,
}

impl ConfigurationStore {
	pub fn new(adapter: Arc<dyn SettingsAdapter>) -> Self {
		Self { adapter, cache: None, write_locks: parking_lot::Mutex::new(HashMap::new()) }
	}

	/// Read through `store`, caching rows for `ttl` (`None` keeps them until
	/// the next write to their scope)
	pub fn with_read_through(mut self, store: Arc<dyn BackingStore>, ttl: Option<Duration>) -> Self {
		self.cache = Some(ReadThrough { store, ttl, generation: AtomicU64::new(0) });
		self
	}

	pub fn adapter(&self) -> &Arc<dyn SettingsAdapter> {
		&self.adapter
	}

	/// All rows at exactly `locator`, by normalized key
	pub async fn get_scoped(&self, locator: &SettingLocator) -> ClResult<HashMap<String, Setting>> {
		locator.validate()?;
		let cache_key = format!("{}*", scope_prefix(locator));
		if let Some(rows) = self.cache_get::<HashMap<String, Setting>>(&cache_key).await {
			return Ok(rows);
		}

		let generation = self.generation();
		let rows: HashMap<String, Setting> = self
			.adapter
			.list_settings(locator)
			.await
			.inspect_err(|e| warn!("Failed to list settings at {}: {}", locator, e))?
			.into_iter()
			.map(|row| (row.key.clone(), row))
			.collect();
		self.cache_put(&cache_key, &rows, generation).await;
		Ok(rows)
	}

	pub async fn get_one(&self, locator: &SettingLocator, key: &str) -> ClResult<Option<Setting>> {
		locator.validate()?;
		let key = normalize_key(key)?;
		let cache_key = format!("{}={}", scope_prefix(locator), key);
		if let Some(row) = self.cache_get::<Option<Setting>>(&cache_key).await {
			return Ok(row);
		}

		let generation = self.generation();
		let row = self
			.adapter
			.read_setting(locator, &key)
			.await
			.inspect_err(|e| warn!("Failed to read setting '{}' at {}: {}", key, locator, e))?;
		// misses are cached too
		self.cache_put(&cache_key, &row, generation).await;
		Ok(row)
	}

	/// Create or replace the row at `(locator, key)`
	pub async fn upsert(
		&self,
		locator: &SettingLocator,
		key: &str,
		value: impl Into<String>,
		opts: UpsertOptions,
	) -> ClResult<Setting> {
		locator.validate()?;
		let key = normalize_key(key)?;
		let value = value.into();
		if let Some(value_type) = opts.value_type {
			value_type.validate(&value)?;
		}

		let row = self.row_lock((locator.clone(), key));
		let _guard = row.mutex.lock().await;
		self.upsert_row(locator, &row.id.1, value, opts).await
	}

	async fn upsert_row(
		&self,
		locator: &SettingLocator,
		key: &str,
		value: String,
		opts: UpsertOptions,
	) -> ClResult<Setting> {
		let existing = self.adapter.read_setting(locator, key).await?;
		let value_type = opts
			.value_type
			.or_else(|| existing.as_ref().map(|row| row.value_type))
			.unwrap_or_default();
		// the inherited type is only known here
		if opts.value_type.is_none() {
			value_type.validate(&value)?;
		}

		let now = Timestamp::now();
		let setting = match existing {
			Some(prev) => Setting {
				value,
				value_type,
				is_locked: opts.locked,
				category: opts.category.or(prev.category),
				description: opts.description.or(prev.description),
				updated_at: now,
				updated_by: opts.actor,
				..prev
			},
			None => Setting {
				scope: locator.scope,
				workspace_id: locator.workspace_id.clone(),
				user_id: locator.user_id.clone(),
				key: key.to_string(),
				value,
				value_type,
				is_locked: opts.locked,
				category: opts.category,
				description: opts.description,
				created_at: now,
				updated_at: now,
				created_by: opts.actor.clone(),
				updated_by: opts.actor,
			},
		};

		self.adapter
			.write_setting(&setting)
			.await
			.inspect_err(|e| warn!("Failed to write setting '{}' at {}: {}", key, locator, e))?;
		self.invalidate(locator).await;

		info!("Setting '{}' updated at {} (locked={})", key, locator, setting.is_locked);
		Ok(setting)
	}

	/// Delete the row at `(locator, key)`, returning whether one existed.
	/// System rows are never deleted.
	pub async fn delete(&self, locator: &SettingLocator, key: &str) -> ClResult<bool> {
		locator.validate()?;
		if locator.scope == SettingScope::System {
			return Err(Error::InvalidOperation(format!(
				"system setting '{}' cannot be deleted, only updated",
				key
			)));
		}
		let key = normalize_key(key)?;

		let row = self.row_lock((locator.clone(), key));
		let _guard = row.mutex.lock().await;
		self.delete_row(locator, &row.id.1).await
	}

	async fn delete_row(&self, locator: &SettingLocator, key: &str) -> ClResult<bool> {
		let removed = self
			.adapter
			.delete_setting(locator, key)
			.await
			.inspect_err(|e| warn!("Failed to delete setting '{}' at {}: {}", key, locator, e))?;
		if removed {
			self.invalidate(locator).await;
			info!("Setting '{}' deleted at {}", key, locator);
		}
		Ok(removed)
	}

	fn row_lock(&self, id: RowId) -> RowLock<'_> {
		let mut table = self.write_locks.lock();
		let slot = table
			.entry(id.clone())
			.or_insert_with(|| RowSlot { mutex: Arc::default(), users: 0 });
		slot.users += 1;
		RowLock { table: &self.write_locks, mutex: Arc::clone(&slot.mutex), id }
	}

	/// Number of row locks currently held or awaited
	pub fn pending_writes(&self) -> usize {
		self.write_locks.lock().len()
	}

	fn generation(&self) -> u64 {
		self.cache.as_ref().map_or(0, |cache| cache.generation.load(Ordering::Acquire))
	}

	async fn cache_get<T: serde::de::DeserializeOwned + Send>(&self, cache_key: &str) -> Option<T> {
		let cache = self.cache.as_ref()?;
		match cache.store.get::<T>(cache_key).await {
			Ok(hit) => hit,
			Err(err) => {
				warn!("Settings cache read failed for '{}': {}", cache_key, err);
				None
			}
		}
	}

	async fn cache_put<T: serde::Serialize + Sync>(&self, cache_key: &str, value: &T, generation: u64) {
		let Some(cache) = &self.cache else { return };
		if cache.generation.load(Ordering::Acquire) != generation {
			return;
		}
		if let Err(err) = cache.store.set(cache_key, value, cache.ttl).await {
			warn!("Settings cache write failed for '{}': {}", cache_key, err);
			return;
		}
		// a write invalidated the scope while the fill was in flight
		if cache.generation.load(Ordering::Acquire) != generation {
			if let Err(err) = cache.store.remove(cache_key).await {
				warn!("Settings cache cleanup failed for '{}': {}", cache_key, err);
			}
		}
	}

	async fn invalidate(&self, locator: &SettingLocator) {
		let Some(cache) = &self.cache else { return };
		cache.generation.fetch_add(1, Ordering::AcqRel);
		if let Err(err) = cache.store.remove_prefix(&scope_prefix(locator)).await {
			warn!("Settings cache invalidation failed for {}: {}", locator, err);
		}
	}
}

impl std::fmt::Debug for ConfigurationStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConfigurationStore")
			.field("adapter", &self.adapter)
			.field("read_through", &self.cache.is_some())
			.finish_non_exhaustive()
	}
}

/// Backing store key prefix of one scope. Ids are length-prefixed so that no
/// locator's prefix is a prefix of another's.
fn scope_prefix(locator: &SettingLocator) -> String {
	fn id_part(id: Option<&str>) -> String {
		id.map_or_else(|| "-".to_string(), |id| format!("{}:{}", id.len(), id))
	}
	format!(
		"settings/{}/{}/{}/",
		locator.scope,
		id_part(locator.workspace_id.as_ref().map(WorkspaceId::as_str)),
		id_part(locator.user_id.as_ref().map(UserId::as_str)),
	)
}


// vim: ts=4
