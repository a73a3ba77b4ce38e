//! Settings facade with caching, validation, and typed access
//!
//! Reads resolve through the cascade and are memoized in an LRU keyed by
//! (workspace, user, key). Any write through the facade clears the memo.
//! Writes are checked against the setting definitions before they reach the
//! store.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::derived::EffectiveSettingsSource;
use super::resolver::{CascadeResolver, EffectiveSetting};
use super::store::{ConfigurationStore, UpsertOptions};
use super::types::FrozenSettingsRegistry;
use crate::prelude::*;
use strata_types::setting::{Setting, SettingLocator, SettingScope, ValueType, normalize_key};

const DEFAULT_CACHE_SIZE: usize = 100;

type CacheKey = (WorkspaceId, UserId, String);

/// LRU cache for resolved settings, negative results included
struct ResolvedCache {
	cache: parking_lot::RwLock<LruCache<CacheKey, Option<EffectiveSetting>>>,
	/// Bumped on clear; resolutions started before a clear are not stored
	generation: AtomicU64,
}

impl ResolvedCache {
	fn new(capacity: usize) -> Self {
		let non_zero = NonZeroUsize::new(capacity)
			.or_else(|| NonZeroUsize::new(DEFAULT_CACHE_SIZE))
			.unwrap_or(NonZeroUsize::MIN);
		Self { cache: parking_lot::RwLock::new(LruCache::new(non_zero)), generation: AtomicU64::new(0) }
	}

	fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	fn get(&self, key: &CacheKey) -> Option<Option<EffectiveSetting>> {
		let mut cache = self.cache.write();
		cache.get(key).cloned()
	}

	fn put(&self, generation: u64, key: CacheKey, value: Option<EffectiveSetting>) {
		let mut cache = self.cache.write();
		if self.generation() == generation {
			cache.put(key, value);
		}
	}

	fn clear(&self) {
		let mut cache = self.cache.write();
		self.generation.fetch_add(1, Ordering::AcqRel);
		cache.clear();
	}

	fn len(&self) -> usize {
		self.cache.read().len()
	}
}

/// Settings facade - main interface for reading and changing settings
pub struct SettingsFacade {
	registry: Arc<FrozenSettingsRegistry>,
	resolver: CascadeResolver,
	cache: ResolvedCache,
	/// Reject writes to keys without a definition
	strict_keys: bool,
}

impl SettingsFacade {
	pub fn new(
		registry: Arc<FrozenSettingsRegistry>,
		store: Arc<ConfigurationStore>,
		cache_size: usize,
	) -> Self {
		Self {
			registry,
			resolver: CascadeResolver::new(store),
			cache: ResolvedCache::new(cache_size),
			strict_keys: false,
		}
	}

	pub fn with_strict_keys(mut self, strict: bool) -> Self {
		self.strict_keys = strict;
		self
	}

	pub fn registry(&self) -> &Arc<FrozenSettingsRegistry> {
		&self.registry
	}

	pub fn resolver(&self) -> &CascadeResolver {
		&self.resolver
	}

	pub fn store(&self) -> &Arc<ConfigurationStore> {
		self.resolver.store()
	}

	/// Number of memoized resolutions
	pub fn cached_len(&self) -> usize {
		self.cache.len()
	}

	/// Drop memoized resolutions, e.g. after writing to the store directly
	pub fn invalidate(&self) {
		self.cache.clear();
	}

	/// Effective setting for a user, without definition defaults
	pub async fn get(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<EffectiveSetting>> {
		let key = normalize_key(key)?;
		let cache_key = (workspace_id.clone(), user_id.clone(), key);
		if let Some(hit) = self.cache.get(&cache_key) {
			debug!("Setting cache hit: {}/{}/{}", workspace_id, user_id, cache_key.2);
			return Ok(hit);
		}

		let generation = self.cache.generation();
		let effective = self.resolver.get_effective(workspace_id, user_id, &cache_key.2).await?;
		self.cache.put(generation, cache_key, effective.clone());
		Ok(effective)
	}

	/// Every effective setting for a user. Not memoized.
	pub async fn get_all(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> ClResult<HashMap<String, EffectiveSetting>> {
		self.resolver.get_effective_all(workspace_id, user_id).await
	}

	/// Effective string value, falling back to the definition default
	pub async fn get_value(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<String>> {
		if let Some(effective) = self.get(workspace_id, user_id, key).await? {
			return Ok(Some(effective.value));
		}
		let key = normalize_key(key)?;
		Ok(self.registry.get(&key).and_then(|def| def.default.clone()))
	}

	async fn get_typed<T>(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
		value_type: ValueType,
		parse: fn(&str) -> Option<T>,
	) -> ClResult<Option<T>> {
		let Some(value) = self.get_value(workspace_id, user_id, key).await? else {
			return Ok(None);
		};
		parse(&value).map(Some).ok_or_else(|| {
			Error::ValidationError(format!(
				"Setting '{}' is not {}, got '{}'",
				key,
				value_type.type_name(),
				value
			))
		})
	}

	fn required<T>(key: &str, value: Option<T>) -> ClResult<T> {
		value.ok_or_else(|| {
			Error::ValidationError(format!("Setting '{}' has no default and must be configured", key))
		})
	}

	/// Type-safe optional getters: None if unresolved and without default,
	/// error if the value does not parse as the requested type
	pub async fn get_string_opt(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<String>> {
		self.get_value(workspace_id, user_id, key).await
	}

	pub async fn get_int_opt(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<i64>> {
		self.get_typed(workspace_id, user_id, key, ValueType::Int, |v| v.parse().ok()).await
	}

	pub async fn get_float_opt(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<f64>> {
		self.get_typed(workspace_id, user_id, key, ValueType::Float, |v| v.parse().ok()).await
	}

	pub async fn get_bool_opt(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<bool>> {
		self.get_typed(workspace_id, user_id, key, ValueType::Bool, |v| match v {
			"true" => Some(true),
			"false" => Some(false),
			_ => None,
		})
		.await
	}

	pub async fn get_json_opt(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<serde_json::Value>> {
		self.get_typed(workspace_id, user_id, key, ValueType::Json, |v| serde_json::from_str(v).ok())
			.await
	}

	/// Type-safe getters (required - returns error if not found)
	pub async fn get_string(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<String> {
		Self::required(key, self.get_string_opt(workspace_id, user_id, key).await?)
	}

	pub async fn get_int(&self, workspace_id: &WorkspaceId, user_id: &UserId, key: &str) -> ClResult<i64> {
		Self::required(key, self.get_int_opt(workspace_id, user_id, key).await?)
	}

	pub async fn get_float(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<f64> {
		Self::required(key, self.get_float_opt(workspace_id, user_id, key).await?)
	}

	pub async fn get_bool(&self, workspace_id: &WorkspaceId, user_id: &UserId, key: &str) -> ClResult<bool> {
		Self::required(key, self.get_bool_opt(workspace_id, user_id, key).await?)
	}

	pub async fn get_json(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<serde_json::Value> {
		Self::required(key, self.get_json_opt(workspace_id, user_id, key).await?)
	}

	pub async fn set_system(
		&self,
		key: &str,
		value: impl Into<String>,
		opts: UpsertOptions,
	) -> ClResult<Setting> {
		self.set(&SettingLocator::system(), key, value.into(), opts).await
	}

	pub async fn set_workspace(
		&self,
		workspace_id: &WorkspaceId,
		key: &str,
		value: impl Into<String>,
		opts: UpsertOptions,
	) -> ClResult<Setting> {
		self.set(&SettingLocator::workspace(workspace_id.clone()), key, value.into(), opts).await
	}

	pub async fn set_user(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
		value: impl Into<String>,
		opts: UpsertOptions,
	) -> ClResult<Setting> {
		let locator = SettingLocator::user(workspace_id.clone(), user_id.clone());
		self.set(&locator, key, value.into(), opts).await
	}

	/// Validate against the definition and write through the store
	async fn set(
		&self,
		locator: &SettingLocator,
		key: &str,
		value: String,
		mut opts: UpsertOptions,
	) -> ClResult<Setting> {
		locator.validate()?;
		let key = normalize_key(key)?;

		match self.registry.get(&key) {
			Some(def) => {
				if !def.allows(locator.scope) {
					warn!("Setting '{}' cannot be set at {} scope", key, locator.scope);
					return Err(Error::InvalidOperation(format!(
						"setting '{}' cannot be set at {} scope",
						key, locator.scope
					)));
				}
				match opts.value_type {
					Some(value_type) if value_type != def.value_type => {
						return Err(Error::ValidationError(format!(
							"Type mismatch for setting '{}': expected {}, got {}",
							key,
							def.value_type.type_name(),
							value_type.type_name()
						)));
					}
					_ => opts.value_type = Some(def.value_type),
				}
				def.validate(&value)?;
				if opts.category.is_none() {
					opts.category.clone_from(&def.category);
				}
			}
			None if self.strict_keys => {
				return Err(Error::ValidationError(format!("Unknown setting: {}", key)));
			}
			None => {}
		}

		let setting = self.store().upsert(locator, &key, value, opts).await?;
		self.cache.clear();
		Ok(setting)
	}

	/// Lock or unlock an existing row, keeping its value. `actor` is recorded
	/// as the row's last updater.
	pub async fn set_locked(
		&self,
		locator: &SettingLocator,
		key: &str,
		locked: bool,
		actor: Option<UserId>,
	) -> ClResult<Setting> {
		let Some(row) = self.store().get_one(locator, key).await? else {
			return Err(Error::NotFound);
		};
		let opts = UpsertOptions { value_type: Some(row.value_type), locked, actor, ..UpsertOptions::default() };
		let setting = self.store().upsert(locator, &row.key, row.value, opts).await?;
		self.cache.clear();
		Ok(setting)
	}

	/// Delete the workspace row, reverting to the system value
	pub async fn reset_workspace(&self, workspace_id: &WorkspaceId, key: &str) -> ClResult<bool> {
		self.reset(&SettingLocator::workspace(workspace_id.clone()), key).await
	}

	/// Delete the user row, reverting to the workspace or system value
	pub async fn reset_user(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<bool> {
		self.reset(&SettingLocator::user(workspace_id.clone(), user_id.clone()), key).await
	}

	async fn reset(&self, locator: &SettingLocator, key: &str) -> ClResult<bool> {
		let removed = self.store().delete(locator, key).await?;
		if removed {
			self.cache.clear();
		}
		Ok(removed)
	}

	/// Validate that all required settings (no default and not optional) are
	/// configured at System scope
	pub async fn validate_required_settings(&self) -> ClResult<()> {
		for def in self.registry.list() {
			if def.optional || def.default.is_some() || def.is_wildcard() {
				continue;
			}
			if !def.allows(SettingScope::System) {
				continue;
			}

			if self.store().get_one(&SettingLocator::system(), &def.key).await?.is_none() {
				return Err(Error::ValidationError(format!(
					"Required setting '{}' is not configured",
					def.key
				)));
			}
		}
		Ok(())
	}

	/// Cache source holding every effective setting of one user
	pub fn effective_source(
		&self,
		cache_key: impl Into<String>,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		ttl: Option<Duration>,
	) -> EffectiveSettingsSource {
		EffectiveSettingsSource::new(cache_key, self.resolver.clone(), workspace_id, user_id)
			.with_ttl(ttl)
	}
}

impl std::fmt::Debug for SettingsFacade {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SettingsFacade")
			.field("registry", &self.registry)
			.field("strict_keys", &self.strict_keys)
			.finish_non_exhaustive()
	}
}


// vim: ts=4
