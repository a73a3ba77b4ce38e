//! Tier-2 backing store: a passive key/value store with per-key expiry.
//!
//! The raw interface works on JSON values so that it stays object-safe and a
//! distributed implementation can replace the in-process one without touching
//! callers. Typed access is provided by [`BackingStoreExt`], implemented for
//! every store. Only single-key operations are atomic; `get_or_create` is a
//! read followed by a write.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use crate::prelude::*;

#[async_trait]
pub trait BackingStore: Debug + Send + Sync {
	/// Read a value. Expired values read as `None`.
	async fn get_raw(&self, key: &str) -> ClResult<Option<serde_json::Value>>;

	/// Store a value, replacing any previous one. `expiry` of `None` never expires.
	async fn set_raw(
		&self,
		key: &str,
		value: serde_json::Value,
		expiry: Option<Duration>,
	) -> ClResult<()>;

	/// Remove a value, returning whether a live value was present
	async fn remove(&self, key: &str) -> ClResult<bool>;

	async fn exists(&self, key: &str) -> ClResult<bool>;

	/// Remove every key starting with `prefix`, returning the number removed
	async fn remove_prefix(&self, prefix: &str) -> ClResult<usize>;
}

#[async_trait]
pub trait BackingStoreExt: BackingStore {
	async fn get<T>(&self, key: &str) -> ClResult<Option<T>>
	where
		T: DeserializeOwned + Send,
	{
		match self.get_raw(key).await? {
			Some(value) => Ok(Some(serde_json::from_value(value)?)),
			None => Ok(None),
		}
	}

	async fn set<T>(&self, key: &str, value: &T, expiry: Option<Duration>) -> ClResult<()>
	where
		T: Serialize + Sync,
	{
		let value = serde_json::to_value(value)?;
		self.set_raw(key, value, expiry).await
	}

	/// Return the stored value or compute, store and return it
	async fn get_or_create<T, F, Fut>(
		&self,
		key: &str,
		factory: F,
		expiry: Option<Duration>,
	) -> ClResult<T>
	where
		T: Serialize + DeserializeOwned + Send + Sync,
		F: FnOnce() -> Fut + Send,
		Fut: Future<Output = ClResult<T>> + Send,
	{
		if let Some(value) = self.get::<T>(key).await? {
			return Ok(value);
		}
		let value = factory().await?;
		self.set(key, &value, expiry).await?;
		Ok(value)
	}
}

impl<S: BackingStore + ?Sized> BackingStoreExt for S {}

// vim: ts=4
