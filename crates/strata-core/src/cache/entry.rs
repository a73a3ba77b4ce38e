//! Self-refreshing cache entry
//!
//! A [`CacheEntry`] wraps a [`CacheSource`] and keeps its last successfully
//! loaded value. Refreshes are single-flight: a per-entry async gate admits one
//! refresh at a time, and callers that queued behind it take the outcome of the
//! refresh that completed while they waited instead of running another one.
//!
//! A failed or cancelled refresh never replaces a loaded value. The failure is
//! logged and sent to the registry's diagnostics channel; only a caller with no
//! value to fall back on receives the error.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;

/// What an expired read does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
	/// Wait for the refresh and return the refreshed value
	#[default]
	Blocking,
	/// Return the stale value at once and refresh in a background task.
	/// The first load still blocks.
	Background,
}

/// Producer of a cached value
#[async_trait]
pub trait CacheSource: Send + Sync + 'static {
	type Value: Clone + Send + Sync + 'static;

	/// Globally unique key
	fn key(&self) -> &str;

	/// Time-to-live of a loaded value, `None` never expires
	fn ttl(&self) -> Option<Duration> {
		None
	}

	fn policy(&self) -> RefreshPolicy {
		RefreshPolicy::Blocking
	}

	/// Load a fresh value. Must be idempotent.
	async fn refresh(&self, cancel: &CancellationToken) -> ClResult<Self::Value>;

	/// Release resources held by the source at shutdown
	async fn dispose(&self) {}
}

/// Event sent to the registry's diagnostics channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDiagnostic {
	RefreshFailed { key: Box<str>, reason: String, stale_value_kept: bool },
	RefreshCancelled { key: Box<str> },
}

/// Point-in-time statistics of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
	pub key: String,
	pub value_type: &'static str,
	pub loaded: bool,
	pub expired: bool,
	pub hits: u64,
	pub misses: u64,
	pub refreshes: u64,
	pub failures: u64,
	pub cancellations: u64,
	pub stale_served: u64,
}

#[derive(Debug, Default)]
struct Counters {
	hits: AtomicU64,
	misses: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
	cancellations: AtomicU64,
	stale_served: AtomicU64,
}

#[derive(Debug, Clone)]
enum Outcome {
	Loaded,
	Failed(String),
	Cancelled,
}

struct EntryState<T> {
	value: Option<T>,
	refreshed_at: Option<Instant>,
	/// Completed refresh attempts, successful or not
	attempts: u64,
	last_outcome: Option<Outcome>,
}

pub struct CacheEntry<T> {
	key: Box<str>,
	ttl: Option<Duration>,
	policy: RefreshPolicy,
	source: Arc<dyn CacheSource<Value = T>>,
	state: RwLock<EntryState<T>>,
	gate: tokio::sync::Mutex<()>,
	background_pending: AtomicBool,
	disposed: AtomicBool,
	counters: Counters,
	diagnostics: flume::Sender<CacheDiagnostic>,
}

impl<T: Clone + Send + Sync + 'static> CacheEntry<T> {
	pub fn new(
		source: Arc<dyn CacheSource<Value = T>>,
		diagnostics: flume::Sender<CacheDiagnostic>,
	) -> Self {
		Self {
			key: source.key().into(),
			ttl: source.ttl(),
			policy: source.policy(),
			source,
			state: RwLock::new(EntryState {
				value: None,
				refreshed_at: None,
				attempts: 0,
				last_outcome: None,
			}),
			gate: tokio::sync::Mutex::new(()),
			background_pending: AtomicBool::new(false),
			disposed: AtomicBool::new(false),
			counters: Counters::default(),
			diagnostics,
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn ttl(&self) -> Option<Duration> {
		self.ttl
	}

	pub fn policy(&self) -> RefreshPolicy {
		self.policy
	}

	pub fn value_type(&self) -> &'static str {
		std::any::type_name::<T>()
	}

	/// Current value without triggering a refresh
	pub fn peek(&self) -> Option<T> {
		self.state.read().value.clone()
	}

	pub fn last_refreshed_at(&self) -> Option<Instant> {
		self.state.read().refreshed_at
	}

	/// True when the entry was never loaded, or its TTL has elapsed since the
	/// last successful refresh
	pub fn is_expired(&self) -> bool {
		let state = self.state.read();
		self.expired(&state, Instant::now())
	}

	fn expired(&self, state: &EntryState<T>, now: Instant) -> bool {
		match (state.refreshed_at, self.ttl) {
			(None, _) => true,
			(Some(_), None) => false,
			(Some(at), Some(ttl)) => now.duration_since(at) > ttl,
		}
	}

	fn ensure_live(&self) -> ClResult<()> {
		if self.disposed.load(Ordering::Acquire) {
			return Err(Error::Disposed(self.key.to_string()));
		}
		Ok(())
	}

	pub async fn get_value(self: &Arc<Self>) -> ClResult<T> {
		self.get_value_with(&CancellationToken::new()).await
	}

	/// Like [`get_value`](Self::get_value), with a cancellation token for the
	/// refresh this call may have to run
	pub async fn get_value_with(self: &Arc<Self>, cancel: &CancellationToken) -> ClResult<T> {
		self.ensure_live()?;
		let (snapshot, observed) = {
			let state = self.state.read();
			let expired = self.expired(&state, Instant::now());
			(state.value.clone().map(|value| (value, expired)), state.attempts)
		};

		match snapshot {
			Some((value, false)) => {
				self.counters.hits.fetch_add(1, Ordering::Relaxed);
				Ok(value)
			}
			Some((value, true)) if self.policy == RefreshPolicy::Background => {
				self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
				self.spawn_background_refresh(observed);
				Ok(value)
			}
			_ => {
				self.counters.misses.fetch_add(1, Ordering::Relaxed);
				self.refresh_after(observed, cancel).await
			}
		}
	}

	/// Refresh regardless of TTL. Joins an in-flight refresh if there is one.
	///
	/// Returns the refreshed value, or the retained value if the refresh failed
	/// or was cancelled after an earlier successful load.
	pub async fn refresh(&self, cancel: &CancellationToken) -> ClResult<T> {
		self.ensure_live()?;
		let observed = self.state.read().attempts;
		self.refresh_after(observed, cancel).await
	}

	/// Refresh only if expired, returning whether a refresh was attempted
	pub async fn refresh_if_expired(&self, cancel: &CancellationToken) -> ClResult<bool> {
		self.ensure_live()?;
		let observed = {
			let state = self.state.read();
			if !self.expired(&state, Instant::now()) {
				return Ok(false);
			}
			state.attempts
		};
		self.refresh_after(observed, cancel).await?;
		Ok(true)
	}

	/// Run a refresh unless another one completed since `observed` was read
	async fn refresh_after(&self, observed: u64, cancel: &CancellationToken) -> ClResult<T> {
		let _gate = self.gate.lock().await;
		self.ensure_live()?;
		{
			let state = self.state.read();
			if state.attempts != observed {
				return self.joined_result(&state);
			}
		}
		self.run_refresh(cancel).await
	}

	fn joined_result(&self, state: &EntryState<T>) -> ClResult<T> {
		if let Some(value) = &state.value {
			return Ok(value.clone());
		}
		match &state.last_outcome {
			Some(Outcome::Failed(reason)) => {
				Err(Error::RefreshFailed { key: self.key.to_string(), reason: reason.clone() })
			}
			Some(Outcome::Cancelled) => Err(Error::Cancelled(self.key.to_string())),
			Some(Outcome::Loaded) | None => {
				Err(Error::Internal(format!("cache entry '{}' has no value", self.key)))
			}
		}
	}

	async fn run_refresh(&self, cancel: &CancellationToken) -> ClResult<T> {
		debug!("Refreshing cache entry '{}'", self.key);
		let result = tokio::select! {
			biased;
			() = cancel.cancelled() => None,
			res = self.source.refresh(cancel) => Some(res),
		};

		let mut state = self.state.write();
		state.attempts += 1;
		match result {
			Some(Ok(value)) => {
				state.value = Some(value.clone());
				state.refreshed_at = Some(Instant::now());
				state.last_outcome = Some(Outcome::Loaded);
				self.counters.refreshes.fetch_add(1, Ordering::Relaxed);
				Ok(value)
			}
			Some(Err(_)) | None if cancel.is_cancelled() => {
				state.last_outcome = Some(Outcome::Cancelled);
				let stale = state.value.clone();
				drop(state);
				self.counters.cancellations.fetch_add(1, Ordering::Relaxed);
				info!("Refresh of cache entry '{}' cancelled", self.key);
				self.report(CacheDiagnostic::RefreshCancelled { key: self.key.clone() });
				stale.ok_or_else(|| Error::Cancelled(self.key.to_string()))
			}
			Some(Err(err)) => {
				let reason = err.to_string();
				state.last_outcome = Some(Outcome::Failed(reason.clone()));
				let stale = state.value.clone();
				drop(state);
				self.counters.failures.fetch_add(1, Ordering::Relaxed);
				warn!("Refresh of cache entry '{}' failed: {}", self.key, reason);
				self.report(CacheDiagnostic::RefreshFailed {
					key: self.key.clone(),
					reason: reason.clone(),
					stale_value_kept: stale.is_some(),
				});
				stale.ok_or_else(|| Error::RefreshFailed { key: self.key.to_string(), reason })
			}
			None => {
				// select only yields None on cancellation
				Err(Error::Cancelled(self.key.to_string()))
			}
		}
	}

	fn spawn_background_refresh(self: &Arc<Self>, observed: u64) {
		if self.background_pending.swap(true, Ordering::AcqRel) {
			return;
		}
		let entry = Arc::clone(self);
		tokio::spawn(async move {
			if let Err(err) = entry.refresh_after(observed, &CancellationToken::new()).await {
				debug!("Background refresh of '{}' gave no value: {}", entry.key, err);
			}
			entry.background_pending.store(false, Ordering::Release);
		});
	}

	fn report(&self, diagnostic: CacheDiagnostic) {
		if let Err(flume::TrySendError::Full(_)) = self.diagnostics.try_send(diagnostic) {
			debug!("Cache diagnostics channel full, dropping event for '{}'", self.key);
		}
	}

	/// Release the held value and the source's resources. Waits for an
	/// in-flight refresh. Later reads fail with `Disposed`.
	pub async fn dispose(&self) {
		if self.disposed.swap(true, Ordering::AcqRel) {
			return;
		}
		let _gate = self.gate.lock().await;
		{
			let mut state = self.state.write();
			state.value = None;
			state.refreshed_at = None;
		}
		self.source.dispose().await;
		debug!("Disposed cache entry '{}'", self.key);
	}

	pub fn stats(&self) -> CacheStats {
		let (loaded, expired) = {
			let state = self.state.read();
			(state.value.is_some(), self.expired(&state, Instant::now()))
		};
		CacheStats {
			key: self.key.to_string(),
			value_type: self.value_type(),
			loaded,
			expired,
			hits: self.counters.hits.load(Ordering::Relaxed),
			misses: self.counters.misses.load(Ordering::Relaxed),
			refreshes: self.counters.refreshes.load(Ordering::Relaxed),
			failures: self.counters.failures.load(Ordering::Relaxed),
			cancellations: self.counters.cancellations.load(Ordering::Relaxed),
			stale_served: self.counters.stale_served.load(Ordering::Relaxed),
		}
	}
}

impl<T> std::fmt::Debug for CacheEntry<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CacheEntry")
			.field("key", &self.key)
			.field("ttl", &self.ttl)
			.field("policy", &self.policy)
			.field("disposed", &self.disposed.load(Ordering::Relaxed))
			.finish_non_exhaustive()
	}
}


// vim: ts=4
