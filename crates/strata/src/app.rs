//! App builder - wires the settings and cache subsystems at startup
//!
//! Everything that used to be process-wide state lives in [`AppState`]: the
//! configuration store, the frozen setting definitions, the settings facade
//! and the cache registry. Modules contribute setting definitions and cache
//! sources through explicit registration callbacks. [`AppState::shutdown`]
//! disposes every cache entry.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backing_store::BackingStore;
use crate::cache::{CacheRegistry, CacheRegistryBuilder, MemoryBackingStore};
use crate::config::StrataConfig;
use crate::prelude::*;
use crate::settings::{
	CascadeResolver, ConfigurationStore, FrozenSettingsRegistry, SettingsFacade, SettingsRegistry,
};
use crate::settings_adapter::SettingsAdapter;
use crate::{core_settings, logging};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppState {
	pub opts: StrataConfig,

	pub settings_adapter: Arc<dyn SettingsAdapter>,
	pub backing_store: Arc<dyn BackingStore>,

	// Settings subsystem
	pub store: Arc<ConfigurationStore>,
	pub resolver: CascadeResolver,
	pub settings: Arc<SettingsFacade>,
	pub settings_registry: Arc<FrozenSettingsRegistry>,

	// Cache registry
	pub cache: Arc<CacheRegistry>,

	/// Stops background maintenance at shutdown
	shutdown: CancellationToken,
}

impl AppState {
	/// Stop background maintenance and dispose every cache entry in
	/// registration order. Safe to call more than once.
	pub async fn shutdown(&self) {
		if self.shutdown.is_cancelled() {
			return;
		}
		info!("Shutting down");
		self.shutdown.cancel();
		self.cache.dispose_all().await;
		info!("Shutdown complete");
	}

	pub fn is_shut_down(&self) -> bool {
		self.shutdown.is_cancelled()
	}
}

impl std::fmt::Debug for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppState")
			.field("opts", &self.opts)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}

pub type App = Arc<AppState>;

/// What cache registration callbacks get to build their sources from
pub struct CacheContext {
	pub resolver: CascadeResolver,
	pub settings: Arc<SettingsFacade>,
	pub backing_store: Arc<dyn BackingStore>,
}

pub struct Adapters {
	pub settings_adapter: Option<Arc<dyn SettingsAdapter>>,
	pub backing_store: Option<Arc<dyn BackingStore>>,
}

type SettingsCallback = Box<dyn FnOnce(&mut SettingsRegistry) -> ClResult<()> + Send>;
type CacheCallback =
	Box<dyn FnOnce(&mut CacheRegistryBuilder, &CacheContext) -> ClResult<()> + Send>;
/// Type alias for async initialization callbacks
type InitCallback = Box<dyn FnOnce(App) -> BoxFuture<'static, ClResult<()>> + Send>;

pub struct AppBuilder {
	opts: StrataConfig,
	adapters: Adapters,
	init_logging: bool,
	settings_callbacks: Vec<SettingsCallback>,
	cache_callbacks: Vec<CacheCallback>,
	on_init: Vec<InitCallback>,
}

impl AppBuilder {
	pub fn new() -> Self {
		Self::with_config(StrataConfig::default())
	}

	pub fn with_config(opts: StrataConfig) -> Self {
		AppBuilder {
			opts,
			adapters: Adapters { settings_adapter: None, backing_store: None },
			init_logging: false,
			settings_callbacks: Vec::new(),
			cache_callbacks: Vec::new(),
			on_init: Vec::new(),
		}
	}

	// Opts
	pub fn settings_cache_size(&mut self, size: usize) -> &mut Self {
		self.opts.settings_cache_size = size;
		self
	}
	pub fn backing_store_capacity(&mut self, capacity: usize) -> &mut Self {
		self.opts.backing_store_capacity = capacity;
		self
	}
	pub fn store_cache_ttl(&mut self, ttl: Option<Duration>) -> &mut Self {
		self.opts.store_cache_ttl = ttl;
		self
	}
	pub fn store_read_through(&mut self, enabled: bool) -> &mut Self {
		self.opts.store_read_through = enabled;
		self
	}
	pub fn strict_keys(&mut self, strict: bool) -> &mut Self {
		self.opts.strict_keys = strict;
		self
	}
	pub fn diagnostics_capacity(&mut self, capacity: usize) -> &mut Self {
		self.opts.diagnostics_capacity = capacity;
		self
	}
	pub fn maintenance_interval(&mut self, interval: Option<Duration>) -> &mut Self {
		self.opts.maintenance_interval = interval;
		self
	}
	pub fn log_filter(&mut self, filter: impl Into<String>) -> &mut Self {
		self.opts.log_filter = Some(filter.into());
		self
	}
	/// Install the tracing subscriber during `build`
	pub fn init_logging(&mut self, enabled: bool) -> &mut Self {
		self.init_logging = enabled;
		self
	}

	// Adapters
	pub fn settings_adapter(&mut self, settings_adapter: Arc<dyn SettingsAdapter>) -> &mut Self {
		self.adapters.settings_adapter = Some(settings_adapter);
		self
	}
	/// Tier-2 store; an in-memory one is created when none is given
	pub fn backing_store(&mut self, backing_store: Arc<dyn BackingStore>) -> &mut Self {
		self.adapters.backing_store = Some(backing_store);
		self
	}

	/// Register setting definitions, after the built-in ones
	pub fn register_settings<F>(&mut self, f: F) -> &mut Self
	where
		F: FnOnce(&mut SettingsRegistry) -> ClResult<()> + Send + 'static,
	{
		self.settings_callbacks.push(Box::new(f));
		self
	}

	/// Register cache sources. Callbacks run in order once the settings
	/// subsystem exists; a duplicate key aborts `build`.
	pub fn register_cache<F>(&mut self, f: F) -> &mut Self
	where
		F: FnOnce(&mut CacheRegistryBuilder, &CacheContext) -> ClResult<()> + Send + 'static,
	{
		self.cache_callbacks.push(Box::new(f));
		self
	}

	/// Register an async initialization callback that runs after the App is
	/// created, before `build` returns
	pub fn on_init<F, Fut>(&mut self, f: F) -> &mut Self
	where
		F: FnOnce(App) -> Fut + Send + 'static,
		Fut: Future<Output = ClResult<()>> + Send + 'static,
	{
		self.on_init.push(Box::new(move |app| Box::pin(f(app))));
		self
	}

	pub async fn build(self) -> ClResult<App> {
		if self.init_logging {
			logging::init(self.opts.log_filter.as_deref())?;
		}
		info!("Strata V{}", VERSION);

		let Some(settings_adapter) = self.adapters.settings_adapter else {
			error!("FATAL: No settings adapter configured");
			return Err(Error::Internal("No settings adapter configured".to_string()));
		};
		let backing_store: Arc<dyn BackingStore> = match self.adapters.backing_store {
			Some(backing_store) => backing_store,
			None => Arc::new(MemoryBackingStore::new(self.opts.backing_store_capacity)),
		};

		// Configuration store
		let mut store = ConfigurationStore::new(settings_adapter.clone());
		if self.opts.store_read_through {
			store = store.with_read_through(backing_store.clone(), self.opts.store_cache_ttl);
		}
		let store = Arc::new(store);
		let resolver = CascadeResolver::new(store.clone());

		// Initialize settings registry
		let mut settings_registry = SettingsRegistry::new();
		core_settings::register_settings(&mut settings_registry)?;
		for callback in self.settings_callbacks {
			callback(&mut settings_registry).inspect_err(|e| {
				error!("FATAL: Setting registration failed: {}", e);
			})?;
		}
		info!("Registered {} settings", settings_registry.len());

		// Freeze the registry
		let settings_registry = Arc::new(settings_registry.freeze());
		let settings = Arc::new(
			SettingsFacade::new(settings_registry.clone(), store.clone(), self.opts.settings_cache_size)
				.with_strict_keys(self.opts.strict_keys),
		);

		// Validate required settings are configured
		settings.validate_required_settings().await.inspect_err(|e| {
			error!("FATAL: {}", e);
		})?;
		info!("Settings subsystem initialized and validated");

		// Cache registry
		let context = CacheContext {
			resolver: resolver.clone(),
			settings: settings.clone(),
			backing_store: backing_store.clone(),
		};
		let mut cache_builder = CacheRegistryBuilder::with_diagnostics_capacity(self.opts.diagnostics_capacity);
		for callback in self.cache_callbacks {
			callback(&mut cache_builder, &context).inspect_err(|e| {
				error!("FATAL: Cache registration failed: {}", e);
			})?;
		}
		let cache = Arc::new(cache_builder.build());

		let app: App = Arc::new(AppState {
			opts: self.opts,
			settings_adapter,
			backing_store,
			store,
			resolver,
			settings,
			settings_registry,
			cache,
			shutdown: CancellationToken::new(),
		});

		// Run custom init callbacks
		for callback in self.on_init {
			if let Err(e) = callback(app.clone()).await {
				error!("FATAL: Init callback failed: {}", e);
				app.shutdown().await;
				return Err(e);
			}
		}

		if let Some(interval) = app.opts.maintenance_interval {
			spawn_maintenance(&app, interval);
		}

		Ok(app)
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Periodically refresh expired cache entries until shutdown
fn spawn_maintenance(app: &App, interval: Duration) {
	let cache = app.cache.clone();
	let shutdown = app.shutdown.clone();
	info!("Cache maintenance every {:?}", interval);
	tokio::spawn(async move {
		loop {
			tokio::select! {
				() = shutdown.cancelled() => break,
				() = tokio::time::sleep(interval) => {}
			}
			match cache.refresh_expired(&shutdown).await {
				Ok(0) => {}
				Ok(n) => debug!("Cache maintenance refreshed {} entries", n),
				Err(e) => {
					debug!("Cache maintenance stopped: {}", e);
					break;
				}
			}
		}
	});
}

// vim: ts=4
