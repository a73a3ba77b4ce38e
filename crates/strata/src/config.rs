//! Runtime configuration
//!
//! Defaults are built in. [`StrataConfig::from_env`] overrides them from
//! `STRATA_*` environment variables; `AppBuilder` setters override both.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `STRATA_SETTINGS_CACHE_SIZE` | resolved settings memo capacity | 1000 |
//! | `STRATA_BACKING_STORE_CAPACITY` | in-memory backing store capacity | 10000 |
//! | `STRATA_STORE_CACHE_TTL_SECS` | store read-through TTL, 0 = until next write | 30 |
//! | `STRATA_STORE_READ_THROUGH` | read settings through the backing store | true |
//! | `STRATA_STRICT_KEYS` | reject writes to undefined keys | false |
//! | `STRATA_DIAGNOSTICS_CAPACITY` | cache diagnostics channel capacity | 256 |
//! | `STRATA_MAINTENANCE_INTERVAL_SECS` | expired entry refresh interval, 0 = off | 0 |
//! | `STRATA_LOG` | tracing filter directive | `RUST_LOG` |

use std::str::FromStr;
use std::time::Duration;

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrataConfig {
	pub settings_cache_size: usize,
	pub backing_store_capacity: usize,
	pub store_cache_ttl: Option<Duration>,
	pub store_read_through: bool,
	pub strict_keys: bool,
	pub diagnostics_capacity: usize,
	pub maintenance_interval: Option<Duration>,
	pub log_filter: Option<String>,
}

impl Default for StrataConfig {
	fn default() -> Self {
		Self {
			settings_cache_size: 1000,
			backing_store_capacity: 10_000,
			store_cache_ttl: Some(Duration::from_secs(30)),
			store_read_through: true,
			strict_keys: false,
			diagnostics_capacity: 256,
			maintenance_interval: None,
			log_filter: None,
		}
	}
}

impl StrataConfig {
	pub fn from_env() -> ClResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Build from defaults overridden by `lookup(variable)`
	pub fn from_lookup<F>(lookup: F) -> ClResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut config = Self::default();

		if let Some(v) = parse_var::<usize>(&lookup, "STRATA_SETTINGS_CACHE_SIZE")? {
			config.settings_cache_size = non_zero("STRATA_SETTINGS_CACHE_SIZE", v)?;
		}
		if let Some(v) = parse_var::<usize>(&lookup, "STRATA_BACKING_STORE_CAPACITY")? {
			config.backing_store_capacity = non_zero("STRATA_BACKING_STORE_CAPACITY", v)?;
		}
		if let Some(secs) = parse_var::<u64>(&lookup, "STRATA_STORE_CACHE_TTL_SECS")? {
			config.store_cache_ttl = (secs > 0).then(|| Duration::from_secs(secs));
		}
		if let Some(v) = parse_bool(&lookup, "STRATA_STORE_READ_THROUGH")? {
			config.store_read_through = v;
		}
		if let Some(v) = parse_bool(&lookup, "STRATA_STRICT_KEYS")? {
			config.strict_keys = v;
		}
		if let Some(v) = parse_var::<usize>(&lookup, "STRATA_DIAGNOSTICS_CAPACITY")? {
			config.diagnostics_capacity = non_zero("STRATA_DIAGNOSTICS_CAPACITY", v)?;
		}
		if let Some(secs) = parse_var::<u64>(&lookup, "STRATA_MAINTENANCE_INTERVAL_SECS")? {
			config.maintenance_interval = (secs > 0).then(|| Duration::from_secs(secs));
		}
		if let Some(filter) = lookup("STRATA_LOG").filter(|f| !f.trim().is_empty()) {
			config.log_filter = Some(filter);
		}

		Ok(config)
	}
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> ClResult<Option<T>> {
	let Some(raw) = lookup(name) else {
		return Ok(None);
	};
	raw.trim()
		.parse::<T>()
		.map(Some)
		.map_err(|_| Error::ConfigError(format!("{}: invalid value '{}'", name, raw)))
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> ClResult<Option<bool>> {
	let Some(raw) = lookup(name) else {
		return Ok(None);
	};
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(Some(true)),
		"0" | "false" | "no" | "off" => Ok(Some(false)),
		_ => Err(Error::ConfigError(format!("{}: invalid boolean '{}'", name, raw))),
	}
}

fn non_zero(name: &str, value: usize) -> ClResult<usize> {
	if value == 0 {
		return Err(Error::ConfigError(format!("{} must be greater than zero", name)));
	}
	Ok(value)
}


// vim: ts=4
