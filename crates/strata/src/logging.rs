//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::prelude::*;

/// Install the global fmt subscriber. `filter` takes precedence over
/// `RUST_LOG`. Returns false if a subscriber was already installed.
pub fn init(filter: Option<&str>) -> ClResult<bool> {
	let env_filter = match filter {
		Some(directives) => EnvFilter::try_new(directives).map_err(|e| {
			Error::ConfigError(format!("invalid log filter '{}': {}", directives, e))
		})?,
		None => EnvFilter::from_default_env(),
	};

	let installed = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_target(false)
		.try_init()
		.is_ok();
	if installed {
		debug!("Logging initialized");
	}
	Ok(installed)
}


// vim: ts=4
