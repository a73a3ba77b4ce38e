//! In-memory settings adapter
//!
//! Stores setting rows in an ordered map keyed by their composite key. Rows
//! are checked against the scope rules on write, so the adapter never holds a
//! row that violates them even when used directly.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use strata::error::{ClResult, Error};
use strata::setting::{Setting, SettingLocator, SettingScope};
use strata::settings_adapter::SettingsAdapter;

/// Composite key: (scope, workspace_id, user_id, key)
type RowKey = (SettingScope, Option<Box<str>>, Option<Box<str>>, String);

fn row_key(locator: &SettingLocator, key: &str) -> RowKey {
	(
		locator.scope,
		locator.workspace_id.as_ref().map(|ws| ws.0.clone()),
		locator.user_id.as_ref().map(|user| user.0.clone()),
		key.to_string(),
	)
}

#[derive(Debug, Default)]
pub struct SettingsAdapterMemory {
	rows: RwLock<BTreeMap<RowKey, Setting>>,
}

impl SettingsAdapterMemory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored rows across all scopes
	pub fn len(&self) -> usize {
		self.rows.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.read().is_empty()
	}
}

#[async_trait]
impl SettingsAdapter for SettingsAdapterMemory {
	async fn list_settings(&self, locator: &SettingLocator) -> ClResult<Vec<Setting>> {
		locator.validate()?;
		let start = row_key(locator, "");
		let rows = self.rows.read();
		Ok(rows
			.range(start..)
			.take_while(|((scope, ws, user, _), _)| {
				*scope == locator.scope
					&& ws.as_deref() == locator.workspace_id.as_ref().map(|w| w.as_str())
					&& user.as_deref() == locator.user_id.as_ref().map(|u| u.as_str())
			})
			.map(|(_, setting)| setting.clone())
			.collect())
	}

	async fn read_setting(
		&self,
		locator: &SettingLocator,
		key: &str,
	) -> ClResult<Option<Setting>> {
		locator.validate()?;
		Ok(self.rows.read().get(&row_key(locator, key)).cloned())
	}

	async fn write_setting(&self, setting: &Setting) -> ClResult<()> {
		let locator = setting.locator();
		locator.validate()?;
		if setting.key.is_empty() {
			return Err(Error::ValidationError("setting key must not be empty".into()));
		}
		debug!("memory adapter: write {} {}", locator, setting.key);
		self.rows.write().insert(row_key(&locator, &setting.key), setting.clone());
		Ok(())
	}

	async fn delete_setting(&self, locator: &SettingLocator, key: &str) -> ClResult<bool> {
		locator.validate()?;
		Ok(self.rows.write().remove(&row_key(locator, key)).is_some())
	}
}

// vim: ts=4
