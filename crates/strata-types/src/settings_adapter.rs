//! Adapter that persists setting rows.
//!
//! The configuration store is persistence-agnostic: every read and write goes
//! through this trait. Implementations receive already validated locators and
//! normalized keys, and only need to honor the composite-key uniqueness of
//! `(scope, workspace_id, user_id, key)`.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;
use crate::setting::{Setting, SettingLocator};

#[async_trait]
pub trait SettingsAdapter: Debug + Send + Sync {
	/// List all rows stored at exactly this locator
	async fn list_settings(&self, locator: &SettingLocator) -> ClResult<Vec<Setting>>;

	/// Read a single row
	async fn read_setting(&self, locator: &SettingLocator, key: &str)
		-> ClResult<Option<Setting>>;

	/// Create or replace the row identified by the setting's composite key
	async fn write_setting(&self, setting: &Setting) -> ClResult<()>;

	/// Delete a row, returning whether it existed
	async fn delete_setting(&self, locator: &SettingLocator, key: &str) -> ClResult<bool>;
}

// vim: ts=4
