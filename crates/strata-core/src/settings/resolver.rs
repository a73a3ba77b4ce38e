//! Lock-aware cascade resolution
//!
//! Resolution is top-down with lock short-circuit: a locked System row wins
//! outright, then a locked Workspace row; otherwise the most specific row wins
//! (User, then Workspace, then System).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::store::ConfigurationStore;
use crate::prelude::*;
use strata_types::setting::{Setting, SettingLocator, SettingScope, ValueType, normalize_key};

/// Resolved value of a key together with the scope it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSetting {
	pub key: String,
	pub value: String,
	pub value_type: ValueType,
	pub origin: SettingScope,
	pub is_locked: bool,
}

impl From<&Setting> for EffectiveSetting {
	fn from(row: &Setting) -> Self {
		Self {
			key: row.key.clone(),
			value: row.value.clone(),
			value_type: row.value_type,
			origin: row.scope,
			is_locked: row.is_locked,
		}
	}
}

/// Pick the effective row among the three scope rows of one key
pub fn cascade(
	system: Option<&Setting>,
	workspace: Option<&Setting>,
	user: Option<&Setting>,
) -> Option<EffectiveSetting> {
	let winner = match (system, workspace) {
		(Some(row), _) if row.is_locked => row,
		(_, Some(row)) if row.is_locked => row,
		_ => user.or(workspace).or(system)?,
	};
	Some(EffectiveSetting::from(winner))
}

#[derive(Debug, Clone)]
pub struct CascadeResolver {
	store: Arc<ConfigurationStore>,
}

impl CascadeResolver {
	pub fn new(store: Arc<ConfigurationStore>) -> Self {
		Self { store }
	}

	pub fn store(&self) -> &Arc<ConfigurationStore> {
		&self.store
	}

	/// Effective value of `key` for a user in a workspace. Reads stop at the
	/// first locked row.
	pub async fn get_effective(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
		key: &str,
	) -> ClResult<Option<EffectiveSetting>> {
		let key = normalize_key(key)?;

		let system = self.store.get_one(&SettingLocator::system(), &key).await?;
		if let Some(row) = system.as_ref().filter(|row| row.is_locked) {
			debug!("Setting '{}' locked at system scope", key);
			return Ok(Some(EffectiveSetting::from(row)));
		}

		let workspace =
			self.store.get_one(&SettingLocator::workspace(workspace_id.clone()), &key).await?;
		if let Some(row) = workspace.as_ref().filter(|row| row.is_locked) {
			debug!("Setting '{}' locked for workspace {}", key, workspace_id);
			return Ok(Some(EffectiveSetting::from(row)));
		}

		let user = self
			.store
			.get_one(&SettingLocator::user(workspace_id.clone(), user_id.clone()), &key)
			.await?;
		Ok(cascade(system.as_ref(), workspace.as_ref(), user.as_ref()))
	}

	/// Effective value of `key` at workspace level, ignoring user rows
	pub async fn get_effective_for_workspace(
		&self,
		workspace_id: &WorkspaceId,
		key: &str,
	) -> ClResult<Option<EffectiveSetting>> {
		let key = normalize_key(key)?;

		let system = self.store.get_one(&SettingLocator::system(), &key).await?;
		if let Some(row) = system.as_ref().filter(|row| row.is_locked) {
			return Ok(Some(EffectiveSetting::from(row)));
		}
		let workspace =
			self.store.get_one(&SettingLocator::workspace(workspace_id.clone()), &key).await?;
		Ok(cascade(system.as_ref(), workspace.as_ref(), None))
	}

	/// Effective values of every key present at any of the three scopes
	pub async fn get_effective_all(
		&self,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> ClResult<HashMap<String, EffectiveSetting>> {
		let system_loc = SettingLocator::system();
		let workspace_loc = SettingLocator::workspace(workspace_id.clone());
		let user_loc = SettingLocator::user(workspace_id.clone(), user_id.clone());

		let (system, workspace, user) = futures::try_join!(
			self.store.get_scoped(&system_loc),
			self.store.get_scoped(&workspace_loc),
			self.store.get_scoped(&user_loc),
		)?;

		let keys: BTreeSet<&String> =
			system.keys().chain(workspace.keys()).chain(user.keys()).collect();
		let resolved = keys
			.into_iter()
			.filter_map(|key| {
				cascade(system.get(key), workspace.get(key), user.get(key))
					.map(|effective| (key.clone(), effective))
			})
			.collect();
		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(locator: SettingLocator, value: &str, locked: bool) -> Setting {
		Setting {
			scope: locator.scope,
			workspace_id: locator.workspace_id,
			user_id: locator.user_id,
			key: "theme".into(),
			value: value.into(),
			value_type: ValueType::String,
			is_locked: locked,
			category: None,
			description: None,
			created_at: Timestamp(0),
			updated_at: Timestamp(0),
			created_by: None,
			updated_by: None,
		}
	}

	#[test]
	fn test_cascade_most_specific_wins() {
		let system = row(SettingLocator::system(), "s", false);
		let workspace = row(SettingLocator::workspace("w"), "w", false);
		let user = row(SettingLocator::user("w", "u"), "u", false);

		let eff = cascade(Some(&system), Some(&workspace), Some(&user)).unwrap();
		assert_eq!((eff.value.as_str(), eff.origin), ("u", SettingScope::User));

		let eff = cascade(Some(&system), Some(&workspace), None).unwrap();
		assert_eq!((eff.value.as_str(), eff.origin), ("w", SettingScope::Workspace));

		let eff = cascade(Some(&system), None, None).unwrap();
		assert_eq!((eff.value.as_str(), eff.origin), ("s", SettingScope::System));

		assert!(cascade(None, None, None).is_none());
	}

	#[test]
	fn test_cascade_locks_short_circuit() {
		let system_locked = row(SettingLocator::system(), "s", true);
		let workspace_locked = row(SettingLocator::workspace("w"), "w", true);
		let user = row(SettingLocator::user("w", "u"), "u", false);

		let eff = cascade(Some(&system_locked), Some(&workspace_locked), Some(&user)).unwrap();
		assert_eq!(eff.origin, SettingScope::System);
		assert!(eff.is_locked);

		let system = row(SettingLocator::system(), "s", false);
		let eff = cascade(Some(&system), Some(&workspace_locked), Some(&user)).unwrap();
		assert_eq!(eff.origin, SettingScope::Workspace);

		// a lock only applies when the row exists
		let eff = cascade(None, Some(&workspace_locked), Some(&user)).unwrap();
		assert_eq!(eff.value, "w");
	}

	#[test]
	fn test_locked_user_row_has_no_special_effect() {
		let workspace = row(SettingLocator::workspace("w"), "w", false);
		let user_locked = row(SettingLocator::user("w", "u"), "u", true);

		let eff = cascade(None, Some(&workspace), Some(&user_locked)).unwrap();
		assert_eq!(eff.value, "u");
	}
}

// vim: ts=4
