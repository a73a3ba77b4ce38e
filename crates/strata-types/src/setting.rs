//! Persisted setting record and scope addressing
//!
//! A setting row is addressed by its composite key
//! `(scope, workspace_id, user_id, key)`. The [`SettingLocator`] carries the
//! first three parts and enforces the scope rules:
//!
//! | scope     | workspace_id | user_id |
//! |-----------|--------------|---------|
//! | System    | none         | none    |
//! | Workspace | some         | none    |
//! | User      | some         | some    |

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::prelude::*;

/// Maximum length of a setting key in bytes
pub const MAX_KEY_LENGTH: usize = 255;

/// Level at which a setting is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SettingScope {
	#[serde(rename = "system")]
	System,
	#[serde(rename = "workspace")]
	Workspace,
	#[serde(rename = "user")]
	User,
}

impl SettingScope {
	pub fn as_str(self) -> &'static str {
		match self {
			SettingScope::System => "system",
			SettingScope::Workspace => "workspace",
			SettingScope::User => "user",
		}
	}
}

impl std::fmt::Display for SettingScope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Type hint for the string-encoded value of a setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
	#[default]
	#[serde(rename = "string")]
	String,
	#[serde(rename = "int")]
	Int,
	#[serde(rename = "float")]
	Float,
	#[serde(rename = "bool")]
	Bool,
	#[serde(rename = "json")]
	Json,
}

impl ValueType {
	/// Get the type name for error messages
	pub fn type_name(self) -> &'static str {
		match self {
			ValueType::String => "string",
			ValueType::Int => "int",
			ValueType::Float => "float",
			ValueType::Bool => "bool",
			ValueType::Json => "json",
		}
	}

	/// Check that `value` is a valid encoding of this type
	pub fn validate(self, value: &str) -> ClResult<()> {
		let ok = match self {
			ValueType::String => true,
			ValueType::Int => value.parse::<i64>().is_ok(),
			ValueType::Float => value.parse::<f64>().is_ok(),
			ValueType::Bool => matches!(value, "true" | "false"),
			ValueType::Json => serde_json::from_str::<serde_json::Value>(value).is_ok(),
		};
		if ok {
			Ok(())
		} else {
			Err(Error::ValidationError(format!(
				"value '{}' is not a valid {}",
				value,
				self.type_name()
			)))
		}
	}
}

/// Scope part of a setting's composite key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingLocator {
	pub scope: SettingScope,
	pub workspace_id: Option<WorkspaceId>,
	pub user_id: Option<UserId>,
}

impl SettingLocator {
	pub fn system() -> Self {
		Self { scope: SettingScope::System, workspace_id: None, user_id: None }
	}

	pub fn workspace(workspace_id: impl Into<WorkspaceId>) -> Self {
		Self { scope: SettingScope::Workspace, workspace_id: Some(workspace_id.into()), user_id: None }
	}

	pub fn user(workspace_id: impl Into<WorkspaceId>, user_id: impl Into<UserId>) -> Self {
		Self {
			scope: SettingScope::User,
			workspace_id: Some(workspace_id.into()),
			user_id: Some(user_id.into()),
		}
	}

	/// Check the ids against the scope rules
	pub fn validate(&self) -> ClResult<()> {
		match (self.scope, &self.workspace_id, &self.user_id) {
			(SettingScope::System, None, None)
			| (SettingScope::Workspace, Some(_), None)
			| (SettingScope::User, Some(_), Some(_)) => Ok(()),
			(scope, ws, user) => Err(Error::InvalidScopeCombination(format!(
				"{} scope with workspace_id={} user_id={}",
				scope,
				if ws.is_some() { "set" } else { "null" },
				if user.is_some() { "set" } else { "null" },
			))),
		}
	}
}

impl std::fmt::Display for SettingLocator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.scope.as_str())?;
		if let Some(ws) = &self.workspace_id {
			write!(f, "/{}", ws)?;
		}
		if let Some(user) = &self.user_id {
			write!(f, "/{}", user)?;
		}
		Ok(())
	}
}

/// Persisted setting row
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
	pub scope: SettingScope,
	pub workspace_id: Option<WorkspaceId>,
	pub user_id: Option<UserId>,
	/// Normalized (lowercase) key, dot-separated paths allowed (e.g. "ui.theme")
	pub key: String,
	pub value: String,
	pub value_type: ValueType,
	pub is_locked: bool,
	pub category: Option<String>,
	pub description: Option<String>,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
	pub created_by: Option<UserId>,
	pub updated_by: Option<UserId>,
}

impl Setting {
	pub fn locator(&self) -> SettingLocator {
		SettingLocator {
			scope: self.scope,
			workspace_id: self.workspace_id.clone(),
			user_id: self.user_id.clone(),
		}
	}
}

/// Normalize a setting key for storage and lookup
///
/// Keys are case-insensitive, so they are stored lowercased.
pub fn normalize_key(key: &str) -> ClResult<String> {
	if key.is_empty() {
		return Err(Error::ValidationError("setting key must not be empty".into()));
	}
	if key.len() > MAX_KEY_LENGTH {
		return Err(Error::ValidationError(format!(
			"setting key exceeds {} bytes",
			MAX_KEY_LENGTH
		)));
	}
	if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(Error::ValidationError(format!("invalid setting key '{}'", key)));
	}
	// ASCII folding keeps the byte length within the limit
	Ok(key.to_ascii_lowercase())
}


// vim: ts=4
