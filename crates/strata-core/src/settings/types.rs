//! Setting definitions
//!
//! Definitions describe the settings an application knows about: their value
//! type, default, the scopes they may be written at and an optional validator.
//! They are collected at startup and frozen before the facade is built.

use std::collections::HashMap;
use std::fmt::Debug;

use crate::prelude::*;
use strata_types::setting::{SettingScope, ValueType, normalize_key};

/// Type alias for setting validator function
pub type SettingValidator = Box<dyn Fn(&str) -> ClResult<()> + Send + Sync>;

const ALL_SCOPES: [SettingScope; 3] =
	[SettingScope::System, SettingScope::Workspace, SettingScope::User];

/// Setting definition - metadata for one key or a `prefix.*` family of keys
pub struct SettingDefinition {
	/// Normalized dot-separated key (e.g. "ui.theme"), or a wildcard "ui.*"
	pub key: String,

	pub description: String,

	/// String-encoded default, applied when no scope resolves the key.
	/// If None and optional=false, the setting MUST be configured at System scope.
	pub default: Option<String>,

	pub value_type: ValueType,

	pub category: Option<String>,

	/// Scopes the setting may be written at
	pub scopes: Vec<SettingScope>,

	/// Whether this setting may stay unconfigured without a default
	pub optional: bool,

	pub validator: Option<SettingValidator>,
}

impl Debug for SettingDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SettingDefinition")
			.field("key", &self.key)
			.field("description", &self.description)
			.field("default", &self.default)
			.field("value_type", &self.value_type)
			.field("category", &self.category)
			.field("scopes", &self.scopes)
			.field("optional", &self.optional)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl SettingDefinition {
	/// Create a builder for constructing a SettingDefinition
	pub fn builder(key: impl Into<String>) -> SettingDefinitionBuilder {
		SettingDefinitionBuilder::new(key)
	}

	pub fn allows(&self, scope: SettingScope) -> bool {
		self.scopes.contains(&scope)
	}

	pub fn is_wildcard(&self) -> bool {
		self.key.ends_with(".*")
	}

	/// Check a string-encoded value against the type and the validator
	pub fn validate(&self, value: &str) -> ClResult<()> {
		self.value_type.validate(value)?;
		if let Some(validator) = &self.validator {
			validator(value)?;
		}
		Ok(())
	}
}

/// Builder for SettingDefinition with fluent API
pub struct SettingDefinitionBuilder {
	key: String,
	description: Option<String>,
	default: Option<String>,
	value_type: ValueType,
	category: Option<String>,
	scopes: Vec<SettingScope>,
	optional: bool,
	validator: Option<SettingValidator>,
}

impl SettingDefinitionBuilder {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			description: None,
			default: None,
			value_type: ValueType::String,
			category: None,
			scopes: ALL_SCOPES.to_vec(),
			optional: false,
			validator: None,
		}
	}

	/// Set the description (required)
	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn default(mut self, value: impl Into<String>) -> Self {
		self.default = Some(value.into());
		self
	}

	pub fn value_type(mut self, value_type: ValueType) -> Self {
		self.value_type = value_type;
		self
	}

	pub fn category(mut self, category: impl Into<String>) -> Self {
		self.category = Some(category.into());
		self
	}

	/// Restrict the scopes the setting may be written at (defaults to all)
	pub fn scopes(mut self, scopes: &[SettingScope]) -> Self {
		self.scopes = scopes.to_vec();
		self
	}

	pub fn optional(mut self, optional: bool) -> Self {
		self.optional = optional;
		self
	}

	/// Set a validation function, run on the string-encoded value
	pub fn validator<F>(mut self, f: F) -> Self
	where
		F: Fn(&str) -> ClResult<()> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(f));
		self
	}

	pub fn build(self) -> ClResult<SettingDefinition> {
		let key = normalize_key(&self.key)?;
		let description = self
			.description
			.ok_or_else(|| Error::ConfigError(format!("Setting '{}': description is required", key)))?;
		if self.scopes.is_empty() {
			return Err(Error::ConfigError(format!(
				"Setting '{}' must be writable at one scope at least",
				key
			)));
		}

		let def = SettingDefinition {
			key,
			description,
			default: self.default,
			value_type: self.value_type,
			category: self.category,
			scopes: self.scopes,
			optional: self.optional,
			validator: self.validator,
		};

		// A default that fails its own validation can never be served
		if let Some(default) = &def.default {
			def.validate(default).map_err(|e| {
				Error::ConfigError(format!("Setting '{}' has an invalid default: {}", def.key, e))
			})?;
		}
		Ok(def)
	}
}

/// Mutable registry used during app initialization
pub struct SettingsRegistry {
	definitions: HashMap<String, SettingDefinition>,
}

impl SettingsRegistry {
	pub fn new() -> Self {
		Self { definitions: HashMap::new() }
	}

	/// Register a new setting definition
	pub fn register(&mut self, def: SettingDefinition) -> ClResult<()> {
		if self.definitions.contains_key(&def.key) {
			return Err(Error::ConfigError(format!("Setting '{}' is already registered", def.key)));
		}

		debug!("Registering setting: {}", def.key);
		self.definitions.insert(def.key.clone(), def);
		Ok(())
	}

	/// Freeze the registry (make it immutable)
	pub fn freeze(self) -> FrozenSettingsRegistry {
		info!("Freezing settings registry with {} definitions", self.definitions.len());
		FrozenSettingsRegistry { definitions: self.definitions }
	}

	pub fn len(&self) -> usize {
		self.definitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.definitions.is_empty()
	}
}

impl Default for SettingsRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// Immutable registry shared by the facade
#[derive(Default)]
pub struct FrozenSettingsRegistry {
	definitions: HashMap<String, SettingDefinition>,
}

impl FrozenSettingsRegistry {
	/// Get a setting definition by normalized key
	/// First tries exact match, then the wildcard pattern "<first_element>.*"
	pub fn get(&self, key: &str) -> Option<&SettingDefinition> {
		if let Some(def) = self.definitions.get(key) {
			return Some(def);
		}

		if let Some(dot_pos) = key.find('.') {
			let wildcard_key = format!("{}.*", &key[..dot_pos]);
			if let Some(def) = self.definitions.get(&wildcard_key) {
				return Some(def);
			}
		}

		None
	}

	pub fn list(&self) -> impl Iterator<Item = &SettingDefinition> {
		self.definitions.values()
	}

	pub fn list_by_category<'a>(
		&'a self,
		category: &'a str,
	) -> impl Iterator<Item = &'a SettingDefinition> + 'a {
		self.definitions.values().filter(move |def| def.category.as_deref() == Some(category))
	}

	pub fn len(&self) -> usize {
		self.definitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.definitions.is_empty()
	}
}

impl Debug for FrozenSettingsRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FrozenSettingsRegistry").field("len", &self.definitions.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_requires_description() {
		let result = SettingDefinition::builder("ui.theme").build();
		assert!(matches!(result, Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_builder_normalizes_key_and_checks_default() {
		let def = SettingDefinition::builder("UI.PageSize")
			.description("Rows per page")
			.value_type(ValueType::Int)
			.default("20")
			.build()
			.unwrap();
		assert_eq!(def.key, "ui.pagesize");

		let bad = SettingDefinition::builder("ui.pagesize")
			.description("Rows per page")
			.value_type(ValueType::Int)
			.default("twenty")
			.build();
		assert!(matches!(bad, Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_validator_runs_after_type_check() {
		let def = SettingDefinition::builder("ui.pagesize")
			.description("Rows per page")
			.value_type(ValueType::Int)
			.validator(|v| match v.parse::<i64>() {
				Ok(n) if (1..=500).contains(&n) => Ok(()),
				_ => Err(Error::ValidationError("page size must be 1..=500".into())),
			})
			.build()
			.unwrap();

		assert!(def.validate("50").is_ok());
		assert!(def.validate("0").is_err());
		assert!(def.validate("abc").is_err());
	}

	#[test]
	fn test_registry_rejects_duplicates_and_resolves_wildcards() {
		let mut registry = SettingsRegistry::new();
		registry
			.register(SettingDefinition::builder("ui.theme").description("Theme").build().unwrap())
			.unwrap();
		registry
			.register(SettingDefinition::builder("ext.*").description("Extensions").build().unwrap())
			.unwrap();
		let dup = registry
			.register(SettingDefinition::builder("UI.Theme").description("Again").build().unwrap());
		assert!(matches!(dup, Err(Error::ConfigError(_))));

		let frozen = registry.freeze();
		assert_eq!(frozen.len(), 2);
		assert_eq!(frozen.get("ui.theme").map(|d| d.key.as_str()), Some("ui.theme"));
		assert_eq!(frozen.get("ext.calendar.color").map(|d| d.key.as_str()), Some("ext.*"));
		assert!(frozen.get("ui.font").is_none());
	}

	#[test]
	fn test_scope_restriction() {
		let def = SettingDefinition::builder("security.mfa")
			.description("Require MFA")
			.value_type(ValueType::Bool)
			.scopes(&[SettingScope::System, SettingScope::Workspace])
			.build()
			.unwrap();
		assert!(def.allows(SettingScope::Workspace));
		assert!(!def.allows(SettingScope::User));

		let none = SettingDefinition::builder("x").description("x").scopes(&[]).build();
		assert!(none.is_err());
	}
}

// vim: ts=4
