//! Built-in setting definitions
//!
//! Registered by `AppBuilder` before any application definitions.

use crate::prelude::*;
use crate::setting::{SettingScope, ValueType};
use crate::settings::{SettingDefinition, SettingsRegistry};

/// Register all built-in settings
pub fn register_settings(registry: &mut SettingsRegistry) -> ClResult<()> {
	registry.register(
		SettingDefinition::builder("locale.language")
			.description("Default language tag for the user interface")
			.default("en")
			.category("locale")
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("locale.timezone")
			.description("IANA time zone used to display dates")
			.default("UTC")
			.category("locale")
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("display.page_size")
			.description("Number of rows shown per page in lists")
			.value_type(ValueType::Int)
			.default("20")
			.category("display")
			.validator(|value| match value.parse::<i64>() {
				Ok(n) if (1..=1000).contains(&n) => Ok(()),
				_ => Err(Error::ValidationError("page size must be between 1 and 1000".into())),
			})
			.build()?,
	)?;

	registry.register(
		SettingDefinition::builder("security.require_mfa")
			.description("Require a second authentication factor")
			.value_type(ValueType::Bool)
			.default("false")
			.category("security")
			.scopes(&[SettingScope::System, SettingScope::Workspace])
			.build()?,
	)?;

	// Wildcard pattern for UI settings - allows storing arbitrary UI preferences
	registry.register(
		SettingDefinition::builder("ui.*")
			.description("User interface settings and preferences")
			.category("ui")
			.optional(true)
			.build()?,
	)?;

	// Wildcard pattern for application settings - allows storing arbitrary app state
	registry.register(
		SettingDefinition::builder("app.*")
			.description("Application-specific settings and state")
			.optional(true)
			.build()?,
	)?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_register_settings() {
		let mut registry = SettingsRegistry::new();
		register_settings(&mut registry).unwrap();
		assert_eq!(registry.len(), 6);

		// registering twice is a configuration error
		assert!(matches!(register_settings(&mut registry), Err(Error::ConfigError(_))));

		let frozen = registry.freeze();
		assert_eq!(frozen.get("ui.sidebar.width").map(|d| d.key.as_str()), Some("ui.*"));
		assert_eq!(frozen.list_by_category("locale").count(), 2);
	}
}

// vim: ts=4
