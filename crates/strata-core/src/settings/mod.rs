//! Settings subsystem: scoped store, cascade resolver and facade

pub mod derived;
pub mod facade;
pub mod resolver;
pub mod store;
pub mod types;

pub use derived::{EffectiveSettings, EffectiveSettingsSource};
pub use facade::SettingsFacade;
pub use resolver::{CascadeResolver, EffectiveSetting, cascade};
pub use store::{ConfigurationStore, UpsertOptions};
pub use types::{
	FrozenSettingsRegistry, SettingDefinition, SettingDefinitionBuilder, SettingValidator,
	SettingsRegistry,
};

// vim: ts=4
