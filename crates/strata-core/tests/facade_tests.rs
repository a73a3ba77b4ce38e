//! Settings facade tests
//!
//! Definition defaults, typed getters, write validation, memoization and
//! required-setting checks.

mod common;

use strata_core::settings::{SettingDefinition, SettingsRegistry, UpsertOptions};
use strata_types::error::Error;
use strata_types::setting::{SettingLocator, SettingScope, ValueType};
use strata_types::types::{UserId, WorkspaceId};

fn ids() -> (WorkspaceId, UserId) {
	(WorkspaceId::from("w"), UserId::from("u"))
}

fn registry() -> SettingsRegistry {
	let mut registry = SettingsRegistry::new();
	registry
		.register(
			SettingDefinition::builder("ui.pagesize")
				.description("Rows per page")
				.value_type(ValueType::Int)
				.default("20")
				.category("ui")
				.validator(|v| match v.parse::<i64>() {
					Ok(n) if (1..=500).contains(&n) => Ok(()),
					_ => Err(Error::ValidationError("page size must be 1..=500".into())),
				})
				.build()
				.unwrap(),
		)
		.unwrap();
	registry
		.register(
			SettingDefinition::builder("security.mfa")
				.description("Require a second factor")
				.value_type(ValueType::Bool)
				.default("false")
				.scopes(&[SettingScope::System, SettingScope::Workspace])
				.build()
				.unwrap(),
		)
		.unwrap();
	registry
		.register(
			SettingDefinition::builder("mail.relay")
				.description("Outgoing mail relay host")
				.scopes(&[SettingScope::System])
				.build()
				.unwrap(),
		)
		.unwrap();
	registry
		.register(
			SettingDefinition::builder("ui.ratio")
				.description("Sidebar width ratio")
				.value_type(ValueType::Float)
				.optional(true)
				.build()
				.unwrap(),
		)
		.unwrap();
	registry
}

#[tokio::test]
async fn test_defaults_and_typed_getters() {
	let facade = common::facade(registry());
	let (w, u) = ids();

	assert_eq!(facade.get_int(&w, &u, "ui.pagesize").await.unwrap(), 20);
	assert!(!facade.get_bool(&w, &u, "security.mfa").await.unwrap());
	assert_eq!(facade.get_float_opt(&w, &u, "ui.ratio").await.unwrap(), None);
	assert!(matches!(facade.get_float(&w, &u, "ui.ratio").await, Err(Error::ValidationError(_))));
	// raw resolution does not apply defaults
	assert!(facade.get(&w, &u, "ui.pagesize").await.unwrap().is_none());

	facade.set_user(&w, &u, "ui.pagesize", "50", UpsertOptions::default()).await.unwrap();
	facade.set_user(&w, &u, "ui.ratio", "0.25", UpsertOptions::default()).await.unwrap();
	assert_eq!(facade.get_int(&w, &u, "UI.PageSize").await.unwrap(), 50);
	assert!((facade.get_float(&w, &u, "ui.ratio").await.unwrap() - 0.25).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_typed_getter_rejects_wrong_type() {
	let facade = common::facade(SettingsRegistry::new());
	let (w, u) = ids();

	facade.set_workspace(&w, "custom.flag", "maybe", UpsertOptions::default()).await.unwrap();
	assert_eq!(facade.get_string(&w, &u, "custom.flag").await.unwrap(), "maybe");
	assert!(matches!(facade.get_bool(&w, &u, "custom.flag").await, Err(Error::ValidationError(_))));

	facade.set_workspace(&w, "custom.meta", r#"{"a":1}"#, UpsertOptions::typed(ValueType::Json)).await.unwrap();
	assert_eq!(facade.get_json(&w, &u, "custom.meta").await.unwrap()["a"], 1);
}

#[tokio::test]
async fn test_writes_validated_against_definitions() {
	let facade = common::facade(registry());
	let (w, u) = ids();

	let not_int = facade.set_workspace(&w, "ui.pagesize", "many", UpsertOptions::default()).await;
	assert!(matches!(not_int, Err(Error::ValidationError(_))));

	let out_of_range = facade.set_workspace(&w, "ui.pagesize", "0", UpsertOptions::default()).await;
	assert!(matches!(out_of_range, Err(Error::ValidationError(_))));

	let wrong_hint =
		facade.set_workspace(&w, "ui.pagesize", "10", UpsertOptions::typed(ValueType::String)).await;
	assert!(matches!(wrong_hint, Err(Error::ValidationError(_))));

	let wrong_scope = facade.set_user(&w, &u, "security.mfa", "true", UpsertOptions::default()).await;
	assert!(matches!(wrong_scope, Err(Error::InvalidOperation(_))));

	let row = facade.set_workspace(&w, "ui.pagesize", "30", UpsertOptions::default()).await.unwrap();
	assert_eq!(row.value_type, ValueType::Int);
	assert_eq!(row.category.as_deref(), Some("ui"));
}

#[tokio::test]
async fn test_strict_keys_reject_unknown() {
	let (w, _) = ids();

	let lenient = common::facade(registry());
	assert!(lenient.set_workspace(&w, "free.form", "x", UpsertOptions::default()).await.is_ok());

	let strict = common::facade(registry()).with_strict_keys(true);
	let result = strict.set_workspace(&w, "free.form", "x", UpsertOptions::default()).await;
	assert!(matches!(result, Err(Error::ValidationError(_))));
}

#[tokio::test]
async fn test_memoized_reads_invalidated_by_writes() {
	let facade = common::facade(registry());
	let (w, u) = ids();

	facade.set_system("ui.pagesize", "20", UpsertOptions::default()).await.unwrap();
	assert_eq!(facade.get(&w, &u, "ui.pagesize").await.unwrap().unwrap().value, "20");
	assert_eq!(facade.cached_len(), 1);

	facade.set_user(&w, &u, "ui.pagesize", "15", UpsertOptions::default()).await.unwrap();
	assert_eq!(facade.cached_len(), 0);
	assert_eq!(facade.get(&w, &u, "ui.pagesize").await.unwrap().unwrap().value, "15");

	assert!(facade.reset_user(&w, &u, "ui.pagesize").await.unwrap());
	assert_eq!(facade.get(&w, &u, "ui.pagesize").await.unwrap().unwrap().value, "20");
}

#[tokio::test]
async fn test_set_locked_masks_lower_scopes() {
	let facade = common::facade(registry());
	let (w, u) = ids();

	facade.set_workspace(&w, "ui.pagesize", "40", UpsertOptions::default().actor("owner")).await.unwrap();
	facade.set_user(&w, &u, "ui.pagesize", "10", UpsertOptions::default()).await.unwrap();
	assert_eq!(facade.get_int(&w, &u, "ui.pagesize").await.unwrap(), 10);

	let admin = Some(UserId::from("admin"));
	let locked =
		facade.set_locked(&SettingLocator::workspace("w"), "ui.pagesize", true, admin.clone()).await.unwrap();
	assert!(locked.is_locked);
	assert_eq!(locked.value, "40");
	assert_eq!(locked.updated_by, admin);
	assert_eq!(locked.created_by, Some(UserId::from("owner")));
	assert_eq!(facade.get_int(&w, &u, "ui.pagesize").await.unwrap(), 40);

	let unlocked =
		facade.set_locked(&SettingLocator::workspace("w"), "ui.pagesize", false, admin.clone()).await.unwrap();
	assert_eq!(unlocked.updated_by, admin);
	assert_eq!(facade.get_int(&w, &u, "ui.pagesize").await.unwrap(), 10);

	let missing = facade.set_locked(&SettingLocator::system(), "ui.pagesize", true, None).await;
	assert!(matches!(missing, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_reset_workspace_and_system_delete() {
	let facade = common::facade(registry());
	let (w, u) = ids();

	facade.set_system("ui.pagesize", "25", UpsertOptions::default()).await.unwrap();
	facade.set_workspace(&w, "ui.pagesize", "35", UpsertOptions::default()).await.unwrap();
	assert!(facade.reset_workspace(&w, "ui.pagesize").await.unwrap());
	assert!(!facade.reset_workspace(&w, "ui.pagesize").await.unwrap());
	assert_eq!(facade.get_int(&w, &u, "ui.pagesize").await.unwrap(), 25);

	let result = facade.store().delete(&SettingLocator::system(), "ui.pagesize").await;
	assert!(matches!(result, Err(Error::InvalidOperation(_))));
}

#[tokio::test]
async fn test_validate_required_settings() {
	let facade = common::facade(registry());

	let missing = facade.validate_required_settings().await;
	assert!(matches!(missing, Err(Error::ValidationError(msg)) if msg.contains("mail.relay")));

	facade.set_system("mail.relay", "smtp.example.com", UpsertOptions::default()).await.unwrap();
	facade.validate_required_settings().await.unwrap();
}

// vim: ts=4
