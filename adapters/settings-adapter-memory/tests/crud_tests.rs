//! Memory adapter CRUD tests
//!
//! Tests create, read, list and delete of setting rows across scopes

use std::sync::Arc;

use strata_settings_adapter_memory::SettingsAdapterMemory;
use strata::error::Error;
use strata::setting::{Setting, SettingLocator, SettingScope, ValueType};
use strata::settings_adapter::SettingsAdapter;
use strata::types::Timestamp;

fn make_setting(locator: &SettingLocator, key: &str, value: &str) -> Setting {
	Setting {
		scope: locator.scope,
		workspace_id: locator.workspace_id.clone(),
		user_id: locator.user_id.clone(),
		key: key.to_string(),
		value: value.to_string(),
		value_type: ValueType::String,
		is_locked: false,
		category: None,
		description: None,
		created_at: Timestamp(1),
		updated_at: Timestamp(1),
		created_by: None,
		updated_by: None,
	}
}

#[tokio::test]
async fn test_write_and_read_setting() {
	let adapter = SettingsAdapterMemory::new();
	let locator = SettingLocator::workspace("w1");

	adapter.write_setting(&make_setting(&locator, "ui.theme", "dark")).await.unwrap();

	let read = adapter.read_setting(&locator, "ui.theme").await.unwrap();
	assert_eq!(read.map(|s| s.value), Some("dark".to_string()));

	// Same key in another workspace is a different row
	let other = adapter.read_setting(&SettingLocator::workspace("w2"), "ui.theme").await.unwrap();
	assert!(other.is_none());
}

#[tokio::test]
async fn test_write_replaces_existing_row() {
	let adapter = SettingsAdapterMemory::new();
	let locator = SettingLocator::system();

	adapter.write_setting(&make_setting(&locator, "pagesize", "20")).await.unwrap();
	adapter.write_setting(&make_setting(&locator, "pagesize", "30")).await.unwrap();

	assert_eq!(adapter.len(), 1);
	let read = adapter.read_setting(&locator, "pagesize").await.unwrap().unwrap();
	assert_eq!(read.value, "30");
}

#[tokio::test]
async fn test_list_only_returns_exact_locator() {
	let adapter = SettingsAdapterMemory::new();
	let system = SettingLocator::system();
	let ws = SettingLocator::workspace("w1");
	let user = SettingLocator::user("w1", "u1");
	let other_user = SettingLocator::user("w1", "u2");

	adapter.write_setting(&make_setting(&system, "a", "1")).await.unwrap();
	adapter.write_setting(&make_setting(&ws, "a", "2")).await.unwrap();
	adapter.write_setting(&make_setting(&ws, "b", "3")).await.unwrap();
	adapter.write_setting(&make_setting(&user, "a", "4")).await.unwrap();
	adapter.write_setting(&make_setting(&other_user, "c", "5")).await.unwrap();

	let listed = adapter.list_settings(&ws).await.unwrap();
	let mut keys: Vec<_> = listed.iter().map(|s| s.key.as_str()).collect();
	keys.sort_unstable();
	assert_eq!(keys, vec!["a", "b"]);
	assert!(listed.iter().all(|s| s.scope == SettingScope::Workspace));

	let listed = adapter.list_settings(&user).await.unwrap();
	assert_eq!(listed.len(), 1);
	assert_eq!(listed[0].value, "4");

	assert_eq!(adapter.list_settings(&system).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_setting() {
	let adapter = SettingsAdapterMemory::new();
	let locator = SettingLocator::user("w1", "u1");

	adapter.write_setting(&make_setting(&locator, "x", "1")).await.unwrap();
	assert!(adapter.delete_setting(&locator, "x").await.unwrap());
	assert!(!adapter.delete_setting(&locator, "x").await.unwrap());
	assert!(adapter.is_empty());
}

#[tokio::test]
async fn test_rejects_rows_violating_scope_rules() {
	let adapter = SettingsAdapterMemory::new();
	let mut setting = make_setting(&SettingLocator::system(), "x", "1");
	setting.user_id = Some("u1".into());

	let result = adapter.write_setting(&setting).await;
	assert!(matches!(result, Err(Error::InvalidScopeCombination(_))));
	assert!(adapter.is_empty());
}

#[tokio::test]
async fn test_concurrent_writes_to_distinct_rows() {
	let adapter = Arc::new(SettingsAdapterMemory::new());
	let mut handles = vec![];

	for i in 0..8 {
		let adapter = Arc::clone(&adapter);
		handles.push(tokio::spawn(async move {
			let locator = SettingLocator::workspace(format!("w{}", i));
			adapter.write_setting(&make_setting(&locator, "k", &i.to_string())).await.unwrap();
		}));
	}
	for handle in handles {
		handle.await.expect("Task panicked");
	}

	assert_eq!(adapter.len(), 8);
}

// vim: ts=4
