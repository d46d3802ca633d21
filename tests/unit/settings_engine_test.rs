//! Unit tests for the SettingsEngine public API.
//!
//! These tests exercise the SettingsEngine through its public trait interface,
//! validating default loading, value persistence, validation, reset behavior,
//! and environment overrides.

use std::collections::HashMap;

use bookmark_admin::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use bookmark_admin::types::errors::SettingsError;
use bookmark_admin::types::settings::{
    AdminSettings, NumberingPolicy, StoreBackend, ENV_DB, ENV_EMULATOR_HOST, ENV_PROJECT,
};
use serde_json::json;
use tempfile::TempDir;

/// Helper: create a SettingsEngine backed by a temp directory that lives for the
/// duration of the test (the caller holds the `TempDir` handle).
fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, AdminSettings::default());
    assert_eq!(settings.backfill.chunk_size, 500);
    assert_eq!(settings.backfill.numbering, NumberingPolicy::QueryPosition);
    assert!(settings.backfill.guard_concurrent_writes);
    assert_eq!(settings.store.collection, "bookmarks");
}

#[test]
fn test_set_value_persists_and_reloads() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    engine.set_value("backfill.chunk_size", json!(100)).unwrap();
    engine.set_value("store.backend", json!("firestore")).unwrap();
    engine
        .set_value("store.firestore.project_id", json!("demo-project"))
        .unwrap();

    let mut reloaded = engine_in_temp(&dir);
    let settings = reloaded.load().unwrap();
    assert_eq!(settings.backfill.chunk_size, 100);
    assert_eq!(settings.store.backend, StoreBackend::Firestore);
    assert_eq!(
        settings.store.firestore.project_id.as_deref(),
        Some("demo-project")
    );
}

#[test]
fn test_set_value_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let err = engine.set_value("backfill.nope", json!(1)).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidKey(_)));
}

#[test]
fn test_set_value_rejects_wrong_type_and_out_of_range() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    let err = engine
        .set_value("backfill.chunk_size", json!("lots"))
        .unwrap_err();
    assert!(matches!(err, SettingsError::InvalidValue(_)));

    let err = engine.set_value("backfill.chunk_size", json!(501)).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidValue(_)));

    let err = engine.set_value("backfill.chunk_size", json!(0)).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidValue(_)));

    // Nothing was written.
    assert_eq!(engine.get_settings().backfill.chunk_size, 500);
    assert!(!dir.path().join("settings.json").exists());
}

#[test]
fn test_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();
    engine
        .set_value("backfill.numbering", json!("unordered-subset"))
        .unwrap();

    engine.reset().unwrap();

    let mut reloaded = engine_in_temp(&dir);
    assert_eq!(reloaded.load().unwrap(), AdminSettings::default());
}

#[test]
fn test_partial_file_fills_missing_keys_with_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{"backfill": {"guard_concurrent_writes": false}}"#,
    )
    .unwrap();

    let mut engine = engine_in_temp(&dir);
    let settings = engine.load().unwrap();
    assert!(!settings.backfill.guard_concurrent_writes);
    assert_eq!(settings.backfill.order_field, "order");
    assert_eq!(settings.store.backend, StoreBackend::Sqlite);
}

#[test]
fn test_malformed_file_is_a_serialization_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();

    let mut engine = engine_in_temp(&dir);
    assert!(matches!(
        engine.load(),
        Err(SettingsError::SerializationError(_))
    ));
}

#[test]
fn test_env_overrides_apply_on_top_of_file() {
    let env: HashMap<&str, &str> = [
        (ENV_EMULATOR_HOST, "localhost:8080"),
        (ENV_PROJECT, "demo-project"),
        (ENV_DB, "/tmp/other.db"),
    ]
    .into_iter()
    .collect();

    let mut settings = AdminSettings::default();
    settings.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(
        settings.store.firestore.emulator_host.as_deref(),
        Some("localhost:8080")
    );
    assert_eq!(settings.store.firestore.project_id.as_deref(), Some("demo-project"));
    assert_eq!(settings.store.sqlite_path.as_deref(), Some("/tmp/other.db"));
    assert!(settings.store.firestore.access_token.is_none());
}
