// Operator settings engine
// Loads, saves, updates individual values of, and resets the tool's settings.
// Settings are stored as a JSON file at the platform-specific config path.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::platform;
use crate::store::MAX_BATCH_WRITES;
use crate::types::errors::SettingsError;
use crate::types::settings::AdminSettings;

/// File name of the settings file inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AdminSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &AdminSettings;
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: AdminSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses `settings.json` in the platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            platform::get_config_dir()
                .join(SETTINGS_FILE)
                .to_string_lossy()
                .to_string()
        });

        Self {
            config_path,
            settings: AdminSettings::default(),
        }
    }

    /// Parses a value typed on the command line: JSON when it parses, a plain string otherwise.
    pub fn parse_cli_value(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }

    fn validate(settings: &AdminSettings) -> Result<(), SettingsError> {
        let chunk = settings.backfill.chunk_size;
        if chunk == 0 || chunk > MAX_BATCH_WRITES {
            return Err(SettingsError::InvalidValue(format!(
                "backfill.chunk_size must be between 1 and {}, got {}",
                MAX_BATCH_WRITES, chunk
            )));
        }
        if settings.store.collection.is_empty() {
            return Err(SettingsError::InvalidValue(
                "store.collection must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replaces the value at a dot-separated path inside a JSON object tree.
///
/// Only existing keys can be replaced; unknown keys are rejected.
fn replace_at_path(root: &mut Value, key: &str, value: Value) -> Result<(), SettingsError> {
    let mut parts = key.split('.').peekable();
    let mut current = root;

    while let Some(part) = parts.next() {
        let map = current.as_object_mut().ok_or_else(|| {
            SettingsError::InvalidKey(format!(
                "Cannot navigate to key '{}': intermediate value is not an object",
                key
            ))
        })?;
        let slot = map
            .get_mut(part)
            .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;

        if parts.peek().is_none() {
            *slot = value;
            return Ok(());
        }
        current = slot;
    }
    Err(SettingsError::InvalidKey("Key cannot be empty".to_string()))
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// A missing file yields defaults; a malformed one is a serialization error.
    /// Keys absent from the file take their default values.
    fn load(&mut self) -> Result<AdminSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = AdminSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: AdminSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        Self::validate(&settings)?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &AdminSettings {
        &self.settings
    }

    /// Updates one setting by dot-notation key path and saves to disk.
    ///
    /// The new tree is deserialized back into `AdminSettings`, so a value of
    /// the wrong type is rejected before anything is written.
    ///
    /// # Examples
    /// - `"store.backend"` → updates `settings.store.backend`
    /// - `"backfill.chunk_size"` → updates `settings.backfill.chunk_size`
    /// - `"store.firestore.project_id"` → updates `settings.store.firestore.project_id`
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut tree = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;
        replace_at_path(&mut tree, key, value)?;

        let updated: AdminSettings = serde_json::from_value(tree).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        Self::validate(&updated)?;

        self.settings = updated;
        self.save()
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = AdminSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
