// Persistent settings
// JSON settings file grouped by namespace, plus the provider seam sessions read from

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::storage::{default_settings_path, StorageError};

/// Settings namespace for the refinement dialog
pub const SETTINGS_GROUP: &str = "takanami_settings";

/// Key of the default margin, in seconds
pub const MARGIN_KEY: &str = "takanami_margin";

/// Margin used when nothing is stored
pub const DEFAULT_MARGIN_SECS: f64 = 5.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Settings root must be a JSON object")]
    NotAnObject,
}

/// Source of the refinement settings
pub trait SettingsProvider {
    /// Default half-width of the analysis window, in seconds
    fn margin_seconds(&self, default: f64) -> f64;
}

/// Settings held in memory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSettings {
    pub margin_secs: f64,
}

impl Default for FixedSettings {
    fn default() -> Self {
        FixedSettings {
            margin_secs: DEFAULT_MARGIN_SECS,
        }
    }
}

impl SettingsProvider for FixedSettings {
    fn margin_seconds(&self, _default: f64) -> f64 {
        self.margin_secs
    }
}

/// Settings stored as `{ "<group>": { "<key>": value } }` in a JSON file
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
    groups: Map<String, Value>,
}

impl SettingsFile {
    /// Load settings from `path`. A missing file yields empty settings.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();

        let groups = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => map,
                _ => return Err(SettingsError::NotAnObject),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings file at {:?}, using defaults", path);
                Map::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SettingsFile { path, groups })
    }

    /// Load from the default config location
    pub fn load_default() -> Result<Self, SettingsError> {
        Self::load(default_settings_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value of `key` in `group`
    pub fn value(&self, group: &str, key: &str) -> Option<&Value> {
        self.groups.get(group).and_then(|g| g.get(key))
    }

    pub fn set_value(&mut self, group: &str, key: &str, value: Value) {
        let entry = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), value);
        }
    }

    pub fn set_margin_seconds(&mut self, secs: f64) {
        self.set_value(SETTINGS_GROUP, MARGIN_KEY, Value::from(secs));
    }

    /// Write the settings back to disk
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&Value::Object(self.groups.clone()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SettingsProvider for SettingsFile {
    fn margin_seconds(&self, default: f64) -> f64 {
        // Older files store numbers as strings
        match self.value(SETTINGS_GROUP, MARGIN_KEY) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_else(|_| {
                log::warn!("Ignoring non-numeric {}: {:?}", MARGIN_KEY, s);
                default
            }),
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_default() {
        let temp_dir = TempDir::new().unwrap();
        let settings = SettingsFile::load(temp_dir.path().join("settings.json")).unwrap();

        assert_eq!(settings.margin_seconds(DEFAULT_MARGIN_SECS), 5.0);
    }

    #[test]
    fn test_reads_margin_from_group() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{"takanami_settings": {"takanami_margin": 2.5}}"#).unwrap();

        let settings = SettingsFile::load(&path).unwrap();
        assert_eq!(settings.margin_seconds(DEFAULT_MARGIN_SECS), 2.5);
    }

    #[test]
    fn test_reads_margin_stored_as_string() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{"takanami_settings": {"takanami_margin": "1.25"}}"#).unwrap();

        let settings = SettingsFile::load(&path).unwrap();
        assert_eq!(settings.margin_seconds(DEFAULT_MARGIN_SECS), 1.25);
    }

    #[test]
    fn test_other_groups_do_not_leak() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{"stalta_settings": {"takanami_margin": 9.0}}"#).unwrap();

        let settings = SettingsFile::load(&path).unwrap();
        assert_eq!(settings.margin_seconds(3.0), 3.0);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config").join("settings.json");

        let mut settings = SettingsFile::load(&path).unwrap();
        settings.set_margin_seconds(7.5);
        settings.save().unwrap();

        let reloaded = SettingsFile::load(&path).unwrap();
        assert_eq!(reloaded.margin_seconds(DEFAULT_MARGIN_SECS), 7.5);
    }

    #[test]
    fn test_rejects_non_object_root() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            SettingsFile::load(&path),
            Err(SettingsError::NotAnObject)
        ));
    }

    #[test]
    fn test_fixed_settings_ignore_default() {
        let settings = FixedSettings { margin_secs: 0.75 };
        assert_eq!(settings.margin_seconds(5.0), 0.75);
        assert_eq!(FixedSettings::default().margin_secs, DEFAULT_MARGIN_SECS);
    }
}
