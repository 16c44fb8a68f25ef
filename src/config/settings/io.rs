// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;

use super::Settings;

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("settings.json")
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save settings to a specific path, merging with existing file content
    /// to preserve unknown keys from hand edits.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let current = serde_json::to_value(self)?;

        let merged = if path.exists() {
            let existing = std::fs::read_to_string(path)?;
            match serde_json::from_str::<Value>(&existing) {
                Ok(existing) => merge_json(existing, current),
                // Corrupt file, overwrite entirely.
                Err(_) => current,
            }
        } else {
            current
        };

        std::fs::write(path, serde_json::to_string_pretty(&merged)?)?;
        Ok(())
    }

    /// Get the viewer-chat home directory (~/.viewer-chat or $VIEWER_CHAT_HOME).
    pub fn home_dir() -> PathBuf {
        if let Ok(home) = std::env::var("VIEWER_CHAT_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".viewer-chat")
    }
}

/// Recursively merge `overlay` into `base`; overlay values win.
fn merge_json(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.providers.gemini.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.providers.local.base_url = "http://scanner-box:11434".to_string();
        settings.chat.attach_by_default = true;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.providers.local.base_url, "http://scanner-box:11434");
        assert!(loaded.chat.attach_by_default);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"viewer": {"theme": "dark"}, "providers": {"local": {"extra": 1}}}"#,
        )
        .unwrap();

        Settings::default().save_to(&path).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["viewer"]["theme"], "dark");
        assert_eq!(raw["providers"]["local"]["extra"], 1);
        assert_eq!(raw["providers"]["local"]["num_ctx"], 4096);
    }

    #[test]
    fn test_save_overwrites_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        Settings::default().save_to(&path).unwrap();
        assert!(Settings::load_from(&path).is_ok());
    }

    #[test]
    fn test_load_invalid_json_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{broken").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_merge_json_overlay_wins() {
        let base = serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}});
        let overlay = serde_json::json!({"b": {"c": 5}, "e": 6});
        let merged = merge_json(base, overlay);
        assert_eq!(merged, serde_json::json!({"a": 1, "b": {"c": 5, "d": 3}, "e": 6}));
    }
}
