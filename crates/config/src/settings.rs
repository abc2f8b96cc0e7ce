// Application settings
// Loaded from ~/.config/glotgrid/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Editor
    #[serde(rename = "editor.validationDebounceMs")]
    pub validation_debounce_ms: u64,

    #[serde(rename = "editor.historyCapacity")]
    pub history_capacity: usize,

    #[serde(rename = "editor.confirmDiscard")]
    pub confirm_discard: bool,

    // Grid
    #[serde(rename = "grid.pageSize")]
    pub page_size: usize,

    // API
    #[serde(rename = "api.base")]
    pub api_base: String,

    #[serde(rename = "api.timeoutSecs")]
    pub api_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Editor
            validation_debounce_ms: 500,
            history_capacity: 100,
            confirm_discard: true,
            // Grid
            page_size: 100,
            // API
            api_base: String::new(), // Empty = must be set before sync
            api_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glotgrid");
        config_dir.join("settings.json")
    }

    pub fn validation_debounce(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from an explicit path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(path);
            return settings;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        eprintln!("Error parsing settings.json: {}", e);
                        eprintln!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading settings.json: {}", e);
                Self::default()
            }
        }
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Editor behavior
    "editor.validationDebounceMs": 500,
    "editor.historyCapacity": 100,
    "editor.confirmDiscard": true,

    // Grid
    "grid.pageSize": 100,

    // Archive API
    // Base URL of the archive server, e.g. "https://archive.example.org"
    "api.base": "",
    "api.timeoutSecs": 30
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            eprintln!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
