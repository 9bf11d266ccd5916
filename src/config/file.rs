//! Settings file management
//!
//! Handles finding, loading, and validating settings files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::RunSettings;
use crate::utils::LogLevel;

/// Settings file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./suite-runner.yaml",
    "./.suite-runner.yaml",
    "~/.config/suite-runner/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Settings file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Version of the file format
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub settings: RunSettings,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            settings: RunSettings::default(),
        }
    }
}

impl SettingsFile {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            version: default_version(),
            settings,
        }
    }

    /// Find a settings file in the standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load from the first standard location, or defaults when none exists
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a YAML or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let file: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML settings: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON settings: {}", path.display()))?
        };

        file.validate()
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;
        Ok(file)
    }

    /// Save settings to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize settings")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported settings version: {}", self.version);
        }

        if LogLevel::from_str(&self.settings.log_level).is_none() {
            anyhow::bail!("Unknown log level: {}", self.settings.log_level);
        }

        if self.settings.default_timeout_ms == Some(0) {
            anyhow::bail!("default_timeout_ms must be greater than zero");
        }

        Ok(())
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
