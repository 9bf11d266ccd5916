//! Configuration module
//!
//! Run settings and the layers that populate them: settings files and
//! environment variables.

mod env;
mod file;

pub use env::{EnvBuilder, EnvConfig, EnvGuard};
pub use file::SettingsFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::LogLevel;

/// Settings applied to the root execution context of a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Timeout in milliseconds for test cases without their own `Timeout`
    pub default_timeout_ms: Option<u64>,

    /// Stop running siblings after the first failing test
    pub stop_on_error: bool,

    /// Seed for per-test random generators; drawn at random when absent
    pub random_seed: Option<u64>,

    /// Directory exposed to tests; the current directory when absent
    pub work_directory: Option<PathBuf>,

    /// Culture name exposed to tests
    pub culture: Option<String>,

    pub log_level: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            stop_on_error: false,
            random_seed: None,
            work_directory: None,
            culture: None,
            log_level: "info".to_string(),
        }
    }
}

impl RunSettings {
    /// Defaults, overridden by the discovered settings file, overridden by
    /// `SUITE_RUNNER_*` variables
    pub fn load() -> Result<Self> {
        let env = EnvConfig::load();
        let file = match &env.config_file {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::load_default()?,
        };

        let mut settings = file.settings;
        env.apply_to(&mut settings);
        Ok(settings)
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = Some(ms);
        self
    }

    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn with_work_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_directory = Some(dir.into());
        self
    }

    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Parsed log level, falling back to info
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_str(&self.log_level).unwrap_or(LogLevel::Info)
    }
}
