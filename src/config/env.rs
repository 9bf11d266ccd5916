//! Environment variable configuration
//!
//! `SUITE_RUNNER_*` variables override values from the settings file.

use std::env;
use std::path::PathBuf;

use super::RunSettings;

/// Environment variable prefix
const ENV_PREFIX: &str = "SUITE_RUNNER";

/// Overrides read from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Default test timeout in milliseconds from SUITE_RUNNER_TIMEOUT
    pub timeout_ms: Option<u64>,
    /// From SUITE_RUNNER_STOP_ON_ERROR
    pub stop_on_error: Option<bool>,
    /// From SUITE_RUNNER_SEED
    pub seed: Option<u64>,
    /// From SUITE_RUNNER_WORK_DIR
    pub work_directory: Option<PathBuf>,
    /// From SUITE_RUNNER_CULTURE
    pub culture: Option<String>,
    /// From SUITE_RUNNER_LOG
    pub log_level: Option<String>,
    /// Settings file path from SUITE_RUNNER_CONFIG
    pub config_file: Option<PathBuf>,
}

impl EnvConfig {
    /// Load overrides from the process environment
    pub fn load() -> Self {
        Self {
            timeout_ms: get_env_parse("TIMEOUT"),
            stop_on_error: get_env_bool("STOP_ON_ERROR"),
            seed: get_env_parse("SEED"),
            work_directory: get_env("WORK_DIR").map(PathBuf::from),
            culture: get_env("CULTURE"),
            log_level: get_env("LOG"),
            config_file: get_env("CONFIG").map(PathBuf::from),
        }
    }

    /// Check if any override is set
    pub fn has_any(&self) -> bool {
        self.timeout_ms.is_some()
            || self.stop_on_error.is_some()
            || self.seed.is_some()
            || self.work_directory.is_some()
            || self.culture.is_some()
            || self.log_level.is_some()
            || self.config_file.is_some()
    }

    /// Overwrite the settings fields that have an override
    pub fn apply_to(&self, settings: &mut RunSettings) {
        if let Some(ms) = self.timeout_ms {
            settings.default_timeout_ms = Some(ms);
        }
        if let Some(stop) = self.stop_on_error {
            settings.stop_on_error = stop;
        }
        if let Some(seed) = self.seed {
            settings.random_seed = Some(seed);
        }
        if let Some(dir) = &self.work_directory {
            settings.work_directory = Some(dir.clone());
        }
        if let Some(culture) = &self.culture {
            settings.culture = Some(culture.clone());
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_ms(self, ms: u64) -> Self {
        self.var("TIMEOUT", ms.to_string())
    }

    pub fn stop_on_error(self, stop: bool) -> Self {
        self.var("STOP_ON_ERROR", stop.to_string())
    }

    pub fn seed(self, seed: u64) -> Self {
        self.var("SEED", seed.to_string())
    }

    pub fn work_directory(self, dir: impl Into<String>) -> Self {
        self.var("WORK_DIR", dir)
    }

    pub fn culture(self, culture: impl Into<String>) -> Self {
        self.var("CULTURE", culture)
    }

    pub fn log_level(self, level: impl Into<String>) -> Self {
        self.var("LOG", level)
    }

    pub fn config_file(self, path: impl Into<String>) -> Self {
        self.var("CONFIG", path)
    }

    fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module share the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.timeout_ms.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_builder() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvBuilder::new()
            .timeout_ms(1500)
            .seed(99)
            .culture("de-DE")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.timeout_ms, Some(1500));
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.culture, Some("de-DE".to_string()));
        assert!(config.has_any());
    }

    #[test]
    fn test_env_bool_parsing() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvBuilder::new().stop_on_error(true).apply_scoped();
        assert_eq!(EnvConfig::load().stop_on_error, Some(true));
    }

    #[test]
    fn test_guard_restores() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        {
            let _guard = EnvBuilder::new().log_level("trace").apply_scoped();
            assert_eq!(EnvConfig::load().log_level, Some("trace".to_string()));
        }
        assert_eq!(EnvConfig::load().log_level, None);
    }

    #[test]
    fn test_apply_to_overrides_only_set_fields() {
        let mut settings = RunSettings::default().with_culture("en-US").with_seed(1);
        let config = EnvConfig {
            timeout_ms: Some(40),
            stop_on_error: Some(true),
            ..Default::default()
        };
        config.apply_to(&mut settings);

        assert_eq!(settings.default_timeout_ms, Some(40));
        assert!(settings.stop_on_error);
        assert_eq!(settings.culture.as_deref(), Some("en-US"));
        assert_eq!(settings.random_seed, Some(1));
    }
}
