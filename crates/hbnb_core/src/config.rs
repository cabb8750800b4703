//! Runtime configuration for the store, the data manager and logging.
//!
//! # Responsibility
//! - Provide defaults that work without any environment setup.
//! - Read `HBNB_*` environment overrides and reject malformed values.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::default_log_level;

pub const DEFAULT_DATA_FILE: &str = "file_storage.json";
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

pub const ENV_DATA_FILE: &str = "HBNB_DATA_FILE";
pub const ENV_WRITE_ATTEMPTS: &str = "HBNB_WRITE_ATTEMPTS";
pub const ENV_LOCK_TIMEOUT_MS: &str = "HBNB_LOCK_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "HBNB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "HBNB_LOG_DIR";

/// File-backed store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Canonical data file. The temp file lives next to it.
    pub path: PathBuf,
    /// Total attempts for one durable write, including the first. Minimum 1.
    pub write_attempts: u32,
    /// Wait before the first retry; doubles on every further retry.
    pub retry_backoff: Duration,
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_FILE)
    }
}

/// Data manager settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Bounded wait for the store lock. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
}

/// Full core configuration assembled from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub store: StoreOptions,
    pub manager: ManagerOptions,
    pub log_level: String,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store: StoreOptions::default(),
            manager: ManagerOptions::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

impl CoreConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = non_blank(lookup(ENV_DATA_FILE)) {
            config.store.path = PathBuf::from(path);
        }
        if let Some(value) = non_blank(lookup(ENV_WRITE_ATTEMPTS)) {
            let attempts = parse_u64(ENV_WRITE_ATTEMPTS, &value)?;
            config.store.write_attempts = u32::try_from(attempts)
                .ok()
                .filter(|attempts| *attempts >= 1)
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_WRITE_ATTEMPTS,
                    value,
                    reason: "expected an integer >= 1",
                })?;
        }
        if let Some(value) = non_blank(lookup(ENV_LOCK_TIMEOUT_MS)) {
            let millis = parse_u64(ENV_LOCK_TIMEOUT_MS, &value)?;
            config.manager.lock_timeout = Some(Duration::from_millis(millis));
        }
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            config.log_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CoreConfig, DEFAULT_DATA_FILE, ENV_DATA_FILE, ENV_LOCK_TIMEOUT_MS,
        ENV_WRITE_ATTEMPTS,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.store.path, PathBuf::from(DEFAULT_DATA_FILE));
        assert_eq!(config.manager.lock_timeout, None);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            (ENV_DATA_FILE, "/var/lib/hbnb/data.json"),
            (ENV_WRITE_ATTEMPTS, "5"),
            (ENV_LOCK_TIMEOUT_MS, "250"),
        ])
        .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/var/lib/hbnb/data.json"));
        assert_eq!(config.store.write_attempts, 5);
        assert_eq!(
            config.manager.lock_timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config_from(&[(ENV_LOCK_TIMEOUT_MS, "soon")]).unwrap_err();
        assert!(err.to_string().contains(ENV_LOCK_TIMEOUT_MS));

        let err = config_from(&[(ENV_WRITE_ATTEMPTS, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_WRITE_ATTEMPTS));
    }
}
