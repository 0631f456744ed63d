//! Runtime configuration resolved from the environment.
//!
//! # Responsibility
//! - Collect store path, log level, habit cap and language service settings.
//! - Reject malformed values up front instead of at first use.
//!
//! # Invariants
//! - `habit_cap` is at least 1.
//! - A blank API key is treated as absent.

use crate::logging::default_log_level;
use crate::resolver::DEFAULT_HABIT_CAP;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "AURA_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "AURA_LOG_LEVEL";
pub const ENV_HABIT_CAP: &str = "AURA_HABIT_CAP";
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
/// Fallback key variable used by older setups.
pub const ENV_API_KEY_FALLBACK: &str = "API_KEY";
pub const ENV_MODEL: &str = "AURA_GEMINI_MODEL";
pub const ENV_ENDPOINT: &str = "AURA_GEMINI_ENDPOINT";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "AURA_HTTP_TIMEOUT_SECS";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_DB_FILE_NAME: &str = "aura_habits.sqlite3";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    ZeroHabitCap,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` must be a positive integer, got `{value}`")
            }
            Self::ZeroHabitCap => write!(f, "`{ENV_HABIT_CAP}` must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

/// Language service connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageServiceConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for LanguageServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Core runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub habit_cap: usize,
    pub language: LanguageServiceConfig,
}

impl CoreConfig {
    /// Reads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let db_path = value(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
        let log_level = value(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string());

        let habit_cap = match value(ENV_HABIT_CAP) {
            Some(raw) => parse_positive(ENV_HABIT_CAP, &raw)? as usize,
            None => DEFAULT_HABIT_CAP,
        };
        if habit_cap == 0 {
            return Err(ConfigError::ZeroHabitCap);
        }

        let timeout_secs = match value(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => parse_positive(ENV_HTTP_TIMEOUT_SECS, &raw)?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let language = LanguageServiceConfig {
            api_key: value(ENV_API_KEY).or_else(|| value(ENV_API_KEY_FALLBACK)),
            model: value(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: value(ENV_ENDPOINT)
                .map(|raw| raw.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            db_path,
            log_level,
            habit_cap,
            language,
        })
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) if key == ENV_HABIT_CAP => Err(ConfigError::ZeroHabitCap),
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_MODEL};
    use std::collections::HashMap;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.habit_cap, 3);
        assert_eq!(config.language.api_key, None);
        assert_eq!(config.language.model, DEFAULT_MODEL);
        assert_eq!(config.language.timeout, Duration::from_secs(30));
    }

    #[test]
    fn api_key_falls_back_and_ignores_blank_values() {
        let config = config_from(&[("GEMINI_API_KEY", "  "), ("API_KEY", "k-1")]).unwrap();
        assert_eq!(config.language.api_key.as_deref(), Some("k-1"));
    }

    #[test]
    fn habit_cap_must_be_positive_integer() {
        assert_eq!(
            config_from(&[("AURA_HABIT_CAP", "0")]).unwrap_err(),
            ConfigError::ZeroHabitCap
        );
        assert!(matches!(
            config_from(&[("AURA_HABIT_CAP", "three")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert_eq!(
            config_from(&[("AURA_HABIT_CAP", "5")]).unwrap().habit_cap,
            5
        );
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let config = config_from(&[("AURA_GEMINI_ENDPOINT", "http://localhost:9/v1/")]).unwrap();
        assert_eq!(config.language.endpoint, "http://localhost:9/v1");
    }
}
