//! Runtime configuration for tracker hosts.
//!
//! # Responsibility
//! - Resolve database, logging and sync settings from the environment.
//! - Keep defaults in one place for CLI and embedding hosts.
//!
//! # Invariants
//! - Blank environment values behave as if unset.
//! - Malformed numeric values are rejected instead of silently defaulted.

use crate::logging::default_log_level;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "XPTRACK_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "XPTRACK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "XPTRACK_LOG_DIR";
pub const ENV_REFRESH_PACING_MS: &str = "XPTRACK_REFRESH_PACING_MS";
pub const ENV_HISTORY_DAYS: &str = "XPTRACK_HISTORY_DAYS";

const DEFAULT_DB_FILE_NAME: &str = "xptrack.sqlite3";
const DEFAULT_REFRESH_PACING_MS: u64 = 2_000;
const DEFAULT_HISTORY_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{key}` must be a non-negative integer, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },
}

/// Logging settings. File logging is enabled only when `dir` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub dir: Option<PathBuf>,
}

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    pub log: LogConfig,
    /// Pause between upstream calls during a full refresh.
    pub refresh_pacing: Duration,
    /// Default window for history queries.
    pub history_window_days: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log: LogConfig {
                level: default_log_level().to_string(),
                dir: None,
            },
            refresh_pacing: Duration::from_millis(DEFAULT_REFRESH_PACING_MS),
            history_window_days: DEFAULT_HISTORY_DAYS,
        }
    }
}

impl TrackerConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let refresh_pacing = match read(ENV_REFRESH_PACING_MS) {
            Some(raw) => Duration::from_millis(parse_number(ENV_REFRESH_PACING_MS, &raw)?),
            None => defaults.refresh_pacing,
        };
        let history_window_days = match read(ENV_HISTORY_DAYS) {
            Some(raw) => parse_number(ENV_HISTORY_DAYS, &raw)?,
            None => defaults.history_window_days,
        };

        Ok(Self {
            db_path: read(ENV_DB_PATH).map_or(defaults.db_path, PathBuf::from),
            log: LogConfig {
                level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log.level),
                dir: read(ENV_LOG_DIR).map(PathBuf::from),
            },
            refresh_pacing,
            history_window_days,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}
