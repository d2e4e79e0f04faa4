//! Registry configuration resolved from the process environment.
//!
//! # Responsibility
//! - Resolve database path and logging settings.
//! - Keep environment access in one place so callers can inject lookups.
//!
//! # Invariants
//! - Blank variables count as unset.
//! - `log_level` is always a normalized level name.

use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "BORROWERS_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "BORROWERS_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "BORROWERS_LOG_DIR";
const DEFAULT_DB_FILE_NAME: &str = "borrowers.sqlite3";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.key, self.message)
    }
}

impl Error for ConfigError {}

/// Settings for [`crate::api::Registry`] and logging bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// SQLite database file opened on every registry call.
    pub db_path: PathBuf,
    pub log_level: &'static str,
    /// Absolute directory for rolling logs. `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
}

impl RegistryConfig {
    /// Config pointing at `db_path` with default logging settings.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }

    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary key lookup.
    ///
    /// # Errors
    /// - Unsupported log level.
    /// - Relative log directory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let db_path = value(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));

        let log_level = match value(LOG_LEVEL_ENV) {
            Some(raw) => normalize_level(&raw).map_err(|message| ConfigError {
                key: LOG_LEVEL_ENV,
                message,
            })?,
            None => default_log_level(),
        };

        let log_dir = value(LOG_DIR_ENV)
            .map(|raw| normalize_log_dir(&raw))
            .transpose()
            .map_err(|message| ConfigError {
                key: LOG_DIR_ENV,
                message,
            })?;

        Ok(Self {
            db_path,
            log_level,
            log_dir,
        })
    }
}
