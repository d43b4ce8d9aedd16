//! Environment-driven server configuration.
//!
//! Every key has a default; malformed values are rejected. The resolved
//! configuration is logged once the logger is up.

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use checkin_core::default_log_level;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_DB_PATH: &str = "registrations.sqlite3";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub log_level: String,
    /// Absolute directory for rolling log files; stderr when `None`.
    pub log_dir: Option<String>,
}

impl Config {
    /// Loads configuration from `CHECKIN_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            bind: lookup("CHECKIN_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: try_load(&lookup, "CHECKIN_PORT", DEFAULT_PORT)?,
            db_path: lookup("CHECKIN_DB_PATH")
                .filter(|path| !path.trim().is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            log_level: lookup("CHECKIN_LOG_LEVEL")
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: lookup("CHECKIN_LOG_DIR").filter(|dir| !dir.trim().is_empty()),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Key=value rendering of the resolved settings for the startup log line.
    pub fn summary(&self) -> String {
        format!(
            "address={} db_path={} log_level={} log_dir={}",
            self.address(),
            self.db_path.display(),
            self.log_level,
            self.log_dir.as_deref().unwrap_or("stderr")
        )
    }
}

fn try_load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}
