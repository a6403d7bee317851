//! # Configuration
//!
//! Settings for the rolesync binary, resolved from (highest first):
//! 1. command-line flags
//! 2. `ROLESYNC_*` environment variables
//! 3. the TOML config file
//! 4. built-in defaults
//!
//! ```toml
//! database = "rolesync.redb"
//! documents = "."
//! log_format = "text"
//! ```

use rolesync_core::SyncError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file read when neither `--config` nor `ROLESYNC_CONFIG` is set.
pub const DEFAULT_CONFIG_FILE: &str = "rolesync.toml";

/// Default redb database path.
pub const DEFAULT_DATABASE: &str = "rolesync.redb";

pub const ENV_CONFIG: &str = "ROLESYNC_CONFIG";
pub const ENV_DATABASE: &str = "ROLESYNC_DATABASE";
pub const ENV_DOCUMENTS: &str = "ROLESYNC_DOCUMENTS";
pub const ENV_LOG_FORMAT: &str = "ROLESYNC_LOG_FORMAT";

// =============================================================================
// LOG FORMAT
// =============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(SyncError::Parse(format!(
                "unknown log format '{}', expected 'text' or 'json'",
                other
            ))),
        }
    }
}

// =============================================================================
// FILE CONFIG
// =============================================================================

/// Contents of `rolesync.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<PathBuf>,
    pub documents: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    /// Parse config file contents.
    pub fn parse(content: &str) -> Result<Self, SyncError> {
        toml::from_str(content).map_err(|e| SyncError::Parse(format!("config: {}", e)))
    }

    /// Read a config file. A missing file is an error only when `required`.
    pub fn read(path: &Path, required: bool) -> Result<Self, SyncError> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Io(format!("config {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub documents: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub documents: PathBuf,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            documents: PathBuf::from("."),
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Resolve settings against the process environment.
    pub fn load(overrides: &Overrides) -> Result<Self, SyncError> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings with `env` standing in for the environment.
    pub fn resolve(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        let env_path = |key: &str| env(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        let file = match overrides.config.clone().or_else(|| env_path(ENV_CONFIG)) {
            Some(path) => FileConfig::read(&path, true)?,
            None => FileConfig::read(Path::new(DEFAULT_CONFIG_FILE), false)?,
        };

        let defaults = Self::default();
        let log_format = match env(ENV_LOG_FORMAT).filter(|v| !v.is_empty()) {
            Some(value) => value.parse()?,
            None => file.log_format.unwrap_or(defaults.log_format),
        };

        Ok(Self {
            database: overrides
                .database
                .clone()
                .or_else(|| env_path(ENV_DATABASE))
                .or(file.database)
                .unwrap_or(defaults.database),
            documents: overrides
                .documents
                .clone()
                .or_else(|| env_path(ENV_DOCUMENTS))
                .or(file.documents)
                .unwrap_or(defaults.documents),
            log_format,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_keys_are_optional() {
        assert_eq!(FileConfig::parse("").expect("parse"), FileConfig::default());

        let file = FileConfig::parse("log_format = \"json\"").expect("parse");
        assert_eq!(file.log_format, Some(LogFormat::Json));
        assert!(file.database.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            FileConfig::parse("databse = \"x\""),
            Err(SyncError::Parse(_))
        ));
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().expect("parse"), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
