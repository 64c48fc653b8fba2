//! app::config
//!
//! Application configuration store.
//!
//! # Overview
//!
//! A flat key/value map read through the ambient application (for example
//! `current_app()` inside a command). Values are `serde_json::Value` so
//! they can be handed to the shell unchanged. Files are TOML; top-level
//! keys become configuration keys, nested tables stay nested.
//!
//! # Example
//!
//! ```
//! use flask_cli::app::Config;
//!
//! let config = Config::from_toml_str("GREETING = \"Howdy\"\nWORKERS = 4").unwrap();
//! assert_eq!(config.get_str("GREETING").as_deref(), Some("Howdy"));
//! assert_eq!(config.get("WORKERS"), Some(serde_json::json!(4)));
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde_json::Value;
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Application configuration.
#[derive(Debug, Default)]
pub struct Config {
    values: RwLock<BTreeMap<String, Value>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML source text.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::parse(source, Path::new("<string>"))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source, path)
    }

    fn parse(source: &str, path: &Path) -> Result<Self, ConfigError> {
        let table = source
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut values = BTreeMap::new();
        for (key, value) in table {
            let json = serde_json::to_value(&value).map_err(|e| ConfigError::InvalidValue {
                key: key.clone(),
                message: e.to_string(),
            })?;
            values.insert(key, json);
        }
        Ok(Self {
            values: RwLock::new(values),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// String value for `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Copy of all entries.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }
}
