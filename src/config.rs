//! `rowkit.toml` configuration.
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/app"
//! dialect = "postgres"
//! max_connections = 5
//!
//! [logging]
//! filter = "rowkit=debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::transpiler::Dialect;

pub const FILE_NAME: &str = "rowkit.toml";
pub const DATABASE_URL_ENV: &str = "ROWKIT_DATABASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            dialect: Dialect::default(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

fn default_filter() -> String {
    "rowkit=info".to_string()
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// `./rowkit.toml`, then `<config dir>/rowkit/rowkit.toml`.
    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("rowkit").join(FILE_NAME))
            .filter(|path| path.exists())
    }

    /// Discovered file (or defaults), with the environment override applied.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::locate() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::var(DATABASE_URL_ENV).ok());
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file is an error.
    pub fn load_required() -> Result<Self, ConfigError> {
        let path = Self::locate().ok_or(ConfigError::NotFound)?;
        let mut config = Self::from_file(&path)?;
        config.apply_env(std::env::var(DATABASE_URL_ENV).ok());
        Ok(config)
    }

    fn apply_env(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.database.url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let config = Config::from_toml(
            r#"
            [database]
            url = "mysql://root@localhost/app"
            dialect = "mysql"
            max_connections = 2

            [logging]
            filter = "rowkit=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.dialect, Dialect::MySQL);
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.filter, "rowkit=debug");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.database.dialect, Dialect::Postgres);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.filter, "rowkit=info");
    }

    #[test]
    fn test_bad_dialect() {
        let err = Config::from_toml("[database]\ndialect = \"oracle\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env(Some("postgres://override/db".into()));
        assert_eq!(config.database.url, "postgres://override/db");
        config.apply_env(Some(String::new()));
        assert_eq!(config.database.url, "postgres://override/db");
    }
}
