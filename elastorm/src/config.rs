//! Backend settings
//!
//! Read from a TOML file:
//!
//! ```toml
//! [database]
//! host = "127.0.0.1"
//! port = "9200"
//! name = "blog"
//! addressing = "index_per_type"
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::{Error, Result};
use crate::transport::Addressing;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Prefix of the test database name when none is configured.
pub const TEST_DATABASE_PREFIX: &str = "test_";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_host")]
    pub host: String,
    /// Kept as a string so a malformed value surfaces at connect time
    #[serde(default = "default_port")]
    pub port: String,
    /// Index backing this database
    #[serde(default = "default_name")]
    pub name: String,
    pub test_name: Option<String>,
    #[serde(default)]
    pub addressing: Addressing,
    /// Refresh after every write so reads see it immediately
    #[serde(default = "default_true")]
    pub refresh_after_write: bool,
    /// Hit window requested per search; the engine default when unset
    pub window_size: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> String {
    "9200".to_string()
}

fn default_name() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: default_name(),
            test_name: None,
            addressing: Addressing::default(),
            refresh_after_write: true,
            window_size: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DatabaseSettings {
    pub fn port_number(&self) -> Result<u16> {
        self.port
            .trim()
            .parse()
            .map_err(|_| Error::Config("PORT must be an integer".to_string()))
    }

    /// Name used for the test database: `test_name` if set, otherwise the
    /// prefixed database name.
    pub fn test_database_name(&self) -> String {
        match &self.test_name {
            Some(name) => name.clone(),
            None => format!("{TEST_DATABASE_PREFIX}{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load settings from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("cannot create {}: {e}", parent.display())))?;
        }
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("cannot write {}: {e}", path.display())))
    }
}
