//! TOML configuration

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::drivers::{DEFAULT_BASE_URL, IN_MEMORY};
use crate::stores::RemoteOptions;
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    /// SQLite file, or `:memory:`
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub spreadsheet_id: String,
    #[serde(default = "default_read_range")]
    pub read_range: String,
    #[serde(default = "default_append_range")]
    pub append_range: String,
    /// JSON file holding `access_token`
    pub credentials: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    /// Adapter options described by this section
    pub fn options(&self) -> RemoteOptions {
        RemoteOptions {
            read_range: self.read_range.clone(),
            append_range: self.append_range.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub local: LocalConfig,
    /// Absent means local-only mode
    pub remote: Option<RemoteConfig>,
}

fn default_database() -> PathBuf {
    PathBuf::from("expense.db")
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_read_range() -> String {
    RemoteOptions::default().read_range
}

fn default_append_range() -> String {
    RemoteOptions::default().append_range
}

fn default_timeout_secs() -> u64 {
    RemoteOptions::default().timeout.as_secs()
}

impl Config {
    /// Parse a configuration document
    pub fn from_toml(contents: &str) -> ExpenseResult<Self> {
        toml::from_str(contents).map_err(|e| ExpenseError::Config(e.to_string()))
    }

    /// Load the configuration file at `path`
    ///
    /// Relative paths inside the file are resolved against the file's directory.
    pub fn load_from_file(path: &Path) -> ExpenseResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExpenseError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&contents).map_err(|e| {
            ExpenseError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        let base_dir = path.parent().map(ToOwned::to_owned).unwrap_or_default();
        let database = &config.local.database;
        if database.is_relative() && database != Path::new(IN_MEMORY) {
            config.local.database = base_dir.join(&config.local.database);
        }
        if let Some(remote) = &mut config.remote {
            if remote.credentials.is_relative() {
                remote.credentials = base_dir.join(&remote.credentials);
            }
        }
        Ok(config)
    }

    /// Load `expense-sync.toml` or `.expense-sync.toml` from the working
    /// directory, whichever exists first
    pub fn find_and_load() -> ExpenseResult<Option<Self>> {
        let config_locations = [
            Path::new("expense-sync.toml"),
            Path::new(".expense-sync.toml"),
        ];

        for location in &config_locations {
            if location.exists() {
                return Self::load_from_file(location).map(Some);
            }
        }

        Ok(None)
    }
}
