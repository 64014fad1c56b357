//! Configuration management for a Viridian ledger node

use crate::model::DEFAULT_NAMESPACE;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Overrides `secrets.network_key` so the key can stay out of config files
pub const NETWORK_KEY_ENV: &str = "VIRIDIAN_NETWORK_KEY";

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Deserialize)]
pub struct SecretsConfig {
    /// Key shared by every replica; secrets are derived from it
    #[serde(default)]
    pub network_key: String,
    #[serde(default = "default_secret_length")]
    pub length: usize,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("network_key", &"<redacted>")
            .field("length", &self.length)
            .finish()
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            network_key: String::new(),
            length: default_secret_length(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_sender")]
    pub sender: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_database_path() -> String {
    "./data/viridian.db".to_string()
}

fn default_secret_length() -> usize {
    32
}

fn default_sender() -> String {
    "noreply@viridian.org".to_string()
}

pub fn load_config_from(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    // Sane defaults when the file is absent
    let mut config: Config = if config_str.is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    if let Ok(key) = std::env::var(NETWORK_KEY_ENV) {
        if !key.is_empty() {
            config.secrets.network_key = key;
        }
    }

    // Validate critical values
    if !is_valid_namespace(&config.network.namespace) {
        return Err(format!(
            "network.namespace '{}' is not a dotted identifier",
            config.network.namespace
        )
        .into());
    }

    if config.database.path.is_empty() {
        return Err("database.path must be set in config.toml".into());
    }

    Ok(config)
}

fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
