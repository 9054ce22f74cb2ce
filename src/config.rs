use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Environment variable naming a YAML config file.
pub const CONFIG_PATH_ENV: &str = "MUXLINE_CONFIG";
/// Environment variable overriding the bind address.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Config {
    /// Loads the config file named by `MUXLINE_CONFIG` (if set), then applies
    /// the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        Ok(base.with_listen_override(std::env::var(LISTEN_ENV).ok()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Replaces the bind address when `listen` is `Some`.
    pub fn with_listen_override(mut self, listen: Option<String>) -> Self {
        if let Some(addr) = listen {
            self.listen_addr = addr;
        }
        self
    }
}
