//! Client configuration at `~/.voxgate/config.toml`.
//!
//! Provides default guild id, token file path, and API base settings.
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default connection settings.
    #[serde(default)]
    pub default: DefaultConfig,
}

/// Default connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Default guild id (empty = ask at startup).
    #[serde(default)]
    pub guild_id: String,

    /// Token file path.
    #[serde(default = "default_tokens_path")]
    pub tokens_path: String,

    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            guild_id: String::new(),
            tokens_path: default_tokens_path(),
            api_base: default_api_base(),
        }
    }
}

fn default_tokens_path() -> String {
    "data/tokens.txt".to_string()
}

fn default_api_base() -> String {
    voxgate_client::rest::DEFAULT_API_BASE.to_string()
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
