//! Configuration schema for Canopy
//!
//! Configuration is stored at `~/.config/canopy/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Background refresh settings
    pub refresh: RefreshConfig,

    /// Source name → backing file path
    pub sources: HashMap<String, PathBuf>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Background refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Maximum number of concurrently running cache rebuilds across
    /// all sources. Zero disables background refreshing; lookups then
    /// always answer from scoped builds.
    pub max_workers: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { max_workers: 100 }
    }
}
