//! Application configuration management.
//!
//! Loads and saves the console configuration: backend base URL, directions
//! provider settings and the last used username. Values can be overridden
//! through the environment (`FLARE_API_URL`, `FLARE_DIRECTIONS_URL`,
//! `MAPBOX_ACCESS_TOKEN`).
//!
//! Configuration is stored at `~/.config/flare/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "flare";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Local development backend.
const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Directions Provider endpoint.
const DEFAULT_DIRECTIONS_URL: &str = "https://api.mapbox.com";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub directions_base_url: Option<String>,
    pub mapbox_access_token: Option<String>,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Backend base URL: env override, then config, then localhost.
    pub fn api_url(&self) -> String {
        std::env::var("FLARE_API_URL")
            .ok()
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Directions Provider base URL.
    pub fn directions_url(&self) -> String {
        std::env::var("FLARE_DIRECTIONS_URL")
            .ok()
            .or_else(|| self.directions_base_url.clone())
            .unwrap_or_else(|| DEFAULT_DIRECTIONS_URL.to_string())
    }

    /// Access token for the Directions Provider, if configured.
    pub fn mapbox_token(&self) -> Option<String> {
        std::env::var("MAPBOX_ACCESS_TOKEN")
            .ok()
            .or_else(|| self.mapbox_access_token.clone())
    }
}
