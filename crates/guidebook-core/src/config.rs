//! Client configuration
//!
//! Layered: built-in defaults, then an optional `guidebook.toml`, then
//! explicit overrides (environment variables and CLI flags, applied by the
//! binary).

use crate::cache::{CacheConfig, CACHE_TTL};
use crate::error::ContentError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default backend when nothing is configured
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// File name looked up in the config directory
pub const CONFIG_FILE: &str = "guidebook.toml";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API
    pub base_url: String,

    /// Directory holding the content cache database
    pub cache_dir: PathBuf,

    /// Maximum age of cached content
    pub cache_ttl: Duration,

    /// Per-request network timeout
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            cache_dir: default_cache_dir(),
            cache_ttl: CACHE_TTL,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// On-disk representation; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    cache_dir: Option<PathBuf>,
    cache_ttl_hours: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// Defaults overlaid with `path` when it exists
    pub fn load(path: Option<&Path>) -> Result<Self, ContentError> {
        let mut config = Self::default();

        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        if let Some(path) = path {
            let content = std::fs::read_to_string(&path).map_err(|e| ContentError::InvalidConfig {
                message: format!("Failed to read {}: {}", path.display(), e),
            })?;
            config.merge_toml(&content).map_err(|message| ContentError::InvalidConfig {
                message: format!("{}: {}", path.display(), message),
            })?;
            debug!(path = %path.display(), "Loaded client config file");
        }

        Ok(config)
    }

    fn merge_toml(&mut self, content: &str) -> Result<(), String> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| e.to_string())?;

        if let Some(url) = file.api_url {
            self.base_url = url;
        }
        if let Some(dir) = file.cache_dir {
            self.cache_dir = dir;
        }
        if let Some(hours) = file.cache_ttl_hours {
            self.cache_ttl = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl,
        }
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<(), ContentError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ContentError::InvalidConfig {
                message: format!("API URL must start with http:// or https://: {}", self.base_url),
            });
        }
        if self.cache_ttl.is_zero() {
            return Err(ContentError::InvalidConfig {
                message: "cache TTL must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// `~/.cache/guidebook` (platform equivalent), or `./.guidebook-cache`
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("guidebook"))
        .unwrap_or_else(|| PathBuf::from(".guidebook-cache"))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("guidebook").join(CONFIG_FILE))
}
