//! User configuration for a3k.
//!
//! The configuration is stored at `~/.a3k/config.toml`. The file is optional;
//! every setting has a default, and selected settings can be overridden
//! through environment variables.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration filename
const CONFIG_FILENAME: &str = "config.toml";
/// a3k directory name in home
const A3K_HOME_DIR: &str = ".a3k";

/// Environment variable holding the Scopus API key
pub const SCOPUS_API_KEY_ENV: &str = "SCOPUS_API_KEY";

/// Default Scopus API endpoint
pub const DEFAULT_SCOPUS_BASE_URL: &str = "https://api.elsevier.com";

/// Scopus allows nine requests per second for serial title lookups
const DEFAULT_SCOPUS_REQUESTS_PER_SECOND: u32 = 9;

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct HttpConfig {
    /// User-Agent override for downloads
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Scopus API settings used by the ISSN subject code download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopusConfig {
    /// API key; `SCOPUS_API_KEY` takes precedence
    #[serde(default)]
    pub api_key: Option<String>,
    /// API base URL
    #[serde(default = "default_scopus_base_url")]
    pub base_url: String,
    /// Request rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for ScopusConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_scopus_base_url(),
            requests_per_second: DEFAULT_SCOPUS_REQUESTS_PER_SECOND,
        }
    }
}

fn default_scopus_base_url() -> String {
    DEFAULT_SCOPUS_BASE_URL.to_string()
}

fn default_requests_per_second() -> u32 {
    DEFAULT_SCOPUS_REQUESTS_PER_SECOND
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// HTTP settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Scopus settings
    #[serde(default)]
    pub scopus: ScopusConfig,
}

/// Get the a3k home directory (~/.a3k).
pub fn a3k_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Failed to determine home directory")?;
    Ok(home.join(A3K_HOME_DIR))
}

/// Get the path to the configuration file (~/.a3k/config.toml).
pub fn config_path() -> Result<PathBuf, String> {
    Ok(a3k_dir()?.join(CONFIG_FILENAME))
}

impl Config {
    /// Load the configuration from its default location, applying
    /// environment overrides.
    pub fn load() -> Result<Self, String> {
        let path = config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load the configuration from a specific path; a missing file yields
    /// the defaults.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            tracing::debug!("No configuration file at {}", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read config file {}: {err}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|err| format!("Failed to parse config file {}: {err}", path.display()))
    }

    /// Override settings from the environment through the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(SCOPUS_API_KEY_ENV).filter(|key| !key.is_empty()) {
            self.scopus.api_key = Some(key);
        }
    }

    /// The User-Agent to send with HTTP requests.
    pub fn user_agent(&self) -> String {
        self.http
            .user_agent
            .clone()
            .unwrap_or_else(crate::user_agent)
    }
}
