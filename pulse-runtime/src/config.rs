//! Analyzer configuration
//!
//! Loaded from an optional TOML file; every field has a default so an
//! empty or partial file is valid.
//!
//! ```toml
//! data_file = "/var/lib/onion-pulse/window.json"
//!
//! [fetcher]
//! api_url = "https://bitnodes.io/api/v1/snapshots/latest/"
//! timeout_secs = 10
//! socks_proxy = "socks5h://127.0.0.1:9050"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use pulse_core::DEFAULT_DATA_FILE;
use pulse_net::FetcherConfig;

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Analyzer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Where the (current, previous) window is persisted
    pub data_file: PathBuf,
    /// Telemetry source settings
    pub fetcher: FetcherConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            fetcher: FetcherConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
