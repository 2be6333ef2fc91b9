//! HTTP client for telemetry sources
//!
//! Creates clients with a hard request timeout, optionally routed through
//! a SOCKS5h proxy so the fetch itself can go over Tor.

use reqwest::{Client, Proxy};
use serde::Deserialize;
use std::time::Duration;

use pulse_core::{FetchError, DEFAULT_FETCH_TIMEOUT_SECS};

/// Public Bitnodes endpoint for the latest network snapshot
pub const BITNODES_LATEST: &str = "https://bitnodes.io/api/v1/snapshots/latest/";

/// Telemetry source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Snapshot endpoint
    pub api_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// SOCKS proxy, e.g. `socks5h://127.0.0.1:9050`
    pub socks_proxy: Option<String>,
    /// Fixed user agent; a random browser agent is used when unset
    pub user_agent: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            api_url: BITNODES_LATEST.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            socks_proxy: None,
            user_agent: None,
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Create an HTTP client for the configured source
pub fn create_client(config: &FetcherConfig) -> Result<Client, FetchError> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| random_user_agent().to_string());

    let mut builder = Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .user_agent(user_agent);

    if let Some(addr) = &config.socks_proxy {
        let proxy = Proxy::all(addr).map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| FetchError::ClientBuild(e.to_string()))
}

/// Map a transport error onto the fetch taxonomy
pub(crate) fn request_error(e: reqwest::Error, config: &FetcherConfig) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(config.timeout_secs)
    } else if e.is_decode() {
        FetchError::Payload(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}
