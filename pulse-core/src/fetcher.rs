//! Telemetry source abstraction

use async_trait::async_trait;
use thiserror::Error;

use crate::NodeSnapshot;

/// Errors from fetching a telemetry snapshot
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Source returned status: {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Inconsistent counts: {active} active and {tor} Tor out of {total} nodes")]
    Inconsistent { total: u64, active: u64, tor: u64 },
}

/// Produces a fresh snapshot from an external network source
#[async_trait]
pub trait TelemetryFetcher: Send + Sync {
    /// Human-readable source name for logs
    fn source(&self) -> &str;

    /// Fetch and derive one snapshot. A single attempt, no retries.
    async fn fetch(&self) -> Result<NodeSnapshot, FetchError>;
}
