//! Onion Pulse Core - snapshot window and signal rules
//!
//! This crate provides the decision-making primitives:
//! - Node snapshots and the two-slot (current, previous) window
//! - Durable window storage with atomic replacement
//! - Fetch-and-rotate of the window
//! - Confidence factors derived from a snapshot pair
//! - Tor-driven trading signal and network growth signal

pub mod snapshot;
pub mod store;
pub mod fetcher;
pub mod rotator;
pub mod confidence;
pub mod signals;

pub use snapshot::*;
pub use store::*;
pub use fetcher::*;
pub use rotator::*;
pub use confidence::*;
pub use signals::*;

/// Default timeout for a single telemetry fetch, in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Default location of the persisted window
pub const DEFAULT_DATA_FILE: &str = "network_data.json";

/// Tor node delta above which a move counts as large
pub const LARGE_TOR_CHANGE: i64 = 50;

/// Tor node delta above which a move counts as medium
pub const MEDIUM_TOR_CHANGE: i64 = 25;

/// Tor node delta above which a move is worth a slight signal
pub const SLIGHT_TOR_CHANGE: i64 = 10;

/// Percentage move above which a change counts as large
pub const LARGE_PERCENTAGE_CHANGE: f64 = 5.0;

/// Percentage move above which a change counts as medium
pub const MEDIUM_PERCENTAGE_CHANGE: f64 = 2.5;

/// Total node count above which the network counts as large
pub const LARGE_NETWORK: u64 = 10_000;

/// Total node count above which the network counts as medium
pub const MEDIUM_NETWORK: u64 = 8_000;

/// Inclusive active-ratio band considered healthy
pub const HEALTHY_ACTIVE_RATIO: (f64, f64) = (0.7, 0.9);

/// Inclusive active-ratio band considered moderate
pub const MODERATE_ACTIVE_RATIO: (f64, f64) = (0.6, 0.95);

/// Total node growth above which the network is growing strongly
pub const STRONG_GROWTH: i64 = 100;

/// Total node growth above which the network is growing
pub const GROWTH: i64 = 50;
