//! Onion Pulse Network Layer
//!
//! Fetches peer-network telemetry over HTTP:
//! - Client construction with optional SOCKS5h proxy (route through Tor)
//! - Bitnodes snapshot schema and node classification
//! - A single bounded fetch per refresh, no retries

pub mod client;
pub mod bitnodes;

pub use client::*;
pub use bitnodes::*;
