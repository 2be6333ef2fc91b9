//! Onion Pulse Runtime
//!
//! Owns the snapshot window for a session and serializes the
//! fetch -> rotate -> persist -> classify cycle.

pub mod config;
pub mod analyzer;

pub use config::*;
pub use analyzer::*;
