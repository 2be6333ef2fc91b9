//! Node snapshots and the two-slot comparison window
//!
//! A snapshot is one reading of the peer network. The window keeps only
//! the two most recent readings; a new reading pushes the current one
//! into the previous slot and drops whatever was there before.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One telemetry reading of the peer network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    #[serde(deserialize_with = "iso8601::deserialize")]
    timestamp: DateTime<Utc>,
    total_nodes: u64,
    active_nodes: u64,
    tor_nodes: u64,
    tor_percentage: f64,
    active_ratio: f64,
}

impl NodeSnapshot {
    /// Build a snapshot from raw counts, deriving the Tor share and active ratio.
    ///
    /// Both ratios are 0 when `total_nodes` is 0.
    pub fn new(timestamp: DateTime<Utc>, total_nodes: u64, active_nodes: u64, tor_nodes: u64) -> Self {
        let (tor_percentage, active_ratio) = if total_nodes > 0 {
            let total = total_nodes as f64;
            (tor_nodes as f64 / total * 100.0, active_nodes as f64 / total)
        } else {
            (0.0, 0.0)
        };

        Self {
            timestamp,
            total_nodes,
            active_nodes,
            tor_nodes,
            tor_percentage,
            active_ratio,
        }
    }

    /// Build a snapshot stamped with the current time
    pub fn now(total_nodes: u64, active_nodes: u64, tor_nodes: u64) -> Self {
        Self::new(Utc::now(), total_nodes, active_nodes, tor_nodes)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    pub fn active_nodes(&self) -> u64 {
        self.active_nodes
    }

    pub fn tor_nodes(&self) -> u64 {
        self.tor_nodes
    }

    /// Tor nodes as a percentage of all nodes (0-100)
    pub fn tor_percentage(&self) -> f64 {
        self.tor_percentage
    }

    /// Active nodes as a fraction of all nodes (0-1)
    pub fn active_ratio(&self) -> f64 {
        self.active_ratio
    }
}

/// Lenient ISO-8601 reading: RFC 3339 with an offset, or a naive
/// date-time (no offset) taken as UTC. Writing always uses RFC 3339.
pub(crate) mod iso8601 {
    use super::*;

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp: {}", raw)))
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}

/// The retained (current, previous) pair of snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotWindow {
    current: Option<NodeSnapshot>,
    previous: Option<NodeSnapshot>,
}

impl SnapshotWindow {
    /// An empty window with neither slot populated
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reassemble a window read back from storage
    pub(crate) fn from_slots(current: Option<NodeSnapshot>, previous: Option<NodeSnapshot>) -> Self {
        Self { current, previous }
    }

    pub fn current(&self) -> Option<&NodeSnapshot> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&NodeSnapshot> {
        self.previous.as_ref()
    }

    /// Both slots as `(previous, current)`, or `None` if either is missing
    pub fn pair(&self) -> Option<(&NodeSnapshot, &NodeSnapshot)> {
        match (&self.previous, &self.current) {
            (Some(previous), Some(current)) => Some((previous, current)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.previous.is_none()
    }

    /// Install `next` as current and shift the old current into previous.
    ///
    /// The old previous snapshot is dropped; the window never holds more
    /// than two readings.
    pub fn rotate(self, next: NodeSnapshot) -> Self {
        Self {
            current: Some(next),
            previous: self.current,
        }
    }
}
