//! Durable storage for the snapshot window
//!
//! The window is kept as a small JSON document:
//! `{ current_data, previous_data, last_updated }`. Writes go to a
//! temporary file in the same directory which then replaces the target,
//! so a reader never sees a half-written document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{NodeSnapshot, SnapshotWindow};

/// Errors from persisting the window
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize window: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk layout of the window
#[derive(Debug, Serialize, Deserialize)]
struct PersistedWindow {
    current_data: Option<NodeSnapshot>,
    previous_data: Option<NodeSnapshot>,
    #[serde(default, deserialize_with = "crate::snapshot::iso8601::deserialize_option")]
    last_updated: Option<DateTime<Utc>>,
}

/// File-backed store for the (current, previous) window
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted window.
    ///
    /// A missing, unreadable or malformed file yields an empty window.
    pub fn load(&self) -> SnapshotWindow {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No window stored at {}", self.path.display());
                return SnapshotWindow::empty();
            }
            Err(e) => {
                warn!("Cannot read {}: {} (starting empty)", self.path.display(), e);
                return SnapshotWindow::empty();
            }
        };

        match serde_json::from_str::<PersistedWindow>(&content) {
            Ok(stored) => SnapshotWindow::from_slots(stored.current_data, stored.previous_data),
            Err(e) => {
                warn!("Malformed window in {}: {} (starting empty)", self.path.display(), e);
                SnapshotWindow::empty()
            }
        }
    }

    /// Timestamp of the last successful save, if the file carries one
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let content = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str::<PersistedWindow>(&content)
            .ok()
            .and_then(|stored| stored.last_updated)
    }

    /// Persist the window together with a fresh `last_updated` stamp
    pub fn save(&self, window: &SnapshotWindow) -> Result<(), StoreError> {
        let stored = PersistedWindow {
            current_data: window.current().cloned(),
            previous_data: window.previous().cloned(),
            last_updated: Some(Utc::now()),
        };
        let json = serde_json::to_vec_pretty(&stored)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;

        debug!("Saved window to {}", self.path.display());
        Ok(())
    }
}
