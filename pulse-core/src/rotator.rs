//! Fetch-and-rotate of the snapshot window
//!
//! A successful fetch shifts `current -> previous`, installs the new
//! reading as `current` and persists the result. A failed fetch leaves
//! the window untouched. A failed save is reported but the in-memory
//! rotation stands.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::{FetchError, SnapshotStore, SnapshotWindow, StoreError, TelemetryFetcher, DEFAULT_FETCH_TIMEOUT_SECS};

/// Result of one rotation attempt
#[derive(Debug)]
pub struct RotationOutcome {
    /// Window after the attempt (unchanged on fetch failure)
    pub window: SnapshotWindow,
    /// Whether a new snapshot was installed
    pub success: bool,
    /// Why the fetch failed, if it did
    pub fetch_error: Option<FetchError>,
    /// Why persisting the rotated window failed, if it did
    pub save_error: Option<StoreError>,
}

/// Drives one fetch against the window and persists the result
pub struct SnapshotRotator<'a, F: ?Sized> {
    fetcher: &'a F,
    store: &'a SnapshotStore,
    fetch_timeout: Duration,
}

impl<'a, F: TelemetryFetcher + ?Sized> SnapshotRotator<'a, F> {
    pub fn new(fetcher: &'a F, store: &'a SnapshotStore) -> Self {
        Self {
            fetcher,
            store,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Call the fetcher once and rotate `window` on success
    pub async fn rotate(&self, window: SnapshotWindow) -> RotationOutcome {
        let fetched = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout.as_secs())),
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Fetch from {} failed: {}", self.fetcher.source(), e);
                return RotationOutcome {
                    window,
                    success: false,
                    fetch_error: Some(e),
                    save_error: None,
                };
            }
        };

        info!(
            "Rotating window: {} total, {} active, {} Tor nodes",
            snapshot.total_nodes(),
            snapshot.active_nodes(),
            snapshot.tor_nodes()
        );
        let window = window.rotate(snapshot);

        // fs write + fsync stays off the async workers
        let store = self.store.clone();
        let to_save = window.clone();
        let saved = tokio::task::spawn_blocking(move || store.save(&to_save))
            .await
            .unwrap_or_else(|e| {
                Err(StoreError::Io {
                    path: self.store.path().to_path_buf(),
                    source: std::io::Error::other(e),
                })
            });

        let save_error = match saved {
            Ok(()) => None,
            Err(e) => {
                error!("Failed to persist window: {}", e);
                Some(e)
            }
        };

        RotationOutcome {
            window,
            success: true,
            fetch_error: None,
            save_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeSnapshot;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FixedFetcher {
        snapshot: Option<NodeSnapshot>,
        calls: AtomicUsize,
    }

    impl FixedFetcher {
        fn ok(snapshot: NodeSnapshot) -> Self {
            Self { snapshot: Some(snapshot), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { snapshot: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl TelemetryFetcher for FixedFetcher {
        fn source(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self) -> Result<NodeSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.snapshot
                .clone()
                .ok_or_else(|| FetchError::Network("connection refused".to_string()))
        }
    }

    struct StalledFetcher;

    #[async_trait]
    impl TelemetryFetcher for StalledFetcher {
        fn source(&self) -> &str {
            "stalled"
        }

        async fn fetch(&self) -> Result<NodeSnapshot, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(NodeSnapshot::now(1, 1, 0))
        }
    }

    fn seeded_window() -> SnapshotWindow {
        SnapshotWindow::empty()
            .rotate(NodeSnapshot::now(9_000, 7_200, 1_000))
            .rotate(NodeSnapshot::now(9_050, 7_240, 1_020))
    }

    #[tokio::test]
    async fn test_successful_rotation_persists() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("window.json"));
        let fresh = NodeSnapshot::now(9_100, 7_280, 1_060);
        let fetcher = FixedFetcher::ok(fresh.clone());

        let before = seeded_window();
        let outcome = SnapshotRotator::new(&fetcher, &store).rotate(before.clone()).await;

        assert!(outcome.success);
        assert!(outcome.save_error.is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.window.previous(), before.current());
        assert_eq!(outcome.window.current(), Some(&fresh));
        assert_eq!(store.load(), outcome.window);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_window_unchanged() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("window.json"));
        let fetcher = FixedFetcher::failing();

        let before = seeded_window();
        let outcome = SnapshotRotator::new(&fetcher, &store).rotate(before.clone()).await;

        assert!(!outcome.success);
        assert!(matches!(outcome.fetch_error, Some(FetchError::Network(_))));
        assert_eq!(outcome.window, before);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_rotation() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing").join("window.json"));
        let fresh = NodeSnapshot::now(9_100, 7_280, 1_060);
        let fetcher = FixedFetcher::ok(fresh.clone());

        let outcome = SnapshotRotator::new(&fetcher, &store).rotate(seeded_window()).await;

        assert!(outcome.success);
        assert!(outcome.save_error.is_some());
        assert_eq!(outcome.window.current(), Some(&fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_fetch_times_out() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("window.json"));

        let before = seeded_window();
        let outcome = SnapshotRotator::new(&StalledFetcher, &store)
            .with_timeout(Duration::from_secs(10))
            .rotate(before.clone())
            .await;

        assert!(!outcome.success);
        assert!(matches!(outcome.fetch_error, Some(FetchError::Timeout(10))));
        assert_eq!(outcome.window, before);
    }
}
