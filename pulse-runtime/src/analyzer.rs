//! Session analyzer
//!
//! Holds the snapshot window for one process and runs the refresh cycle:
//! - Fetch a snapshot (single bounded attempt)
//! - Rotate the window and persist it
//! - Classify the window into Tor and network signals
//!
//! Refreshes are serialized behind a single-writer lock so concurrent
//! triggers never interleave a rotation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, info, warn};

use pulse_core::{
    FetchError, NetworkSignal, SignalResult, SnapshotRotator, SnapshotStore, SnapshotWindow, TelemetryFetcher,
};
use pulse_net::HttpFetcher;

use crate::AnalyzerConfig;

/// Outcome of one refresh, for the caller to report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// A new snapshot was installed
    pub updated: bool,
    /// The window reached durable storage
    pub persisted: bool,
    /// Fetch or save failure description
    pub error: Option<String>,
}

/// Everything a renderer needs to display the current state
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub window: SnapshotWindow,
    pub signal: SignalResult,
    pub network: NetworkSignal,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Analysis {
    pub fn of(window: SnapshotWindow, last_updated: Option<DateTime<Utc>>) -> Self {
        Self {
            signal: SignalResult::evaluate(&window),
            network: NetworkSignal::evaluate(&window),
            window,
            last_updated,
        }
    }
}

struct SessionState {
    window: SnapshotWindow,
    last_updated: Option<DateTime<Utc>>,
}

/// Per-session owner of the snapshot window
pub struct Analyzer {
    store: SnapshotStore,
    fetcher: Box<dyn TelemetryFetcher>,
    fetch_timeout: Duration,
    state: Mutex<SessionState>,
}

impl Analyzer {
    /// Open a session over `store`, loading whatever window it holds
    pub fn open(store: SnapshotStore, fetcher: Box<dyn TelemetryFetcher>, fetch_timeout: Duration) -> Self {
        let window = store.load();
        let last_updated = store.last_updated();
        info!(
            "Opened window at {} ({} snapshot(s))",
            store.path().display(),
            window.current().iter().count() + window.previous().iter().count()
        );

        Self {
            store,
            fetcher,
            fetch_timeout,
            state: Mutex::new(SessionState { window, last_updated }),
        }
    }

    /// Open a session backed by the configured HTTP source
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config.fetcher.clone())?;
        Ok(Self::open(
            SnapshotStore::new(&config.data_file),
            Box::new(fetcher),
            config.fetcher.timeout(),
        ))
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Fetch, rotate and persist once
    pub async fn refresh(&self) -> RefreshReport {
        let mut state = self.state.lock().await;

        let outcome = SnapshotRotator::new(self.fetcher.as_ref(), &self.store)
            .with_timeout(self.fetch_timeout)
            .rotate(state.window.clone())
            .await;

        state.window = outcome.window;
        if outcome.success && outcome.save_error.is_none() {
            state.last_updated = Some(Utc::now());
        }

        let error = outcome
            .fetch_error
            .map(|e| format!("fetch failed: {}", e))
            .or_else(|| outcome.save_error.map(|e| format!("save failed: {}", e)));

        RefreshReport {
            updated: outcome.success,
            persisted: outcome.success && error.is_none(),
            error,
        }
    }

    /// Classify the current in-memory window
    pub async fn analyze(&self) -> Analysis {
        let state = self.state.lock().await;
        let analysis = Analysis::of(state.window.clone(), state.last_updated);
        debug!(
            "Analysis: {} ({} confidence), {}",
            analysis.signal.signal, analysis.signal.confidence, analysis.network.network_signal
        );
        analysis
    }

    /// Refresh on a fixed schedule, calling `on_cycle` after each refresh.
    ///
    /// Stops after `max_cycles` refreshes (0 = until Ctrl-C) and returns
    /// the number of cycles run.
    pub async fn watch<C>(&self, every: Duration, max_cycles: u64, mut on_cycle: C) -> u64
    where
        C: FnMut(&RefreshReport, &Analysis),
    {
        let mut ticker = interval(every);
        let mut cycles = 0u64;

        info!("Watching {} every {:?}", self.fetcher.source(), every);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted after {} cycle(s)", cycles);
                    break;
                }
            }

            let report = self.refresh().await;
            if let Some(e) = &report.error {
                warn!("Cycle {}: {}", cycles + 1, e);
            }
            let analysis = self.analyze().await;
            on_cycle(&report, &analysis);

            cycles += 1;
            if max_cycles > 0 && cycles >= max_cycles {
                break;
            }
        }

        cycles
    }
}
