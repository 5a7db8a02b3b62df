//! Throttled, client-side ranked search.
//!
//! [`SearchRanker`] owns the current query and the current ranked result
//! set. Queries are fed in with [`SearchRanker::set_query`] and picked up
//! by a single worker task, which sends at most one request per throttle
//! interval and always the most recent query. Every successful response
//! is ranked with [`plexsync_core::search::rank`] and replaces the
//! published set wholesale.
//!
//! Download actions bypass the worker entirely. They are spawned as
//! independent tasks and never tracked here; progress arrives later over
//! the realtime channel.

use std::sync::Arc;
use std::time::Duration;

use plexsync_core::search::{rank, SearchResult};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, DownloadResponse};
use crate::backend::MediaBackend;
use crate::throttle::Throttle;

/// Default spacing between outbound search requests.
pub const DEFAULT_SEARCH_INTERVAL: Duration = Duration::from_millis(400);

/// Capacity of the failure broadcast. Slow receivers lag rather than
/// block the worker.
const FAILURE_CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Published types
// ---------------------------------------------------------------------------

/// Ranked results for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedResultSet {
    /// The query these results answer. Empty for the cleared set.
    pub query: String,
    pub results: Vec<SearchResult>,
}

impl RankedResultSet {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A search request that failed. The previously published set is kept.
#[derive(Debug, Clone)]
pub struct SearchFailure {
    pub query: String,
    pub error: Arc<ApiError>,
}

// ---------------------------------------------------------------------------
// SearchRanker
// ---------------------------------------------------------------------------

/// Handle to the search worker.
pub struct SearchRanker {
    backend: Arc<dyn MediaBackend>,
    query_tx: watch::Sender<String>,
    results_tx: Arc<watch::Sender<RankedResultSet>>,
    failures_tx: broadcast::Sender<SearchFailure>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl SearchRanker {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(backend: Arc<dyn MediaBackend>, interval: Duration) -> Self {
        let (query_tx, query_rx) = watch::channel(String::new());
        let (results_tx, _) = watch::channel(RankedResultSet::default());
        let results_tx = Arc::new(results_tx);
        let (failures_tx, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        tracing::info!(interval_ms = interval.as_millis() as u64, "Search worker started");

        let worker = tokio::spawn(run_worker(
            Arc::clone(&backend),
            query_rx,
            Arc::clone(&results_tx),
            failures_tx.clone(),
            Throttle::new(interval),
            cancel.clone(),
        ));

        Self {
            backend,
            query_tx,
            results_tx,
            failures_tx,
            cancel,
            worker,
        }
    }

    /// Replace the current query.
    ///
    /// A blank query clears the published set right away and sends
    /// nothing. Repeating the current query is a no-op.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();

        if is_blank(&query) {
            self.query_tx.send_if_modified(|current| {
                let changed = !current.is_empty();
                current.clear();
                changed
            });
            self.results_tx.send_if_modified(|set| {
                let changed = *set != RankedResultSet::default();
                *set = RankedResultSet::default();
                changed
            });
            tracing::debug!("Search query cleared");
            return;
        }

        self.query_tx.send_if_modified(|current| {
            if *current == query {
                return false;
            }
            *current = query;
            true
        });
    }

    /// The query most recently passed to [`set_query`](Self::set_query).
    pub fn query(&self) -> String {
        self.query_tx.borrow().clone()
    }

    /// Receiver that sees every newly published result set.
    pub fn results(&self) -> watch::Receiver<RankedResultSet> {
        self.results_tx.subscribe()
    }

    pub fn current_results(&self) -> RankedResultSet {
        self.results_tx.borrow().clone()
    }

    /// Receiver for failed searches published from now on.
    pub fn failures(&self) -> broadcast::Receiver<SearchFailure> {
        self.failures_tx.subscribe()
    }

    /// Fire-and-forget download of `key`.
    pub fn download(&self, key: impl Into<String>) -> JoinHandle<Result<DownloadResponse, ApiError>> {
        self.trigger(key.into(), false)
    }

    /// Fire-and-forget download of `key` and of its future items.
    pub fn download_persist(
        &self,
        key: impl Into<String>,
    ) -> JoinHandle<Result<DownloadResponse, ApiError>> {
        self.trigger(key.into(), true)
    }

    /// Stop the worker and wait for it to exit. An in-flight search is
    /// abandoned.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Search worker panicked");
        }
    }

    // ---- private helpers ----

    fn trigger(&self, key: String, persist: bool) -> JoinHandle<Result<DownloadResponse, ApiError>> {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let outcome = backend.download(&key, persist).await;
            match &outcome {
                Ok(response) => {
                    tracing::info!(key = %key, persist, log = %response.log, "Download requested");
                }
                Err(e) => {
                    tracing::warn!(key = %key, persist, error = %e, "Download request failed");
                }
            }
            outcome
        })
    }
}

fn is_blank(query: &str) -> bool {
    query.trim().is_empty()
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Pull the latest query, wait out the throttle, search, rank, publish.
///
/// Runs until `cancel` fires or the ranker handle is dropped. One request
/// is in flight at a time, so responses are applied in send order.
async fn run_worker(
    backend: Arc<dyn MediaBackend>,
    mut query_rx: watch::Receiver<String>,
    results_tx: Arc<watch::Sender<RankedResultSet>>,
    failures_tx: broadcast::Sender<SearchFailure>,
    mut throttle: Throttle,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = query_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        if is_blank(&query_rx.borrow()) {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = throttle.ready() => {}
        }

        // Keystrokes that arrived during the wait collapse into this one.
        let query = query_rx.borrow_and_update().clone();
        if is_blank(&query) {
            continue;
        }

        throttle.mark_sent(Instant::now());
        tracing::debug!(query = %query, "Sending search");
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = backend.search(&query) => outcome,
        };

        match outcome {
            Ok(raw) => {
                if is_blank(&query_rx.borrow()) {
                    tracing::debug!(query = %query, "Discarding results for cleared query");
                    continue;
                }
                let received = raw.len();
                let results = rank(&query, raw);
                tracing::info!(query = %query, received, kept = results.len(), "Search results ranked");
                results_tx.send_replace(RankedResultSet { query, results });
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Search failed");
                let _ = failures_tx.send(SearchFailure {
                    query,
                    error: Arc::new(e),
                });
            }
        }
    }

    tracing::info!("Search worker stopping");
}
