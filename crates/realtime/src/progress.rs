//! Download progress aggregation over the dispatcher.
//!
//! [`ProgressTracker`] is the only writer of the job progress table. It
//! subscribes to the three download envelope kinds and republishes a
//! snapshot of the whole table on a `watch` channel after every change, so
//! a UI can redraw without holding the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use plexsync_core::progress::{ApplyOutcome, JobProgress, ProgressTable};
use plexsync_core::types::Timestamp;
use tokio::sync::watch;

use crate::dispatcher::{Dispatcher, SubscriptionToken};
use crate::messages::{Envelope, MessageKind};

/// Owner of the job progress table.
pub struct ProgressTracker {
    table: Mutex<ProgressTable>,
    snapshot_tx: watch::Sender<Vec<JobProgress>>,
}

impl ProgressTracker {
    /// Create an empty tracker, shared via `Arc` so dispatcher handlers can
    /// hold on to it.
    pub fn new() -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Arc::new(Self {
            table: Mutex::new(ProgressTable::new()),
            snapshot_tx,
        })
    }

    /// Subscribe to every download envelope kind on `dispatcher`.
    ///
    /// Keep the returned tokens to [`detach`](Self::detach) on teardown.
    pub fn attach(self: &Arc<Self>, dispatcher: &mut Dispatcher) -> Vec<SubscriptionToken> {
        MessageKind::ALL
            .into_iter()
            .map(|kind| {
                let tracker = Arc::clone(self);
                dispatcher.subscribe_message(kind, move |envelope| {
                    tracker.apply(envelope);
                    Ok(())
                })
            })
            .collect()
    }

    /// Remove the subscriptions created by [`attach`](Self::attach).
    pub fn detach(dispatcher: &mut Dispatcher, tokens: &[SubscriptionToken]) {
        for &token in tokens {
            dispatcher.unsubscribe(token);
        }
    }

    /// Apply one envelope to the table and publish the new snapshot.
    pub fn apply(&self, envelope: &Envelope) -> ApplyOutcome {
        let now = Utc::now();
        let mut table = self.lock();

        let outcome = match envelope {
            Envelope::DownloadStart(data) | Envelope::DownloadUpdate(data) => {
                table.record_transfer(&data.title, data.bytes_downloaded, data.total_bytes, now)
            }
            Envelope::DownloadComplete(data) => table.record_complete(&data.title, now),
        };

        match outcome {
            ApplyOutcome::IgnoredComplete => {
                tracing::debug!(
                    title = %envelope.title(),
                    kind = %envelope.kind(),
                    "Ignoring update for completed job",
                );
            }
            ApplyOutcome::Applied { previous, current } if previous != Some(current) => {
                tracing::info!(
                    title = %envelope.title(),
                    from = previous.map(|s| s.as_str()).unwrap_or("unknown"),
                    to = %current,
                    "Download job state changed",
                );
            }
            ApplyOutcome::Applied { .. } => {
                tracing::trace!(title = %envelope.title(), "Download progress");
            }
        }

        self.snapshot_tx.send_replace(table.snapshot());
        outcome
    }

    /// Drop completed jobs that finished before `cutoff`. Returns how many
    /// were removed.
    pub fn prune_completed(&self, cutoff: Timestamp) -> usize {
        let mut table = self.lock();
        let removed = table.prune_completed(cutoff);
        if removed > 0 {
            self.snapshot_tx.send_replace(table.snapshot());
        }
        removed
    }

    /// Current table contents in first-seen order.
    pub fn snapshot(&self) -> Vec<JobProgress> {
        self.lock().snapshot()
    }

    pub fn get(&self, title: &str) -> Option<JobProgress> {
        self.lock().get(title).cloned()
    }

    /// Receiver that sees a fresh snapshot after every change.
    pub fn watch(&self) -> watch::Receiver<Vec<JobProgress>> {
        self.snapshot_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressTable> {
        // The table stays consistent between statements, so a panic elsewhere
        // does not invalidate it.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
