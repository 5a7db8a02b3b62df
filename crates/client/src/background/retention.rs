//! Periodic eviction of completed download jobs.
//!
//! Only spawned when `PLEXSYNC_COMPLETED_TTL_SECS` is set. Runs on a fixed
//! interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use plexsync_realtime::ProgressTracker;
use tokio_util::sync::CancellationToken;

/// Upper bound on the sweep period, so short TTLs are honoured promptly.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How often to sweep for a given TTL.
pub fn sweep_interval(ttl: Duration) -> Duration {
    ttl.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL)
}

/// Run the retention loop.
///
/// Removes jobs that completed more than `ttl` ago. Runs until `cancel` is
/// triggered.
pub async fn run(tracker: Arc<ProgressTracker>, ttl: Duration, cancel: CancellationToken) {
    let period = sweep_interval(ttl);
    let ttl_chrono = match chrono::Duration::from_std(ttl) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, ttl_secs = ttl.as_secs(), "Completed-job retention disabled: TTL out of range");
            return;
        }
    };

    tracing::info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = period.as_secs(),
        "Completed-job retention started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Completed-job retention stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - ttl_chrono;
                let removed = tracker.prune_completed(cutoff);
                if removed > 0 {
                    tracing::info!(removed, "Retention: dropped completed jobs");
                } else {
                    tracing::debug!("Retention: nothing to drop");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_is_clamped() {
        assert_eq!(sweep_interval(Duration::ZERO), Duration::from_secs(1));
        assert_eq!(sweep_interval(Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(sweep_interval(Duration::from_secs(86_400)), MAX_SWEEP_INTERVAL);
    }
}
