//! Send-rate gate for outbound search queries.
//!
//! The first query after an idle period goes out immediately. Anything
//! arriving before `interval` has elapsed waits for the remainder, and
//! since the ranker only ever reads the latest pending query at that
//! point, intermediate keystrokes coalesce into one trailing request.

use std::time::Duration;

use tokio::time::Instant;

/// Leading and trailing edge throttle.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to wait at `now` before the next send is allowed.
    pub fn delay(&self, now: Instant) -> Duration {
        match self.last_sent {
            Some(last) => (last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Record that a request went out at `now`.
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// Sleep until sending is allowed. Does not record a send; callers
    /// that go on to send must call [`mark_sent`](Self::mark_sent).
    pub async fn ready(&self) {
        let wait = self.delay(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}
