//! Per-job download progress table.
//!
//! Reconstructs the state of every download job seen this session from an
//! unordered stream of partial updates. Each job moves through
//! `queued -> downloading -> complete`; `complete` is terminal and pins the
//! byte counters to a full ratio no matter what arrives afterwards.
//!
//! Updates are last-write-wins. An out-of-order `update` can move the
//! displayed byte count backwards; that staleness is accepted and bounded
//! by the next update or the final `complete`.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{JobKey, Timestamp};

/// Counters written to a job that completes without ever being sized.
const UNSIZED_COMPLETE_BYTES: u64 = 100;

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// Lifecycle state of a known job. Jobs absent from the table are "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Seen, but the server has not reported a size yet.
    Queued,
    /// Sized and transferring.
    Downloading,
    /// Finished. Terminal.
    Complete,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Downloading => "downloading",
            JobState::Complete => "complete",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobProgress
// ---------------------------------------------------------------------------

/// Progress of a single download job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    /// Job key (the display title).
    pub title: JobKey,
    /// Bytes transferred so far, verbatim from the latest envelope.
    pub bytes_downloaded: u64,
    /// Expected size in bytes. `0` means not sized yet.
    pub total_bytes: u64,
    /// Set once a completion envelope arrives; never cleared.
    pub complete: bool,
    /// When the entry last changed.
    pub updated_at: Timestamp,
    /// When the entry first became complete.
    pub completed_at: Option<Timestamp>,
}

impl JobProgress {
    fn new(title: &str, now: Timestamp) -> Self {
        Self {
            title: title.to_string(),
            bytes_downloaded: 0,
            total_bytes: 0,
            complete: false,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Current lifecycle state derived from the counters.
    pub fn state(&self) -> JobState {
        if self.complete {
            JobState::Complete
        } else if self.total_bytes == 0 {
            JobState::Queued
        } else {
            JobState::Downloading
        }
    }

    /// Completion percentage rounded to one decimal place.
    ///
    /// Complete jobs are exactly 100. Jobs with nothing transferred, or
    /// without a known size, are exactly 0.
    pub fn percent(&self) -> f64 {
        if self.complete {
            return 100.0;
        }
        if self.bytes_downloaded == 0 || self.total_bytes == 0 {
            return 0.0;
        }
        let ratio = self.bytes_downloaded as f64 / self.total_bytes as f64;
        round_one_decimal(ratio * 100.0)
    }

    /// Short display label: `queued`, or the percentage in parentheses.
    pub fn label(&self) -> String {
        let percent = self.percent();
        if !self.complete && percent == 0.0 {
            return JobState::Queued.as_str().to_string();
        }
        format!("({}%)", format_percent(percent))
    }
}

/// Round half-up to one decimal, nudged by `EPSILON` so values such as
/// `1.005` land on the expected side.
fn round_one_decimal(value: f64) -> f64 {
    ((value + f64::EPSILON) * 10.0).round() / 10.0
}

/// Whole numbers print without a decimal point.
fn format_percent(percent: f64) -> String {
    if percent.fract() == 0.0 {
        format!("{percent:.0}")
    } else {
        format!("{percent:.1}")
    }
}

// ---------------------------------------------------------------------------
// ProgressTable
// ---------------------------------------------------------------------------

/// What applying one envelope did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The entry was created or mutated.
    Applied {
        previous: Option<JobState>,
        current: JobState,
    },
    /// The job is already complete; the transfer update was dropped.
    IgnoredComplete,
}

/// Table of every job seen this session, in first-seen order.
///
/// Entries are only removed through [`prune_completed`](Self::prune_completed).
#[derive(Debug, Clone, Default)]
pub struct ProgressTable {
    entries: Vec<JobProgress>,
    index: HashMap<JobKey, usize>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `start` or `update` envelope.
    ///
    /// Byte counts are recorded verbatim. A zero `total_bytes` keeps the
    /// job queued. Complete jobs are left untouched.
    pub fn record_transfer(
        &mut self,
        title: &str,
        bytes_downloaded: u64,
        total_bytes: u64,
        now: Timestamp,
    ) -> ApplyOutcome {
        let (entry, previous) = self.entry_mut(title, now);
        if entry.complete {
            return ApplyOutcome::IgnoredComplete;
        }

        entry.bytes_downloaded = bytes_downloaded;
        entry.total_bytes = total_bytes;
        entry.updated_at = now;

        ApplyOutcome::Applied {
            previous,
            current: entry.state(),
        }
    }

    /// Apply a `complete` envelope. Creates the entry if it was never seen.
    ///
    /// The byte counts are pinned to a full ratio. A job that was never
    /// sized reads `100/100`.
    pub fn record_complete(&mut self, title: &str, now: Timestamp) -> ApplyOutcome {
        let (entry, previous) = self.entry_mut(title, now);

        if entry.total_bytes == 0 {
            entry.total_bytes = UNSIZED_COMPLETE_BYTES;
        }
        entry.bytes_downloaded = entry.total_bytes;
        entry.complete = true;
        entry.updated_at = now;
        entry.completed_at.get_or_insert(now);

        ApplyOutcome::Applied {
            previous,
            current: JobState::Complete,
        }
    }

    pub fn get(&self, title: &str) -> Option<&JobProgress> {
        self.index.get(title).map(|&i| &self.entries[i])
    }

    /// State of a job, or `None` while it is still unknown.
    pub fn state_of(&self, title: &str) -> Option<JobState> {
        self.get(title).map(JobProgress::state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobProgress> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of every entry, in first-seen order.
    pub fn snapshot(&self) -> Vec<JobProgress> {
        self.entries.clone()
    }

    /// Drop complete entries that finished before `cutoff`.
    ///
    /// Returns the number of entries removed. Incomplete jobs are kept
    /// regardless of age.
    pub fn prune_completed(&mut self, cutoff: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|job| !matches!(job.completed_at, Some(done) if done < cutoff));

        let removed = before - self.entries.len();
        if removed > 0 {
            self.rebuild_index();
        }
        removed
    }

    // ---- private helpers ----

    fn entry_mut(&mut self, title: &str, now: Timestamp) -> (&mut JobProgress, Option<JobState>) {
        match self.index.get(title) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                let previous = Some(entry.state());
                (entry, previous)
            }
            None => {
                let i = self.entries.len();
                self.entries.push(JobProgress::new(title, now));
                self.index.insert(title.to_string(), i);
                (&mut self.entries[i], None)
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, job)| (job.title.clone(), i))
            .collect();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
