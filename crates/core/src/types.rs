/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Jobs are keyed by their display title.
///
/// The realtime message schema carries no other stable identifier, so two
/// distinct jobs sharing a title collapse into one entry.
pub type JobKey = String;
