//! Media search and download triggers.
//!
//! [`api::MediaApi`] talks to the backend's search and download endpoints.
//! [`ranker::SearchRanker`] sits between free-text input and that API: it
//! throttles outbound queries, ranks each response client-side, and
//! publishes the ranked set for the UI.

pub mod api;
pub mod backend;
pub mod ranker;
pub mod throttle;

pub use api::{ApiError, DownloadResponse, MediaApi};
pub use backend::MediaBackend;
pub use ranker::{RankedResultSet, SearchFailure, SearchRanker};
pub use throttle::Throttle;
