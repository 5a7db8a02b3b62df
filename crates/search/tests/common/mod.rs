use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use plexsync_core::search::SearchResult;
use plexsync_search::{ApiError, DownloadResponse, MediaBackend};

/// In-memory backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    results: HashMap<String, Vec<SearchResult>>,
    failing: HashSet<String>,
    latency: Duration,
    searches: Mutex<Vec<(String, Instant)>>,
    downloads: Mutex<Vec<(String, bool)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, results: Vec<SearchResult>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    /// Searches for `query`, and downloads of a key equal to `query`, fail
    /// with a 500.
    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queries in the order they were sent.
    pub fn queries(&self) -> Vec<String> {
        self.searches
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }

    pub fn search_times(&self) -> Vec<Instant> {
        self.searches.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn downloads(&self) -> Vec<(String, bool)> {
        self.downloads.lock().unwrap().clone()
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            body: "internal error".into(),
        }
    }
}

#[async_trait::async_trait]
impl MediaBackend for FakeBackend {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.searches
            .lock()
            .unwrap()
            .push((query.to_string(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(query) {
            return Err(Self::server_error());
        }
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }

    async fn download(&self, key: &str, persist: bool) -> Result<DownloadResponse, ApiError> {
        self.downloads
            .lock()
            .unwrap()
            .push((key.to_string(), persist));

        if self.failing.contains(key) {
            return Err(Self::server_error());
        }
        Ok(DownloadResponse {
            log: format!("Queued {key}"),
        })
    }
}

pub fn result(title: &str, similarity: f64) -> SearchResult {
    SearchResult {
        media_type: "movie".into(),
        key: title.to_lowercase().replace(' ', "-"),
        title: title.into(),
        lowercase_title: String::new(),
        parent_title: String::new(),
        grandparent_title: String::new(),
        similarity,
    }
}

pub fn titles(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.title.as_str()).collect()
}
