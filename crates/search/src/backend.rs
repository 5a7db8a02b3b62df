//! Backend seam for the ranker.

use plexsync_core::search::SearchResult;

use crate::api::{ApiError, DownloadResponse, MediaApi};

/// The search and download operations the [`SearchRanker`](crate::ranker::SearchRanker)
/// depends on.
#[async_trait::async_trait]
pub trait MediaBackend: Send + Sync + 'static {
    /// Raw, unranked search results for `query`.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError>;

    /// Trigger a download of `key`; `persist` also subscribes to future items.
    async fn download(&self, key: &str, persist: bool) -> Result<DownloadResponse, ApiError>;
}

#[async_trait::async_trait]
impl MediaBackend for MediaApi {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        MediaApi::search(self, query).await
    }

    async fn download(&self, key: &str, persist: bool) -> Result<DownloadResponse, ApiError> {
        MediaApi::download(self, key, persist).await
    }
}
