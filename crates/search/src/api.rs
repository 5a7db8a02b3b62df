//! REST client for the media backend.
//!
//! Wraps the search and download endpoints using [`reqwest`]. Responses
//! are returned as-is apart from [`SearchResult::normalized`]; ranking is
//! the caller's job.

use plexsync_core::search::SearchResult;
use reqwest::Url;
use serde::Deserialize;

/// HTTP client for one media backend.
#[derive(Debug, Clone)]
pub struct MediaApi {
    client: reqwest::Client,
    api_root: Url,
}

/// Body returned by the download endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DownloadResponse {
    /// Human-readable status text, shown to the user verbatim.
    pub log: String,
}

/// Errors from the media REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Media API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The configured API root cannot be used to build request URLs.
    #[error("Invalid API root: {0}")]
    InvalidUrl(String),
}

impl MediaApi {
    /// Create a client for the backend at `api_root`, e.g.
    /// `http://localhost:8080`.
    pub fn new(api_root: &str) -> Result<Self, ApiError> {
        Self::with_client(reqwest::Client::new(), api_root)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_root: &str) -> Result<Self, ApiError> {
        let api_root =
            Url::parse(api_root).map_err(|e| ApiError::InvalidUrl(format!("{api_root}: {e}")))?;

        if !matches!(api_root.scheme(), "http" | "https") || api_root.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!(
                "{api_root}: expected an http(s) base URL"
            )));
        }

        Ok(Self { client, api_root })
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// `GET /api/search?q=<query>`.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let url = self.search_url(query)?;
        tracing::debug!(%url, "Searching media");

        let response = self.client.get(url).send().await?;
        let results: Vec<SearchResult> = Self::parse_response(response).await?;

        Ok(results.into_iter().map(SearchResult::normalized).collect())
    }

    /// `POST /api/media/{key}/download`, with `persist=true` to also fetch
    /// future items of a show.
    pub async fn download(&self, key: &str, persist: bool) -> Result<DownloadResponse, ApiError> {
        let url = self.download_url(key, persist)?;
        tracing::debug!(%url, persist, "Requesting download");

        let response = self.client.post(url).send().await?;
        Self::parse_response(response).await
    }

    /// URL for a search request. The query is percent-encoded.
    pub fn search_url(&self, query: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["api", "search"])?;
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }

    /// URL for a download request. The key is encoded as one path segment.
    pub fn download_url(&self, key: &str, persist: bool) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["api", "media", key, "download"])?;
        if persist {
            url.query_pairs_mut().append_pair("persist", "true");
        }
        Ok(url)
    }

    // ---- private helpers ----

    /// Append `segments` to the API root's path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.api_root.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.api_root.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ensure the response has a success status code, returning a
    /// [`ApiError::Status`] with the body text otherwise.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn api(root: &str) -> MediaApi {
        MediaApi::new(root).unwrap()
    }

    #[test]
    fn search_url_encodes_query() {
        let url = api("http://localhost:8080").search_url("the office & co").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/search?q=the+office+%26+co"
        );
    }

    #[test]
    fn download_url_with_and_without_persist() {
        let api = api("http://localhost:8080/");
        assert_eq!(
            api.download_url("42", false).unwrap().as_str(),
            "http://localhost:8080/api/media/42/download"
        );
        assert_eq!(
            api.download_url("42", true).unwrap().as_str(),
            "http://localhost:8080/api/media/42/download?persist=true"
        );
    }

    #[test]
    fn key_is_a_single_path_segment() {
        let url = api("http://h").download_url("a/b", false).unwrap();
        assert_eq!(url.as_str(), "http://h/api/media/a%2Fb/download");
    }

    #[test]
    fn root_with_path_prefix_is_kept() {
        let url = api("https://h/plex/").search_url("x").unwrap();
        assert_eq!(url.as_str(), "https://h/plex/api/search?q=x");
    }

    #[test]
    fn rejects_unusable_roots() {
        assert_matches!(MediaApi::new("not a url"), Err(ApiError::InvalidUrl(_)));
        assert_matches!(MediaApi::new("ws://h"), Err(ApiError::InvalidUrl(_)));
        assert_matches!(MediaApi::new("mailto:me@h"), Err(ApiError::InvalidUrl(_)));

        let err = MediaApi::new("").unwrap_err();
        assert!(err.to_string().starts_with("Invalid API root"), "{err}");
    }

    #[test]
    fn api_debug_names_root() {
        let api = MediaApi::new("http://media.local:8080").unwrap();
        assert!(format!("{api:?}").contains("media.local"));
    }

    #[test]
    fn download_response_reads_log_field() {
        let resp: DownloadResponse = serde_json::from_str(r#"{"Log":"Queued Foo"}"#).unwrap();
        assert_eq!(resp.log, "Queued Foo");
    }
}
