//! Search result model and client-side relevance ranking.
//!
//! The search endpoint returns loosely ordered candidates with a
//! similarity score. [`rank`] filters and re-orders them so that titles
//! starting with the query always come first.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Results that match neither by prefix nor substring are kept only when
/// their similarity is strictly above this value.
pub const MIN_SIMILARITY: f64 = 0.4;

// ---------------------------------------------------------------------------
// Media kind
// ---------------------------------------------------------------------------

/// Wire value of the `Type` tag for movies.
pub const MEDIA_TYPE_MOVIE: &str = "movie";

/// Wire value of the `Type` tag for shows.
pub const MEDIA_TYPE_SHOW: &str = "show";

/// Kind of media a search result refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Movie,
    Show,
    Other(String),
}

impl MediaKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            MEDIA_TYPE_MOVIE => MediaKind::Movie,
            MEDIA_TYPE_SHOW => MediaKind::Show,
            other => MediaKind::Other(other.to_string()),
        }
    }

    /// Only shows can subscribe to future episodes.
    pub fn supports_persist(&self) -> bool {
        matches!(self, MediaKind::Show)
    }
}

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// A single candidate returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResult {
    /// Type tag (`movie`, `show`, or anything else the server sends).
    #[serde(rename = "Type")]
    pub media_type: String,
    /// Identifier used to trigger downloads.
    pub key: String,
    pub title: String,
    /// Lowercased title used for matching. Filled from `title` when absent.
    #[serde(default)]
    pub lowercase_title: String,
    #[serde(default)]
    pub parent_title: String,
    #[serde(default)]
    pub grandparent_title: String,
    /// Server-side similarity in `[0, 1]`.
    pub similarity: f64,
}

impl SearchResult {
    pub fn kind(&self) -> MediaKind {
        MediaKind::parse(&self.media_type)
    }

    /// Derive `lowercase_title` when the server left it empty.
    pub fn normalized(mut self) -> Self {
        if self.lowercase_title.is_empty() {
            self.lowercase_title = self.title.to_lowercase();
        }
        self
    }

    fn starts_with(&self, query: &str) -> bool {
        self.lowercase_title.starts_with(query)
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Whether a result survives filtering for an already-lowercased query.
///
/// Kept when the title starts with or contains the query, or when the
/// similarity is above [`MIN_SIMILARITY`].
pub fn is_relevant(result: &SearchResult, query: &str) -> bool {
    result.starts_with(query)
        || result.lowercase_title.contains(query)
        || result.similarity > MIN_SIMILARITY
}

/// Ordering for an already-lowercased query.
///
/// Prefix matches sort before everything else; within the same tier the
/// higher similarity wins. Equivalent to sorting by the key
/// `(not prefix, descending similarity)`, so it is a total order.
pub fn compare(a: &SearchResult, b: &SearchResult, query: &str) -> Ordering {
    let a_prefix = a.starts_with(query);
    let b_prefix = b.starts_with(query);

    match (a_prefix, b_prefix) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.similarity.total_cmp(&a.similarity),
    }
}

/// Filter and order raw search results for `query`.
///
/// The sort is stable, so results that compare equal keep the server's
/// order.
pub fn rank(query: &str, results: Vec<SearchResult>) -> Vec<SearchResult> {
    let query = query.to_lowercase();

    let mut ranked: Vec<SearchResult> = results
        .into_iter()
        .map(SearchResult::normalized)
        .filter(|r| is_relevant(r, &query))
        .collect();

    ranked.sort_by(|a, b| compare(a, b, &query));
    ranked
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
