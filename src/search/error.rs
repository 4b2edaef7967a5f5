use std::fmt;

use thiserror::Error;

/// Failures inside the search pipeline. None of these reach the end user;
/// the orchestrator turns them into [`SearchWarning`]s.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("full-text query failed: {0}")]
    FullText(String),
}

/// Best-effort degradation that happened while answering one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchWarning {
    /// Local phase exceeded its timeout; local results are empty
    LocalTimeout,
    /// Local phase failed; local results are empty
    LocalFailed(String),
    /// Full-text mode failed and substring mode answered instead
    FullTextFallback(String),
    /// Enrichment source call failed; cached rows (if any) are still used
    EnrichmentFailed(String),
    CacheReadFailed(String),
    CacheWriteFailed(String),
    /// Request budget spent before the enrichment phase
    DeadlineExceeded,
}

impl fmt::Display for SearchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchWarning::LocalTimeout => write!(f, "local search timed out"),
            SearchWarning::LocalFailed(e) => write!(f, "local search failed: {}", e),
            SearchWarning::FullTextFallback(e) => write!(f, "full-text search fell back to substring: {}", e),
            SearchWarning::EnrichmentFailed(e) => write!(f, "enrichment failed: {}", e),
            SearchWarning::CacheReadFailed(e) => write!(f, "enrichment cache read failed: {}", e),
            SearchWarning::CacheWriteFailed(e) => write!(f, "enrichment cache write failed: {}", e),
            SearchWarning::DeadlineExceeded => write!(f, "request deadline exceeded before enrichment"),
        }
    }
}
