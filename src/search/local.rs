//! Local page lookup / 本地页面查询
//!
//! Two strategies over the `pages` table:
//! - substring: Unicode-lowercased containment on title or content, newest first
//! - full-text: FTS5 `MATCH` ranked by bm25, with substring as the fallback

use futures::TryStreamExt;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::error::SearchError;
use crate::metrics::Metrics;
use crate::models::SearchResult;

#[derive(Debug, sqlx::FromRow)]
struct PageHit {
    id: i64,
    title: String,
    url: String,
    language: String,
    content: String,
}

/// Which strategy produced the local results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalMode {
    Substring,
    FullText,
}

#[derive(Debug)]
pub struct LocalOutcome {
    pub results: Vec<SearchResult>,
    pub mode: LocalMode,
    /// Set when full-text was requested but substring answered
    pub fallback: Option<String>,
}

pub struct LocalQueryEngine {
    db: SqlitePool,
    snippet_chars: usize,
    metrics: Arc<Metrics>,
}

impl LocalQueryEngine {
    pub fn new(db: SqlitePool, snippet_chars: usize, metrics: Arc<Metrics>) -> Self {
        Self { db, snippet_chars, metrics }
    }

    /// Run one lookup. `full_text` selects the ranked strategy; any failure in
    /// it is absorbed by retrying once in substring mode.
    pub async fn search(
        &self,
        query: &str,
        language: &str,
        limit: usize,
        full_text: bool,
    ) -> Result<LocalOutcome, SearchError> {
        if !full_text {
            let results = self.substring(query, language, limit).await?;
            return Ok(LocalOutcome { results, mode: LocalMode::Substring, fallback: None });
        }

        match self.ranked(query, language, limit).await {
            Ok(results) => Ok(LocalOutcome { results, mode: LocalMode::FullText, fallback: None }),
            Err(e) => {
                tracing::warn!(query = %query, language = %language, error = %e, "Full-text search failed, falling back to substring");
                self.metrics.record_fulltext_fallback();
                let results = self.substring(query, language, limit).await?;
                Ok(LocalOutcome {
                    results,
                    mode: LocalMode::Substring,
                    fallback: Some(e.to_string()),
                })
            }
        }
    }

    /// SQLite `LIKE` only folds ASCII, so matching happens here. Rows arrive
    /// already in display order and the scan stops once `limit` are found.
    async fn substring(&self, query: &str, language: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        let needle = query.to_lowercase();
        let mut rows = sqlx::query_as::<_, PageHit>(
            r#"
            SELECT id, title, url, language, content
            FROM pages
            WHERE language = ?
            ORDER BY last_updated IS NULL, last_updated DESC, id DESC
            "#,
        )
        .bind(language)
        .fetch(&self.db);

        let mut results = Vec::new();
        while results.len() < limit {
            let Some(hit) = rows.try_next().await? else {
                break;
            };
            if contains_folded(&hit.title, &needle) || contains_folded(&hit.content, &needle) {
                results.push(self.to_result(hit));
            }
        }
        Ok(results)
    }

    async fn ranked(&self, query: &str, language: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        let expr = fts_expression(query);
        if expr.is_empty() {
            return Err(SearchError::FullText("query has no searchable terms".to_string()));
        }

        let rows = sqlx::query_as::<_, PageHit>(
            r#"
            SELECT p.id, p.title, p.url, p.language, p.content
            FROM pages_fts
            JOIN pages p ON p.id = pages_fts.rowid
            WHERE pages_fts MATCH ? AND p.language = ?
            ORDER BY bm25(pages_fts) ASC, p.id DESC
            LIMIT ?
            "#,
        )
        .bind(&expr)
        .bind(language)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await
        .map_err(|e| SearchError::FullText(e.to_string()))?;

        Ok(rows.into_iter().map(|r| self.to_result(r)).collect())
    }

    fn to_result(&self, hit: PageHit) -> SearchResult {
        SearchResult {
            id: hit.id,
            title: hit.title,
            url: hit.url,
            language: hit.language,
            description: truncate_chars(&hit.content, self.snippet_chars),
        }
    }
}

/// `needle` must already be lowercased
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Quote every whitespace separated term so user input cannot inject FTS5
/// operators. Terms are ANDed.
fn fts_expression(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
