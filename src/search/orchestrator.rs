//! Search pipeline / 搜索流程
//!
//! validate -> local phase (timeout) -> enrichment phase (page surface,
//! flag on, budget left) -> merge local first -> cap -> metrics.
//!
//! Only an unusable database pool is returned as an error. Every other
//! failure degrades the result set and is reported as a [`SearchWarning`].

use std::sync::Arc;
use std::time::Instant;

use super::error::{SearchError, SearchWarning};
use super::flags::SearchFlags;
use super::local::LocalQueryEngine;
use super::store::ResultStore;
use super::wikipedia::EnrichmentSource;
use crate::config::SearchConfig;
use crate::metrics::Metrics;
use crate::models::SearchResult;

/// Who is asking. The page favors completeness, the API small payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSurface {
    Page,
    Api,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The query exactly as submitted
    pub query: String,
    pub language: String,
    pub results: Vec<SearchResult>,
    pub warnings: Vec<SearchWarning>,
}

pub struct SearchService {
    local: LocalQueryEngine,
    store: ResultStore,
    source: Arc<dyn EnrichmentSource>,
    flags: Arc<SearchFlags>,
    metrics: Arc<Metrics>,
    settings: SearchConfig,
    enrichment_limit: usize,
}

impl SearchService {
    pub fn new(
        store: ResultStore,
        source: Arc<dyn EnrichmentSource>,
        flags: Arc<SearchFlags>,
        metrics: Arc<Metrics>,
        settings: SearchConfig,
        enrichment_limit: usize,
    ) -> Self {
        let local = LocalQueryEngine::new(store.pool().clone(), settings.snippet_chars, metrics.clone());
        Self {
            local,
            store,
            source,
            flags,
            metrics,
            settings,
            enrichment_limit,
        }
    }

    pub fn flags(&self) -> &SearchFlags {
        &self.flags
    }

    pub fn limit_for(&self, surface: SearchSurface) -> usize {
        match surface {
            SearchSurface::Page => self.settings.page_limit,
            SearchSurface::Api => self.settings.api_limit,
        }
    }

    /// Missing or blank language means the configured default
    pub fn resolve_language(&self, language: Option<&str>) -> String {
        language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.settings.default_language.as_str())
            .to_string()
    }

    pub async fn search(
        &self,
        query: &str,
        language: Option<&str>,
        surface: SearchSurface,
    ) -> Result<SearchOutcome, SearchError> {
        let language = self.resolve_language(language);
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(SearchOutcome {
                query: query.to_string(),
                language,
                results: Vec::new(),
                warnings: Vec::new(),
            });
        }

        if self.store.pool().is_closed() {
            return Err(SearchError::Store(sqlx::Error::PoolClosed));
        }

        let started = Instant::now();
        let deadline = started + self.settings.request_budget();
        let limit = self.limit_for(surface);
        let mut warnings = Vec::new();

        let (mut results, warning) = self.local_phase(trimmed, &language, limit).await;
        warnings.extend(warning);

        if surface == SearchSurface::Page && self.flags.enrichment_enabled() {
            if Instant::now() >= deadline {
                tracing::warn!(query = %trimmed, language = %language, "Request budget spent, skipping enrichment");
                warnings.push(SearchWarning::DeadlineExceeded);
            } else {
                let (external, enrichment_warnings) = self.enrichment_phase(trimmed, &language).await;
                results.extend(external);
                warnings.extend(enrichment_warnings);
            }
        }

        results.truncate(limit);
        self.metrics.record_search(started.elapsed(), results.len());

        Ok(SearchOutcome {
            query: query.to_string(),
            language,
            results,
            warnings,
        })
    }

    async fn local_phase(
        &self,
        query: &str,
        language: &str,
        limit: usize,
    ) -> (Vec<SearchResult>, Option<SearchWarning>) {
        let timeout = self.settings.local_timeout();
        let lookup = self
            .local
            .search(query, language, limit, self.flags.full_text_enabled());

        match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(outcome)) => (outcome.results, outcome.fallback.map(SearchWarning::FullTextFallback)),
            Ok(Err(e)) => {
                tracing::warn!(query = %query, language = %language, error = %e, "Local search failed");
                self.metrics.record_local_failure();
                (Vec::new(), Some(SearchWarning::LocalFailed(e.to_string())))
            }
            Err(_) => {
                tracing::warn!(query = %query, language = %language, timeout = ?timeout, "Local search timed out");
                self.metrics.record_local_failure();
                (Vec::new(), Some(SearchWarning::LocalTimeout))
            }
        }
    }

    /// Ensure the cache holds the pair, then read it back. Items fetched in
    /// this request are used directly when the cache cannot supply them.
    async fn enrichment_phase(&self, query: &str, language: &str) -> (Vec<SearchResult>, Vec<SearchWarning>) {
        let mut warnings = Vec::new();

        if let Some(ttl) = self.settings.external_cache_ttl() {
            match self.store.purge_stale_external(query, language, ttl).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(query = %query, language = %language, purged = n, "Purged stale enrichment rows"),
                Err(e) => {
                    tracing::warn!(query = %query, language = %language, error = %e, "Failed to purge stale enrichment rows");
                    warnings.push(SearchWarning::CacheWriteFailed(e.to_string()));
                }
            }
        }

        let cached = match self.store.exists_external(query, language).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(query = %query, language = %language, error = %e, "Enrichment cache lookup failed");
                warnings.push(SearchWarning::CacheReadFailed(e.to_string()));
                false
            }
        };

        let mut fetched = Vec::new();
        if cached {
            self.metrics.record_cache_hit();
        } else {
            self.metrics.record_cache_miss();
            match self.source.search(query, self.enrichment_limit).await {
                Ok(items) => {
                    if let Err(e) = self.store.insert_external(query, language, &items).await {
                        tracing::warn!(query = %query, language = %language, error = %e, "Failed to cache enrichment results");
                        warnings.push(SearchWarning::CacheWriteFailed(e.to_string()));
                    }
                    fetched = items;
                }
                Err(e) => {
                    tracing::warn!(query = %query, language = %language, error = %e, "Enrichment source failed");
                    self.metrics.record_enrichment_error();
                    warnings.push(SearchWarning::EnrichmentFailed(e.to_string()));
                }
            }
        }

        let mut results: Vec<SearchResult> = match self.store.get_external(query, language).await {
            Ok(rows) => rows.into_iter().map(SearchResult::from).collect(),
            Err(e) => {
                tracing::warn!(query = %query, language = %language, error = %e, "Failed to read enrichment cache");
                warnings.push(SearchWarning::CacheReadFailed(e.to_string()));
                Vec::new()
            }
        };

        for item in fetched {
            if !results.iter().any(|r| r.url == item.url) {
                results.push(SearchResult::from_external(item, language));
            }
        }

        (results, warnings)
    }
}
