use sqlx::SqlitePool;
use std::sync::Arc;

use whoknows::config::AppConfig;
use whoknows::metrics::Metrics;
use whoknows::search::{EnrichmentSource, ResultStore, SearchFlags, SearchService, WikipediaClient};
use whoknows::weather::WeatherClient;

use crate::views::Views;

/// Shared application state / 应用共享状态
pub struct AppState {
    pub db: SqlitePool,
    pub search: SearchService,
    pub weather: WeatherClient,
    pub views: Views,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire every collaborator from config, with Wikipedia as the enrichment source
    pub fn from_config(db: SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let source: Arc<dyn EnrichmentSource> = Arc::new(WikipediaClient::new(&config.wikipedia)?);
        Self::with_source(db, config, source)
    }

    pub fn with_source(
        db: SqlitePool,
        config: AppConfig,
        source: Arc<dyn EnrichmentSource>,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let flags = Arc::new(SearchFlags::from_config(&config.search));
        let search = SearchService::new(
            ResultStore::new(db.clone()),
            source,
            flags,
            metrics.clone(),
            config.search.clone(),
            config.wikipedia.result_limit,
        );
        let weather = WeatherClient::new(&config.weather)?;
        let views = Views::new()?;

        Ok(Self {
            db,
            search,
            weather,
            views,
            metrics,
        })
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use whoknows::models::{ExternalItem, NewPage};
    use whoknows::search::EnrichmentError;

    /// Enrichment source returning canned items and counting calls
    pub struct StubSource {
        pub calls: AtomicUsize,
        pub items: Vec<ExternalItem>,
    }

    impl StubSource {
        pub fn new(n: usize) -> Arc<Self> {
            let items = (1..=n)
                .map(|i| ExternalItem {
                    title: format!("Wiki {}", i),
                    url: format!("https://en.wikipedia.org/?curid={}", i),
                    snippet: format!("<span class=\"searchmatch\">wiki</span> {}", i),
                })
                .collect();
            Arc::new(Self { calls: AtomicUsize::new(0), items })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EnrichmentSource for StubSource {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<ExternalItem>, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.iter().take(limit).cloned().collect())
        }
    }

    pub async fn test_state(source: Arc<StubSource>, config: AppConfig) -> Arc<AppState> {
        let db = whoknows::db::connect_in_memory().await.unwrap();
        whoknows::db::run_migrations(&db).await.unwrap();
        whoknows::db::insert_pages(
            &db,
            &[NewPage {
                title: "Welcome".to_string(),
                url: "/welcome".to_string(),
                language: "en".to_string(),
                last_updated: None,
                content: "Welcome to the search engine".to_string(),
            }],
        )
        .await
        .unwrap();
        Arc::new(AppState::with_source(db, config, source).unwrap())
    }
}
