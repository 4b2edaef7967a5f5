//! Enrichment cache access / 外部结果缓存
//!
//! `external_results` is keyed by (query, language, url). Inserts are
//! idempotent: a duplicate triple is skipped by SQLite, never reported.

use sqlx::SqlitePool;
use std::time::Duration;

use crate::models::{ExternalItem, ExternalResult};

#[derive(Clone)]
pub struct ResultStore {
    db: SqlitePool,
}

impl ResultStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// True iff at least one cached row matches both fields exactly
    pub async fn exists_external(&self, query: &str, language: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM external_results WHERE query = ? AND language = ?",
        )
        .bind(query)
        .bind(language)
        .fetch_one(&self.db)
        .await?;
        Ok(count > 0)
    }

    /// Bulk insert; returns how many rows were new
    pub async fn insert_external(
        &self,
        query: &str,
        language: &str,
        items: &[ExternalItem],
    ) -> Result<u64, sqlx::Error> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        let mut inserted = 0;
        for item in items {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO external_results (query, language, title, url, snippet) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(query)
            .bind(language)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.snippet)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn get_external(&self, query: &str, language: &str) -> Result<Vec<ExternalResult>, sqlx::Error> {
        sqlx::query_as::<_, ExternalResult>(
            "SELECT id, query, language, title, url, snippet, created_at FROM external_results WHERE query = ? AND language = ? ORDER BY id",
        )
        .bind(query)
        .bind(language)
        .fetch_all(&self.db)
        .await
    }

    /// Delete rows for the pair older than `ttl`, so the pair reads as a miss
    pub async fn purge_stale_external(
        &self,
        query: &str,
        language: &str,
        ttl: Duration,
    ) -> Result<u64, sqlx::Error> {
        let modifier = format!("-{} seconds", ttl.as_secs());
        let result = sqlx::query(
            "DELETE FROM external_results WHERE query = ? AND language = ? AND created_at < datetime('now', ?)",
        )
        .bind(query)
        .bind(language)
        .bind(modifier)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn store() -> ResultStore {
        let pool = db::connect_in_memory().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        ResultStore::new(pool)
    }

    fn item(url: &str) -> ExternalItem {
        ExternalItem {
            title: "Rust".to_string(),
            url: url.to_string(),
            snippet: "<span>Rust</span> is a language".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_same_triple_twice_keeps_one_row() {
        let store = store().await;
        let items = vec![item("https://en.wikipedia.org/?curid=1")];

        assert_eq!(store.insert_external("rust", "en", &items).await.unwrap(), 1);
        assert_eq!(store.insert_external("rust", "en", &items).await.unwrap(), 0);

        let rows = store.get_external("rust", "en").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, "https://en.wikipedia.org/?curid=1");
    }

    #[tokio::test]
    async fn test_exists_is_exact_and_language_scoped() {
        let store = store().await;
        store
            .insert_external("rust", "en", &[item("https://en.wikipedia.org/?curid=1")])
            .await
            .unwrap();

        assert!(store.exists_external("rust", "en").await.unwrap());
        assert!(!store.exists_external("Rust", "en").await.unwrap());
        assert!(!store.exists_external("rust", "da").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_url_allowed_for_other_query() {
        let store = store().await;
        let items = vec![item("https://en.wikipedia.org/?curid=1")];
        store.insert_external("rust", "en", &items).await.unwrap();
        store.insert_external("rust lang", "en", &items).await.unwrap();

        assert_eq!(store.get_external("rust", "en").await.unwrap().len(), 1);
        assert_eq!(store.get_external("rust lang", "en").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_insert_is_noop() {
        let store = store().await;
        assert_eq!(store.insert_external("rust", "en", &[]).await.unwrap(), 0);
        assert!(!store.exists_external("rust", "en").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_removes_only_stale_rows() {
        let store = store().await;
        store
            .insert_external("rust", "en", &[item("https://en.wikipedia.org/?curid=1")])
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO external_results (query, language, title, url, snippet, created_at) VALUES ('rust', 'en', 'Old', 'https://en.wikipedia.org/?curid=2', '', datetime('now', '-30 days'))",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let purged = store
            .purge_stale_external("rust", "en", Duration::from_secs(7 * 24 * 3600))
            .await
            .unwrap();
        assert_eq!(purged, 1);

        let rows = store.get_external("rust", "en").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].url, "https://en.wikipedia.org/?curid=1");
    }
}
