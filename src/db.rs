use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::config::AppConfig;
use crate::models::NewPage;

/// Open the main database pool / 打开主数据库连接池
pub async fn connect(config: &AppConfig) -> Result<SqlitePool> {
    let data_dir = config.get_data_dir();
    if config.database.url.is_none() && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let options = SqliteConnectOptions::from_str(&config.get_database_url())?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Single-connection in-memory database.
///
/// Every `:memory:` connection is its own database, so the pool is pinned to
/// one connection that never expires.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// Run database migrations / 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL UNIQUE,
            language TEXT NOT NULL DEFAULT 'en' CHECK (language IN ('en', 'da')),
            last_updated TEXT,
            content TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS external_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            language TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            snippet TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (query, language, url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_language ON pages(language)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id)")
        .execute(pool)
        .await?;

    ensure_full_text_index(pool).await?;

    tracing::info!("Database migration completed");
    Ok(())
}

/// Create the FTS5 index over pages(title, content) and the triggers that
/// keep it in sync. FTS5 has no `IF NOT EXISTS` guarantee across versions,
/// so existence is checked first.
pub async fn ensure_full_text_index(pool: &SqlitePool) -> Result<()> {
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'pages_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE pages_fts USING fts5(
                title,
                content,
                content = 'pages',
                content_rowid = 'id'
            )
            "#,
        )
        .execute(pool)
        .await?;
        tracing::info!("Migration: Created pages_fts full-text index");
    }

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS pages_fts_insert AFTER INSERT ON pages BEGIN
            INSERT INTO pages_fts (rowid, title, content) VALUES (new.id, new.title, new.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS pages_fts_delete AFTER DELETE ON pages BEGIN
            INSERT INTO pages_fts (pages_fts, rowid, title, content)
            VALUES ('delete', old.id, old.title, old.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS pages_fts_update AFTER UPDATE ON pages BEGIN
            INSERT INTO pages_fts (pages_fts, rowid, title, content)
            VALUES ('delete', old.id, old.title, old.content);
            INSERT INTO pages_fts (rowid, title, content) VALUES (new.id, new.title, new.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    if !fts_exists {
        // Index rows that predate the table
        sqlx::query("INSERT INTO pages_fts (pages_fts) VALUES ('rebuild')")
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Drop the full-text index and its triggers. Searches keep working through
/// the substring fallback; `ensure_full_text_index` restores it.
pub async fn drop_full_text_index(pool: &SqlitePool) -> Result<()> {
    for stmt in [
        "DROP TRIGGER IF EXISTS pages_fts_insert",
        "DROP TRIGGER IF EXISTS pages_fts_delete",
        "DROP TRIGGER IF EXISTS pages_fts_update",
        "DROP TABLE IF EXISTS pages_fts",
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }
    tracing::warn!("Full-text index dropped");
    Ok(())
}

/// Insert pages, skipping titles/urls that already exist. Returns the number
/// of rows actually inserted. Other constraint failures (an unknown
/// language) abort the whole batch.
pub async fn insert_pages(pool: &SqlitePool, pages: &[NewPage]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for page in pages {
        let result = sqlx::query(
            "INSERT INTO pages (title, url, language, last_updated, content) VALUES (?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(&page.title)
        .bind(&page.url)
        .bind(&page.language)
        .bind(&page.last_updated)
        .bind(&page.content)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}

/// Seed the page corpus from a JSON file / 从JSON文件初始化页面数据
///
/// Skipped in production and when the file does not exist.
pub async fn seed_pages(pool: &SqlitePool, path: &Path, production: bool) -> Result<()> {
    if production {
        tracing::debug!("Production environment, skipping page seed");
        return Ok(());
    }
    if !path.exists() {
        tracing::debug!("Seed file {:?} not found, skipping", path);
        return Ok(());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    let pages: Vec<NewPage> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file: {}", path.display()))?;

    let inserted = insert_pages(pool, &pages).await?;
    tracing::info!("Seeded {} of {} pages from {:?}", inserted, pages.len(), path);
    Ok(())
}
