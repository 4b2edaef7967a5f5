use serde::{Deserialize, Serialize};

/// Page as it appears in the seed file (ids are assigned by SQLite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPage {
    pub title: String,
    pub url: String,
    pub language: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    pub content: String,
}

/// Cached enrichment row, unique on (query, language, url)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExternalResult {
    pub id: i64,
    pub query: String,
    pub language: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub created_at: String,
}

/// One candidate returned by the enrichment source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalItem {
    pub title: String,
    pub url: String,
    /// May contain markup; escaped by the template layer
    pub snippet: String,
}

/// Unified result shape returned to callers.
/// `id` is 0 for externally sourced rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub language: String,
    pub description: String,
}

impl SearchResult {
    pub fn is_external(&self) -> bool {
        self.id == 0
    }

    pub fn from_external(item: ExternalItem, language: &str) -> Self {
        Self {
            id: 0,
            title: item.title,
            url: item.url,
            language: language.to_string(),
            description: item.snippet,
        }
    }
}

impl From<ExternalResult> for SearchResult {
    fn from(row: ExternalResult) -> Self {
        Self {
            id: 0,
            title: row.title,
            url: row.url,
            language: row.language,
            description: row.snippet,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}
