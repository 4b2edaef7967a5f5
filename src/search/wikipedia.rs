//! Wikipedia enrichment source / 维基百科外部结果来源
//!
//! One GET against the MediaWiki search API per cache miss. No retries.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::WikipediaConfig;
use crate::models::ExternalItem;

const ARTICLE_BASE: &str = "https://en.wikipedia.org/?curid=";
const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Anything that can turn a free-text query into external candidates
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ExternalItem>, EnrichmentError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    search: Vec<ApiHit>,
}

#[derive(Debug, Deserialize)]
struct ApiHit {
    title: String,
    pageid: i64,
    #[serde(default)]
    snippet: String,
}

pub struct WikipediaClient {
    client: reqwest::Client,
    endpoint: String,
}

impl WikipediaClient {
    pub fn new(config: &WikipediaConfig) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

/// Unset or non-positive limits use the default; large ones are capped
pub fn clamp_limit(limit: usize) -> usize {
    match limit {
        0 => DEFAULT_LIMIT,
        n if n > MAX_LIMIT => MAX_LIMIT,
        n => n,
    }
}

#[async_trait]
impl EnrichmentSource for WikipediaClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ExternalItem>, EnrichmentError> {
        let limit = clamp_limit(limit).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("format", "json"),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: ApiResponse =
            serde_json::from_str(&body).map_err(|e| EnrichmentError::Decode(e.to_string()))?;

        let hits = parsed.query.map(|q| q.search).unwrap_or_default();
        tracing::debug!(query = %query, count = hits.len(), "Wikipedia search completed");

        Ok(hits
            .into_iter()
            .map(|hit| ExternalItem {
                title: hit.title,
                url: format!("{}{}", ARTICLE_BASE, hit.pageid),
                snippet: hit.snippet,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WikipediaClient {
        let config = WikipediaConfig {
            endpoint: format!("{}/w/api.php", server.uri()),
            user_agent: "TestBot/1.0".to_string(),
            timeout_ms: 2000,
            result_limit: 10,
        };
        WikipediaClient::new(&config).unwrap()
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0), 10);
        assert_eq!(clamp_limit(5), 5);
        assert_eq!(clamp_limit(50), 50);
        assert_eq!(clamp_limit(500), 50);
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "query"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "rust lang"))
            .and(query_param("format", "json"))
            .and(query_param("srlimit", "3"))
            .and(header("user-agent", "TestBot/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "batchcomplete": "",
                "query": {
                    "search": [
                        {"ns": 0, "title": "Rust (programming language)", "pageid": 29414838, "snippet": "<span class=\"searchmatch\">Rust</span> is"},
                        {"ns": 0, "title": "Rust", "pageid": 26477, "snippet": "iron oxide"}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client_for(&server).search("rust lang", 3).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Rust (programming language)");
        assert_eq!(items[0].url, "https://en.wikipedia.org/?curid=29414838");
        assert!(items[0].snippet.contains("searchmatch"));
        assert_eq!(items[1].url, "https://en.wikipedia.org/?curid=26477");
    }

    #[tokio::test]
    async fn test_zero_limit_requests_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("srlimit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"query": {"search": []}})))
            .expect(1)
            .mount(&server)
            .await;

        let items = client_for(&server).search("rust", 0).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_missing_query_section_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batchcomplete": ""})))
            .mount(&server)
            .await;

        assert!(client_for(&server).search("rust", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_200_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).search("rust", 5).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Status(503)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("rust", 5).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Decode(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"query": {"search": []}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = WikipediaConfig {
            endpoint: format!("{}/w/api.php", server.uri()),
            user_agent: "TestBot/1.0".to_string(),
            timeout_ms: 100,
            result_limit: 10,
        };
        let err = WikipediaClient::new(&config).unwrap().search("rust", 5).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Transport(_)));
    }
}
