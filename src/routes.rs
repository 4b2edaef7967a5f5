use axum::{
    extract::{MatchedPath, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::api;
use crate::state::AppState;

/// Count every response by route template and status code
async fn track_http(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) if matched.as_str().starts_with("/static") => "/static".to_string(),
        Some(matched) => matched.as_str().to_string(),
        None => "unmatched".to_string(),
    };
    let response = next.run(req).await;
    state.metrics.record_http(&path, response.status().as_u16());
    response
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Pages
        .route("/", get(api::search::search_page))
        .route("/search", get(api::search::search_page))
        .route("/about", get(api::pages::about))
        .route("/login", get(api::pages::login_page))
        .route("/register", get(api::pages::register_page))
        .route("/weather", get(api::weather::weather_page))
        // API
        .route("/api/login", post(api::auth::login))
        .route("/api/register", post(api::auth::register))
        .route("/api/logout", post(api::auth::logout).get(api::auth::logout))
        .route("/api/search", get(api::search::api_search))
        .route("/api/weather", get(api::weather::api_weather))
        // Health and metrics
        .route("/healthz", get(api::server::healthz))
        .route("/readyz", get(api::server::readyz))
        .route("/metrics", get(api::server::metrics))
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn_with_state(state.clone(), track_http))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{test_state, StubSource};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request as HttpRequest, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;
    use whoknows::config::AppConfig;

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_req(uri: &str) -> Request {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn form_req(uri: &str, body: &str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn session_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("session="))
            .and_then(|v| v.split(';').next())
            .map(|v| v.to_string())
    }

    async fn register_and_login(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(form_req(
                "/api/register",
                "username=alice&email=alice%40example.com&password=secret&password2=secret",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");

        let response = app
            .clone()
            .oneshot(form_req("/api/login", "username=alice&password=secret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        session_cookie(&response).unwrap()
    }

    #[tokio::test]
    async fn test_healthz_and_readyz() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state.clone());

        let response = app.clone().oneshot(get_req("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");

        let response = app.clone().oneshot(get_req("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ready");

        state.db.close().await;
        let response = app.oneshot(get_req("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_api_search_without_session_is_unauthorized() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state.clone());
        // Any database access would fail now
        state.db.close().await;

        let response = app.oneshot(get_req("/api/search?q=welcome")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(state.metrics.api_requests(), 1);
    }

    #[tokio::test]
    async fn test_api_search_with_session() {
        let source = StubSource::new(5);
        let state = test_state(source.clone(), AppConfig::default()).await;
        let app = build_router(state);
        let cookie = register_and_login(&app).await;

        let request = HttpRequest::builder()
            .uri("/api/search?q=welcome")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        let results = body["search_results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], "Welcome");
        assert_eq!(results[0]["language"], "en");
        assert!(results[0]["id"].as_i64().unwrap() > 0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_page_merges_and_escapes() {
        let source = StubSource::new(2);
        let state = test_state(source.clone(), AppConfig::default()).await;
        let app = build_router(state);

        let response = app.oneshot(get_req("/search?q=welcome&language=en")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;

        assert!(html.contains("Welcome"));
        assert!(html.contains("curid=2"));
        assert!(html.contains("&lt;span"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_search_page() {
        let source = StubSource::new(2);
        let state = test_state(source.clone(), AppConfig::default()).await;
        let app = build_router(state.clone());

        let response = app.clone().oneshot(get_req("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(get_req("/search?q=%20%20")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(source.calls(), 0);
        assert_eq!(state.metrics.searches(), 0);
    }

    #[tokio::test]
    async fn test_login_failures_rerender_form() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state);
        register_and_login(&app).await;

        let response = app
            .clone()
            .oneshot(form_req("/api/login", "username=alice&password=wrong"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(session_cookie(&response).is_none());
        assert!(body_string(response).await.contains("Invalid username or password"));

        let response = app
            .oneshot(form_req("/api/login", "username=nobody&password=secret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_failures_rerender_form() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(form_req(
                "/api/register",
                "username=bob&email=bob%40example.com&password=a&password2=b",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("Passwords do not match"));

        register_and_login(&app).await;
        let response = app
            .oneshot(form_req(
                "/api/register",
                "username=alice&email=other%40example.com&password=x&password2=x",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_logout_removes_session() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state.clone());
        let cookie = register_and_login(&app).await;

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(sessions, 0);

        let request = HttpRequest::builder()
            .uri("/api/search?q=welcome")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_weather_without_key_is_unavailable() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state);

        let response = app.clone().oneshot(get_req("/api/weather")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "weather service unavailable");

        let response = app.oneshot(get_req("/weather")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_string(response).await.contains("weather service unavailable"));
    }

    #[tokio::test]
    async fn test_metrics_count_responses() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state.clone());

        app.clone().oneshot(get_req("/healthz")).await.unwrap();
        app.clone().oneshot(get_req("/api/search?q=x")).await.unwrap();
        let response = app.oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_string(response).await;

        assert!(text.contains("app_http_requests_total{path=\"/healthz\",code=\"200\"} 1"));
        assert!(text.contains("app_http_requests_total{path=\"/api/search\",code=\"401\"} 1"));
        assert!(text.contains("whoknows_requests_total 1"));
    }

    #[tokio::test]
    async fn test_static_files_served() {
        let state = test_state(StubSource::new(0), AppConfig::default()).await;
        let app = build_router(state);

        let response = app.oneshot(get_req("/static/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
