use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use super::{api_error, internal_error, ApiError};
use crate::auth;
use crate::state::AppState;
use whoknows::search::SearchSurface;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub language: Option<String>,
}

/// GET /search (and /) - 搜索页面
pub async fn search_page(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Query(params): Query<SearchParams>,
) -> Response {
    let logged_in = match auth::current_user(&cookies, &state.db).await {
        Ok(user) => user.is_some(),
        Err(e) => {
            tracing::warn!("Session lookup failed: {}", e);
            false
        }
    };

    match state
        .search
        .search(&params.q, params.language.as_deref(), SearchSurface::Page)
        .await
    {
        Ok(outcome) => state.views.page(
            StatusCode::OK,
            "search.html",
            "",
            logged_in,
            json!({
                "query": outcome.query,
                "language": outcome.language,
                "results": outcome.results,
            }),
        ),
        Err(e) => {
            tracing::error!(query = %params.q, error = %e, "Search failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "search unavailable").into_response()
        }
    }
}

/// GET /api/search - JSON搜索接口（需要登录）
pub async fn api_search(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    state.metrics.record_api_request();

    let user = auth::current_user(&cookies, &state.db)
        .await
        .map_err(internal_error)?;
    if user.is_none() {
        return Err(api_error(StatusCode::UNAUTHORIZED, "unauthorized"));
    }

    let outcome = state
        .search
        .search(&params.q, params.language.as_deref(), SearchSurface::Api)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({ "search_results": outcome.results })))
}
