use axum::{extract::State, http::StatusCode, response::Response};
use serde_json::json;
use std::sync::Arc;
use tower_cookies::Cookies;

use crate::auth;
use crate::state::AppState;

async fn logged_in(state: &AppState, cookies: &Cookies) -> bool {
    auth::current_user(cookies, &state.db)
        .await
        .ok()
        .flatten()
        .is_some()
}

/// GET /about
pub async fn about(State(state): State<Arc<AppState>>, cookies: Cookies) -> Response {
    let logged_in = logged_in(&state, &cookies).await;
    state.views.page(StatusCode::OK, "about.html", "About", logged_in, json!({}))
}

/// GET /login
pub async fn login_page(State(state): State<Arc<AppState>>, cookies: Cookies) -> Response {
    let logged_in = logged_in(&state, &cookies).await;
    state.views.page(StatusCode::OK, "login.html", "Sign In", logged_in, json!({}))
}

/// GET /register
pub async fn register_page(State(state): State<Arc<AppState>>, cookies: Cookies) -> Response {
    let logged_in = logged_in(&state, &cookies).await;
    state.views.page(StatusCode::OK, "register.html", "Sign Up", logged_in, json!({}))
}
