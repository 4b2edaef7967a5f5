use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde_json::json;
use std::sync::Arc;
use tower_cookies::Cookies;

use super::types::LoginForm;
use crate::auth::{self, SESSION_COOKIE_NAME};
use crate::state::AppState;
use whoknows::models::User;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

fn login_page(state: &AppState, status: StatusCode, error: &str, username: &str) -> Response {
    state.views.page(
        status,
        "login.html",
        "Sign In",
        false,
        json!({ "error": error, "username": username }),
    )
}

/// POST /api/login - 表单登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return login_page(&state, StatusCode::BAD_REQUEST, "Username and password required", username);
    }

    let user = match sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Login lookup failed: {}", e);
            return login_page(&state, StatusCode::INTERNAL_SERVER_ERROR, "Login failed", username);
        }
    };

    let Some(user) = user else {
        return login_page(&state, StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS, username);
    };

    match bcrypt::verify(&form.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return login_page(&state, StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS, username),
        Err(e) => {
            tracing::warn!("Stored password hash for {} is unreadable: {}", user.username, e);
            return login_page(&state, StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS, username);
        }
    }

    let session = match auth::create_session(&state.db, user.id).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to create session: {}", e);
            return login_page(&state, StatusCode::INTERNAL_SERVER_ERROR, "Login failed", username);
        }
    };
    auth::set_session_cookie(&cookies, session.id);
    tracing::info!("User {} logged in", user.username);

    Redirect::to("/").into_response()
}

/// POST /api/logout - 退出登录
pub async fn logout(State(state): State<Arc<AppState>>, cookies: Cookies) -> Redirect {
    if let Some(cookie) = cookies.get(SESSION_COOKIE_NAME) {
        if let Err(e) = auth::delete_session(&state.db, cookie.value()).await {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }
    auth::clear_session_cookie(&cookies);
    Redirect::to("/")
}
