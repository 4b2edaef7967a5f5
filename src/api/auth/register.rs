use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use super::types::RegisterForm;
use crate::state::AppState;

#[cfg(not(test))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const BCRYPT_COST: u32 = 4;

fn register_page(state: &AppState, status: StatusCode, error: &str, form: &RegisterForm) -> Response {
    state.views.page(
        status,
        "register.html",
        "Sign Up",
        false,
        json!({ "error": error, "username": form.username, "email": form.email }),
    )
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// POST /api/register - 表单注册
pub async fn register(State(state): State<Arc<AppState>>, Form(form): Form<RegisterForm>) -> Response {
    if let Some(error) = form.validate() {
        return register_page(&state, StatusCode::BAD_REQUEST, error, &form);
    }
    let username = form.username.trim();
    let email = form.email.trim();

    let taken: Result<i64, sqlx::Error> =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_one(&state.db)
            .await;
    match taken {
        Ok(0) => {}
        Ok(_) => {
            return register_page(
                &state,
                StatusCode::CONFLICT,
                "Registration failed, username or email already in use",
                &form,
            )
        }
        Err(e) => {
            tracing::error!("Registration lookup failed: {}", e);
            return register_page(&state, StatusCode::INTERNAL_SERVER_ERROR, "Registration failed", &form);
        }
    }

    let password_hash = match hash_password(&form.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Password hashing failed: {}", e);
            return register_page(&state, StatusCode::INTERNAL_SERVER_ERROR, "Registration failed", &form);
        }
    };

    let inserted = sqlx::query(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(email)
    .bind(&password_hash)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    if let Err(e) = inserted {
        // Lost a race against a concurrent registration with the same name
        tracing::warn!("Failed to insert user {}: {}", username, e);
        return register_page(&state, StatusCode::CONFLICT, "Registration failed", &form);
    }

    tracing::info!("Registered user {}", username);
    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, email: &str, pw: &str, pw2: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: email.to_string(),
            password: pw.to_string(),
            password2: pw2.to_string(),
        }
    }

    #[test]
    fn test_validation() {
        assert_eq!(form("", "a@b.c", "x", "x").validate(), Some("All fields required"));
        assert_eq!(form("bob", "a@b.c", "x", "").validate(), Some("All fields required"));
        assert_eq!(form("bob", "a@b.c", "x", "y").validate(), Some("Passwords do not match"));
        assert_eq!(form("bob", "a@b.c", "x", "x").validate(), None);
    }

    #[test]
    fn test_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert!(bcrypt::verify("hunter2", &hash).unwrap());
        assert!(!bcrypt::verify("hunter3", &hash).unwrap());
    }
}
