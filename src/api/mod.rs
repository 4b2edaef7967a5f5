pub mod auth;
pub mod pages;
pub mod search;
pub mod server;
pub mod weather;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// Error half of every JSON handler result / JSON接口错误类型
pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

pub fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    tracing::error!("Internal error: {}", err);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}
