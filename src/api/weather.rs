use axum::{extract::State, http::StatusCode, response::Response, Json};
use serde_json::json;
use std::sync::Arc;
use tower_cookies::Cookies;

use super::{api_error, ApiError};
use crate::auth;
use crate::state::AppState;
use whoknows::weather::WeatherReport;

const TITLE: &str = "Copenhagen Forecast";

/// GET /weather - 天气页面
pub async fn weather_page(State(state): State<Arc<AppState>>, cookies: Cookies) -> Response {
    let logged_in = auth::current_user(&cookies, &state.db)
        .await
        .ok()
        .flatten()
        .is_some();

    match state.weather.copenhagen().await {
        Ok(report) => {
            let celsius = report.celsius();
            state.views.page(
                StatusCode::OK,
                "weather.html",
                TITLE,
                logged_in,
                json!({ "report": report, "celsius": celsius }),
            )
        }
        Err(e) => {
            tracing::warn!("Forecast fetch failed: {}", e);
            state.views.page(
                StatusCode::SERVICE_UNAVAILABLE,
                "weather.html",
                TITLE,
                logged_in,
                json!({ "error": e.public_message() }),
            )
        }
    }
}

/// GET /api/weather - JSON天气接口
pub async fn api_weather(State(state): State<Arc<AppState>>) -> Result<Json<WeatherReport>, ApiError> {
    state.weather.copenhagen().await.map(Json).map_err(|e| {
        tracing::warn!("Weather API fetch failed: {}", e);
        api_error(StatusCode::SERVICE_UNAVAILABLE, e.public_message())
    })
}
