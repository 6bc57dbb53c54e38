// GET /api/accounts — the configured accounts per source.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::AnalysisConfig;
use crate::web::{api_error, AppState};

pub async fn list_accounts(State(state): State<AppState>) -> Response {
    match AnalysisConfig::load(&state.config.analysis_config_path) {
        Ok(analysis) => Json(serde_json::json!({
            "instagram": analysis.instagram,
            "youtube": analysis.youtube,
            "settings": analysis.settings,
        }))
        .into_response(),
        Err(e) => api_error(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}
