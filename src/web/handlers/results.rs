// GET /api/results/{source} — the last persisted Run Result.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::output::json::read_result;
use crate::web::{api_error, parse_source, AppState};

pub async fn get_results(State(state): State<AppState>, Path(source): Path<String>) -> Response {
    let source = match parse_source(&source) {
        Ok(source) => source,
        Err(response) => return response,
    };

    let path = state.config.artifact_path(source);
    if !path.exists() {
        return api_error(
            StatusCode::NOT_FOUND,
            &format!("No results for {source} yet"),
        );
    }

    match read_result(&path) {
        Ok(result) => Json(result).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}")),
    }
}
