// POST /api/analyze/{source} — run the analysis pipeline synchronously.
//
// 200 OK with the Run Result for complete and partial runs.
// 503 Service Unavailable with the same body when the run was degraded.
// 409 Conflict if a run for this source is already in flight.
// 400 Bad Request if the analysis config or credentials are invalid.
// 500 Internal Server Error if the artifact could not be written.
//
// An optional `?as_of=<RFC 3339>` pins the reference time for
// reproducible runs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, warn};

use crate::config::AnalysisConfig;
use crate::error::RunError;
use crate::models::RunStatus;
use crate::pipeline::aggregate::NoopObserver;
use crate::pipeline::{build_context, run_and_persist};
use crate::web::{api_error, parse_source, AppState};

#[derive(Deserialize, Default)]
pub struct AnalyzeQuery {
    pub as_of: Option<DateTime<Utc>>,
}

pub async fn run_analysis(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Query(params): Query<AnalyzeQuery>,
) -> Response {
    let source = match parse_source(&source) {
        Ok(source) => source,
        Err(response) => return response,
    };

    let Some(_slot) = state.try_start(source) else {
        return api_error(
            StatusCode::CONFLICT,
            &format!("An analysis run for {source} is already in progress"),
        );
    };

    let analysis = match AnalysisConfig::load(&state.config.analysis_config_path) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(error = %e, "Rejecting analysis request");
            return api_error(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let fixture = state
        .fixture_dir
        .as_ref()
        .map(|dir| dir.join(format!("{source}.json")));
    let ctx = match build_context(&state.config, &analysis, source, fixture.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(error = %e, "Rejecting analysis request");
            return api_error(StatusCode::BAD_REQUEST, &format!("{e:#}"));
        }
    };

    let reference_time = params.as_of.unwrap_or_else(Utc::now);
    let artifact_path = state.config.artifact_path(source);

    match run_and_persist(&ctx, &artifact_path, reference_time, &NoopObserver).await {
        Ok(result) => {
            let status = match result.stats.status {
                RunStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
                RunStatus::Complete | RunStatus::Partial => StatusCode::OK,
            };
            (status, Json(result)).into_response()
        }
        Err(RunError::ConfigInvalid(e)) => api_error(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e @ RunError::Write { .. }) => {
            error!(error = %e, "Failed to persist run result");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
