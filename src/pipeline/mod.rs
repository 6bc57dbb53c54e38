// Analysis pipeline: normalize → window → rank or summarize → aggregate.
//
// `run_analysis` is the single "run analysis" operation; the CLI and the
// HTTP endpoint both go through it so they produce the same artifact.

pub mod aggregate;
pub mod normalize;
pub mod summarize;
pub mod window;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{AnalysisConfig, Config, SummarizationMethod};
use crate::error::{ConfigError, RunError};
use crate::models::{RunResult, SourceKind};
use crate::output::json::write_result;
use crate::sources::fixture::FixtureSource;
use crate::sources::instagram::InstagramClient;
use crate::sources::traits::SourceClient;
use crate::sources::youtube::YoutubeClient;
use crate::text::build_text_service;
use aggregate::{aggregate, RunContext, RunObserver};

/// Resolve the source client, text service and accounts for one run.
///
/// With `fixture` set, the run replays that file and needs no credentials.
pub fn build_context(
    config: &Config,
    analysis: &AnalysisConfig,
    source: SourceKind,
    fixture: Option<&Path>,
) -> Result<RunContext> {
    let accounts = analysis.accounts(source).to_vec();
    if accounts.is_empty() {
        return Err(ConfigError::invalid(
            format!("{source}.accounts"),
            "no accounts configured for this source",
        )
        .into());
    }

    let client: Arc<dyn SourceClient> = match fixture {
        Some(path) => {
            info!(fixture = %path.display(), "Replaying fixture instead of calling {source}");
            Arc::new(FixtureSource::load(source, path)?)
        }
        None => {
            config.require_source(source)?;
            match source {
                SourceKind::Instagram => Arc::new(
                    InstagramClient::new(
                        &config.instagram_graph_url,
                        &config.instagram_access_token,
                        &config.instagram_business_account_id,
                    )
                    .context("Failed to create Instagram client")?,
                ),
                SourceKind::Youtube => Arc::new(
                    YoutubeClient::new(
                        &config.youtube_api_url,
                        &config.youtube_caption_url,
                        &config.youtube_api_key,
                    )
                    .context("Failed to create YouTube client")?,
                ),
            }
        }
    };

    let settings = analysis.settings.clone();
    let text_service = match source {
        SourceKind::Youtube if settings.summarization_method != SummarizationMethod::Skip => {
            Some(build_text_service(config, &settings)?)
        }
        _ => None,
    };

    Ok(RunContext {
        source: client,
        text_service,
        settings,
        accounts,
    })
}

/// Run the pipeline. Never fails: per-account and per-item problems are
/// reported in the result's stats.
pub async fn run_analysis(
    ctx: &RunContext,
    reference_time: DateTime<Utc>,
    observer: &dyn RunObserver,
) -> RunResult {
    aggregate(ctx, reference_time, observer).await
}

/// Run the pipeline and atomically replace the artifact at `artifact_path`.
pub async fn run_and_persist(
    ctx: &RunContext,
    artifact_path: &Path,
    reference_time: DateTime<Utc>,
    observer: &dyn RunObserver,
) -> Result<RunResult, RunError> {
    let result = run_analysis(ctx, reference_time, observer).await;
    write_result(artifact_path, &result)?;
    info!(path = %artifact_path.display(), "Results written");
    Ok(result)
}
