// Text Service capability: episode summarization backends and topic
// keyword extraction.

pub mod gemini;
pub mod openai;
pub mod topics;
pub mod traits;

use std::sync::Arc;

use tracing::warn;

use crate::config::{Config, Settings, SummarizationBackend};
use traits::TextService;

/// Build the configured summarization backend.
///
/// A missing API key still yields a service; it answers every request with
/// `Unavailable` so episodes are kept with unknown text instead of failing
/// the run.
pub fn build_text_service(
    config: &Config,
    settings: &Settings,
) -> anyhow::Result<Arc<dyn TextService>> {
    let spacing = settings.pacing.text_service_spacing_ms;
    let model = settings.summarization_model.clone();

    let service: Arc<dyn TextService> = match settings.summarization_backend {
        SummarizationBackend::ServiceA => {
            if config.gemini_api_key.is_none() {
                warn!("GEMINI_API_KEY not set, episode summaries will be unavailable");
            }
            Arc::new(gemini::GeminiSummarizer::new(
                &config.gemini_api_url,
                config.gemini_api_key.clone(),
                model,
                spacing,
            )?)
        }
        SummarizationBackend::ServiceB => {
            if config.openai_api_key.is_none() {
                warn!("OPENAI_API_KEY not set, episode summaries will be unavailable");
            }
            Arc::new(openai::OpenAiSummarizer::new(
                &config.openai_api_url,
                config.openai_api_key.clone(),
                model,
                spacing,
            )?)
        }
    };
    Ok(service)
}
