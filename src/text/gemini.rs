// Google Gemini summarization backend (`service_a`).
//
// Calls `models/{model}:generateContent`. Transcripts are sent inline;
// audio references are passed as `file_data` so Gemini fetches and
// transcribes the episode itself.
//
// API docs: https://ai.google.dev/api/generate-content

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{truncate_transcript, SummaryInput, TextService, SUMMARY_PROMPT};
use crate::error::TextServiceError;
use crate::sources::rate_limit::RateLimiter;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini's context is large, but long episodes still need a bound.
const MAX_TRANSCRIPT_CHARS: usize = 30_000;
const MAX_OUTPUT_TOKENS: u32 = 8000;

pub struct GeminiSummarizer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    rate_limiter: RateLimiter,
}

impl GeminiSummarizer {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: Option<String>,
        spacing_ms: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            rate_limiter: RateLimiter::spacing(spacing_ms),
        })
    }
}

#[async_trait]
impl TextService for GeminiSummarizer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn summarize(&self, input: &SummaryInput) -> Result<String, TextServiceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(TextServiceError::Unavailable("GEMINI_API_KEY not set".into()));
        };

        let content_part = match input {
            SummaryInput::Transcript(text) => Part::Text {
                text: format!(
                    "Transcript:\n\n{}",
                    truncate_transcript(text, MAX_TRANSCRIPT_CHARS)
                ),
            },
            SummaryInput::Audio { url } => Part::File {
                file_data: FileData {
                    file_uri: url.clone(),
                    mime_type: "video/*".to_string(),
                },
            },
        };

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: SUMMARY_PROMPT.to_string(),
                    },
                    content_part,
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        self.rate_limiter.acquire().await;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| TextServiceError::Unavailable(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TextServiceError::Unavailable(format!(
                "Gemini returned {status}: {}",
                crate::sources::http::snippet(&body)
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            TextServiceError::Unavailable(format!("Failed to parse Gemini response: {e}"))
        })?;

        let summary: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        let summary = summary.trim().to_string();

        if summary.is_empty() {
            return Err(TextServiceError::Unavailable(
                "Gemini returned an empty summary".into(),
            ));
        }

        debug!(model = %self.model, chars = summary.len(), "Gemini summary received");
        Ok(summary)
    }
}

// --- Gemini request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    File { file_data: FileData },
}

#[derive(Serialize)]
struct FileData {
    file_uri: String,
    mime_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
