// OpenAI chat-completions summarization backend (`service_b`).
//
// Only transcripts are supported; an audio reference is reported as
// unsupported and the episode keeps unknown text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{truncate_transcript, SummaryInput, TextService, SUMMARY_PROMPT};
use crate::error::TextServiceError;
use crate::sources::rate_limit::RateLimiter;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const MAX_TRANSCRIPT_CHARS: usize = 12_000;
const MAX_TOKENS: u32 = 500;

pub struct OpenAiSummarizer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    rate_limiter: RateLimiter,
}

impl OpenAiSummarizer {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: Option<String>,
        spacing_ms: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
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
impl TextService for OpenAiSummarizer {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn summarize(&self, input: &SummaryInput) -> Result<String, TextServiceError> {
        let transcript = match input {
            SummaryInput::Transcript(text) => text,
            SummaryInput::Audio { .. } => return Err(TextServiceError::Unsupported("audio")),
        };
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(TextServiceError::Unavailable("OPENAI_API_KEY not set".into()));
        };

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SUMMARY_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content: truncate_transcript(transcript, MAX_TRANSCRIPT_CHARS),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.7,
        };

        self.rate_limiter.acquire().await;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TextServiceError::Unavailable(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TextServiceError::Unavailable(format!(
                "OpenAI returned {status}: {}",
                crate::sources::http::snippet(&body)
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            TextServiceError::Unavailable(format!("Failed to parse OpenAI response: {e}"))
        })?;

        let summary = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        if summary.is_empty() {
            return Err(TextServiceError::Unavailable(
                "OpenAI returned an empty completion".into(),
            ));
        }

        debug!(model = %self.model, chars = summary.len(), "OpenAI summary received");
        Ok(summary)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
