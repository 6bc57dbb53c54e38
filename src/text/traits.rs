// Text Service trait — the swap-ready abstraction over summarization APIs.

use async_trait::async_trait;

use crate::error::TextServiceError;

/// What the service is asked to summarize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryInput {
    /// Plain transcript text.
    Transcript(String),
    /// A reference to the episode's audio, for backends that transcribe
    /// themselves.
    Audio { url: String },
}

/// Instruction shared by every backend.
pub const SUMMARY_PROMPT: &str = "Summarize this podcast episode in detail for a competitor \
analysis report. Cover the main topics, notable insights and claims, guests, and any \
products or announcements mentioned. Use short paragraphs or bullet points.";

#[async_trait]
pub trait TextService: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Produce a summary. Every error leaves the episode in the result with
    /// unknown text.
    async fn summarize(&self, input: &SummaryInput) -> Result<String, TextServiceError>;
}

/// Cut a transcript to at most `max_chars` characters on a char boundary.
pub fn truncate_transcript(text: &str, max_chars: usize) -> String {
    crate::output::truncate_chars(text, max_chars)
}
