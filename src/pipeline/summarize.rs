// Summarizer: attach summaries and topic keywords to podcast episodes.
//
// Failure never removes an episode. Whatever goes wrong (no transcript,
// text service down, summarization skipped) the episode stays in the
// result with its text marked unknown and a reason.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SummarizationMethod;
use crate::models::{ContentItem, TextContent};
use crate::sources::rate_limit::GuardedSource;
use crate::sources::traits::ItemRef;
use crate::text::topics::{TopicExtractor, MIN_TEXT_CHARS};
use crate::text::traits::{SummaryInput, TextService};

pub struct Summarizer {
    text_service: Option<Arc<dyn TextService>>,
    topics: Arc<dyn TopicExtractor>,
    method: SummarizationMethod,
}

impl Summarizer {
    pub fn new(
        text_service: Option<Arc<dyn TextService>>,
        topics: Arc<dyn TopicExtractor>,
        method: SummarizationMethod,
    ) -> Self {
        Self {
            text_service,
            topics,
            method,
        }
    }

    /// Summarize one episode, returning the enriched copy.
    pub async fn summarize(&self, source: &GuardedSource, item: ContentItem) -> ContentItem {
        if self.method == SummarizationMethod::Skip {
            return ContentItem {
                text_content: Some(TextContent::unknown("skipped")),
                ..item
            };
        }

        let transcript = match self.method {
            SummarizationMethod::PlatformTranscript => self.transcript(source, &item).await,
            _ => None,
        };

        let input = match &transcript {
            Some(text) => SummaryInput::Transcript(text.clone()),
            None => SummaryInput::Audio {
                url: item.url.clone(),
            },
        };

        let (text_content, summary) = match &self.text_service {
            None => (TextContent::unknown("no text service configured"), None),
            Some(service) => match service.summarize(&input).await {
                Ok(summary) => (
                    TextContent::Available {
                        summary: summary.clone(),
                    },
                    Some(summary),
                ),
                Err(err) => {
                    warn!(
                        episode = %item.source_id,
                        service = service.name(),
                        error = %err,
                        "Summary unavailable, keeping episode with unknown text"
                    );
                    (TextContent::unknown(err.to_string()), None)
                }
            },
        };

        let topics = transcript
            .as_deref()
            .or(summary.as_deref())
            .map(|text| self.topics.extract(text))
            .unwrap_or_default();

        ContentItem {
            text_content: Some(text_content),
            topics,
            ..item
        }
    }

    /// The platform transcript, if one exists and is long enough to be
    /// worth summarizing. Fetch errors count as "no transcript".
    async fn transcript(&self, source: &GuardedSource, item: &ContentItem) -> Option<String> {
        let item_ref = ItemRef::new(&item.account_id, &item.source_id);
        match source.fetch_transcript(&item_ref).await {
            Ok(Some(text)) if text.trim().chars().count() >= MIN_TEXT_CHARS => Some(text),
            Ok(_) => {
                debug!(episode = %item.source_id, "No usable transcript, using audio reference");
                None
            }
            Err(err) => {
                warn!(
                    episode = %item.source_id,
                    error = %err,
                    "Transcript fetch failed, using audio reference"
                );
                None
            }
        }
    }
}

/// Newest first. Stable, so equal timestamps keep their input order.
pub fn order_episodes(items: &mut [ContentItem]) {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Keep the `max` newest episodes of one account.
pub fn cap_episodes(mut items: Vec<ContentItem>, max: usize) -> Vec<ContentItem> {
    order_episodes(&mut items);
    items.truncate(max);
    items
}
