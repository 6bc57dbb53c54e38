// TF-IDF topic keywords for summarized episodes.
//
// A single transcript is split into fixed-size word chunks, and each chunk is
// treated as a separate document for IDF computation: words spread evenly
// through the whole episode get downweighted, while words concentrated in
// certain segments (the actual subjects of discussion) get boosted.

use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};
use stop_words::{get, LANGUAGE};
use tracing::debug;

/// Shorter texts don't carry enough signal for keywords.
pub const MIN_TEXT_CHARS: usize = 50;

/// Words per pseudo-document.
const CHUNK_WORDS: usize = 60;

/// Trait for extracting a bounded keyword list from episode text.
pub trait TopicExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

pub struct TfIdfTopics {
    pub max_topics: usize,
}

impl TfIdfTopics {
    pub fn new(max_topics: usize) -> Self {
        Self { max_topics }
    }
}

impl TopicExtractor for TfIdfTopics {
    fn extract(&self, text: &str) -> Vec<String> {
        if self.max_topics == 0 || text.trim().chars().count() < MIN_TEXT_CHARS {
            return Vec::new();
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let mut documents: Vec<String> = words
            .chunks(CHUNK_WORDS)
            .map(|chunk| chunk.join(" "))
            .collect();
        // With a single document every IDF is zero; a second copy keeps
        // term frequency as the only signal.
        if documents.len() == 1 {
            documents.push(String::new());
        }

        let stop_words: Vec<String> = get(LANGUAGE::English);
        let params = TfIdfParams::UnprocessedDocuments(&documents, &stop_words, None);
        let tfidf = TfIdf::new(params);

        let mut ranked: Vec<(String, f32)> = tfidf
            .get_ranked_word_scores(words.len())
            .into_iter()
            .filter(|(word, _)| is_keyword(word))
            .collect();

        // The library ranks from a hash map, so equal scores come back in
        // arbitrary order. Break ties by word for reproducible output.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let topics: Vec<String> = ranked
            .into_iter()
            .take(self.max_topics)
            .map(|(word, _)| word)
            .collect();

        debug!(topics = ?topics, "Extracted episode topics");
        topics
    }
}

fn is_keyword(word: &str) -> bool {
    word.chars().count() >= 3 && !word.chars().all(|c| c.is_ascii_digit())
}
