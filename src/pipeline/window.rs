// Window Filter and per-account keyword filter.

use chrono::{DateTime, Duration, Utc};

use crate::models::ContentItem;

/// Oldest publish time still inside the window.
pub fn window_start(reference_time: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
    reference_time - Duration::days(i64::from(window_days))
}

/// Whether `published_at` lies in `[reference_time - window_days, reference_time]`.
/// Exactly `window_days` ago is inside; anything after the reference time
/// is not.
pub fn in_window(
    published_at: DateTime<Utc>,
    reference_time: DateTime<Utc>,
    window_days: u32,
) -> bool {
    published_at >= window_start(reference_time, window_days) && published_at <= reference_time
}

/// Keep the items inside the window, preserving their order.
pub fn filter_window(
    items: Vec<ContentItem>,
    reference_time: DateTime<Utc>,
    window_days: u32,
) -> Vec<ContentItem> {
    items
        .into_iter()
        .filter(|item| in_window(item.published_at, reference_time, window_days))
        .collect()
}

/// Case-insensitive substring match against the caption or title. An empty
/// keyword list matches everything.
pub fn matches_keywords(item: &ContentItem, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = item.caption_or_title.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| text.contains(&k))
}

pub fn filter_keywords(items: Vec<ContentItem>, keywords: &[String]) -> Vec<ContentItem> {
    if keywords.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| matches_keywords(item, keywords))
        .collect()
}
