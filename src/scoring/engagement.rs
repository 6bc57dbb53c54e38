// Engagement Ranker: score posts by their disclosed metrics and take the
// global top-K.

use std::cmp::Ordering;

use crate::models::{ContentItem, RankedItem};

/// Sum of every known metric. Unknown metrics add nothing but don't zero
/// the rest.
pub fn engagement_score(item: &ContentItem) -> u64 {
    item.metrics
        .values()
        .flatten()
        .fold(0u64, |acc, v| acc.saturating_add(*v))
}

/// Rank items by score (descending), then by recency. `sort_by` is stable,
/// so exact ties keep their input order.
pub fn rank_by_engagement(items: Vec<ContentItem>, top_k: usize) -> Vec<RankedItem> {
    let mut scored: Vec<(u64, ContentItem)> = items
        .into_iter()
        .map(|item| (engagement_score(&item), item))
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| compare(*score_a, a, *score_b, b));

    scored
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(i, (score, item))| RankedItem {
            rank: i + 1,
            score: Some(score),
            item,
        })
        .collect()
}

fn compare(score_a: u64, a: &ContentItem, score_b: u64, b: &ContentItem) -> Ordering {
    score_b
        .cmp(&score_a)
        .then_with(|| b.published_at.cmp(&a.published_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, MetricName, Metrics};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn post(id: &str, likes: Option<u64>, comments: Option<u64>, age_hours: i64) -> ContentItem {
        let mut metrics = Metrics::new();
        metrics.insert(MetricName::Likes, likes);
        metrics.insert(MetricName::Comments, comments);
        ContentItem {
            source_id: id.to_string(),
            account_id: "brand".to_string(),
            published_at: base_time() - Duration::hours(age_hours),
            kind: ContentKind::Photo,
            url: String::new(),
            caption_or_title: String::new(),
            metrics,
            media_count: 1,
            duration_secs: None,
            text_content: None,
            topics: Vec::new(),
        }
    }

    fn ids(ranked: &[RankedItem]) -> Vec<&str> {
        ranked.iter().map(|r| r.item.source_id.as_str()).collect()
    }

    #[test]
    fn test_unknown_metric_contributes_zero() {
        assert_eq!(engagement_score(&post("a", None, Some(7), 0)), 7);
        assert_eq!(engagement_score(&post("a", Some(3), Some(7), 0)), 10);
        assert_eq!(engagement_score(&post("a", None, None, 0)), 0);
    }

    #[test]
    fn test_score_saturates() {
        assert_eq!(
            engagement_score(&post("a", Some(u64::MAX), Some(5), 0)),
            u64::MAX
        );
    }

    #[test]
    fn test_rank_orders_by_score_then_recency() {
        let items = vec![
            post("low", Some(10), Some(0), 1),
            post("older_tie", Some(40), Some(10), 5),
            post("high", Some(90), Some(10), 3),
            post("newer_tie", Some(45), Some(5), 2),
        ];
        let ranked = rank_by_engagement(items, 20);
        assert_eq!(ids(&ranked), vec!["high", "newer_tie", "older_tie", "low"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].score, Some(100));
    }

    #[test]
    fn test_exact_ties_keep_input_order() {
        let items = vec![
            post("first", Some(5), None, 1),
            post("second", Some(5), None, 1),
            post("third", Some(5), None, 1),
        ];
        let ranked = rank_by_engagement(items.clone(), 20);
        assert_eq!(ids(&ranked), vec!["first", "second", "third"]);
        assert_eq!(rank_by_engagement(items, 20), ranked);
    }

    #[test]
    fn test_greater_metrics_never_rank_below() {
        let items = vec![post("less", Some(10), Some(1), 0), post("more", Some(11), Some(1), 0)];
        assert_eq!(ids(&rank_by_engagement(items, 20)), vec!["more", "less"]);
    }

    #[test]
    fn test_top_k_truncates_and_empty_input() {
        let items = (0..30).map(|i| post(&format!("p{i}"), Some(i), None, 0)).collect();
        let ranked = rank_by_engagement(items, 20);
        assert_eq!(ranked.len(), 20);
        assert_eq!(ranked.last().map(|r| r.rank), Some(20));
        assert!(rank_by_engagement(Vec::new(), 20).is_empty());
    }
}
