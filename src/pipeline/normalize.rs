// Normalizer: source-specific raw records → Content Items.
//
// Pure functions, no I/O. Anything that can't be normalized honestly (no
// publish date, a carousel without a slide count) is an error, never a
// default.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::NormalizeError;
use crate::models::{ContentItem, ContentKind, MetricName, Metrics};
use crate::sources::instagram::InstagramMedia;
use crate::sources::traits::RawItem;
use crate::sources::youtube::YoutubeVideo;

/// Parse a source timestamp into UTC.
///
/// Accepts RFC 3339 (YouTube: `2024-05-01T10:00:00Z`) and the Graph API's
/// offset-without-colon form (`2024-05-01T10:00:00+0000`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    // Naive timestamps are taken as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse an ISO-8601 duration (`PT1H2M3S`, `P1DT2H`) into seconds.
/// Year and month components are rejected since they have no fixed length.
pub fn parse_iso8601_duration(raw: &str) -> Option<u64> {
    let rest = raw.trim().strip_prefix('P')?;
    let mut total: u64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            'T' => {
                if !number.is_empty() || in_time {
                    return None;
                }
                in_time = true;
            }
            '0'..='9' => number.push(c),
            unit => {
                let value: u64 = number.parse().ok()?;
                number.clear();
                let multiplier = match (in_time, unit) {
                    (false, 'W') => 7 * 86_400,
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return None,
                };
                total = total.checked_add(value.checked_mul(multiplier)?)?;
                saw_component = true;
            }
        }
    }

    (number.is_empty() && saw_component).then_some(total)
}

/// Normalize one raw record listed for `account_id`.
pub fn normalize(account_id: &str, raw: &RawItem) -> Result<ContentItem, NormalizeError> {
    match raw {
        RawItem::Instagram(media) => normalize_instagram(account_id, media),
        RawItem::Youtube(video) => normalize_youtube(account_id, video),
    }
}

fn published_at(source_id: &str, raw: Option<&str>) -> Result<DateTime<Utc>, NormalizeError> {
    raw.and_then(parse_timestamp)
        .ok_or_else(|| NormalizeError::MissingPublishDate {
            source_id: source_id.to_string(),
            raw: raw.map(str::to_string),
        })
}

fn normalize_instagram(
    account_id: &str,
    media: &InstagramMedia,
) -> Result<ContentItem, NormalizeError> {
    let published_at = published_at(&media.id, media.timestamp.as_deref())?;

    let media_type = media.media_type.as_deref().unwrap_or_default();
    let kind = match media_type {
        "IMAGE" => ContentKind::Photo,
        "VIDEO" | "REELS" => ContentKind::Video,
        "CAROUSEL_ALBUM" => ContentKind::Carousel,
        other => {
            return Err(NormalizeError::UnsupportedMediaType {
                source_id: media.id.clone(),
                media_type: if other.is_empty() {
                    "(none)".to_string()
                } else {
                    other.to_string()
                },
            })
        }
    };

    let media_count = match kind {
        ContentKind::Carousel => {
            let slides = media
                .children
                .as_ref()
                .map(|c| c.data.len())
                .unwrap_or(0);
            if slides == 0 {
                return Err(NormalizeError::MissingSlideCount {
                    source_id: media.id.clone(),
                });
            }
            u32::try_from(slides).unwrap_or(u32::MAX)
        }
        _ => 1,
    };

    let mut metrics = Metrics::new();
    metrics.insert(MetricName::Likes, media.like_count);
    metrics.insert(MetricName::Comments, media.comments_count);
    if kind == ContentKind::Video {
        metrics.insert(MetricName::Views, media.view_count);
    }

    Ok(ContentItem {
        source_id: media.id.clone(),
        account_id: account_id.to_string(),
        published_at,
        kind,
        url: media.permalink.clone().unwrap_or_default(),
        caption_or_title: media.caption.clone().unwrap_or_default(),
        metrics,
        media_count,
        duration_secs: None,
        text_content: None,
        topics: Vec::new(),
    })
}

fn normalize_youtube(account_id: &str, video: &YoutubeVideo) -> Result<ContentItem, NormalizeError> {
    let published_at = published_at(&video.video_id, video.published_at.as_deref())?;

    let count = |raw: &Option<String>| raw.as_deref().and_then(|s| s.trim().parse::<u64>().ok());
    let mut metrics = Metrics::new();
    metrics.insert(MetricName::Views, count(&video.view_count));
    metrics.insert(MetricName::Likes, count(&video.like_count));
    metrics.insert(MetricName::Comments, count(&video.comment_count));

    Ok(ContentItem {
        source_id: video.video_id.clone(),
        account_id: account_id.to_string(),
        published_at,
        kind: ContentKind::PodcastEpisode,
        url: format!("https://www.youtube.com/watch?v={}", video.video_id),
        caption_or_title: video.title.clone(),
        metrics,
        media_count: 1,
        duration_secs: video.duration.as_deref().and_then(parse_iso8601_duration),
        text_content: None,
        topics: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::instagram::{MediaChild, MediaChildren};
    use chrono::TimeZone;

    fn media(id: &str, media_type: &str) -> InstagramMedia {
        InstagramMedia {
            id: id.to_string(),
            media_type: Some(media_type.to_string()),
            timestamp: Some("2024-05-01T10:00:00+0000".to_string()),
            like_count: Some(10),
            comments_count: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:00:00+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT45M"), Some(2700));
        assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_iso8601_duration("P0D"), Some(0));
        assert_eq!(parse_iso8601_duration("PT"), None);
        assert_eq!(parse_iso8601_duration("P1M"), None);
        assert_eq!(parse_iso8601_duration("1H"), None);
        assert_eq!(parse_iso8601_duration("PT5"), None);
    }

    #[test]
    fn test_carousel_media_count_is_slide_count() {
        let mut m = media("c1", "CAROUSEL_ALBUM");
        m.children = Some(MediaChildren {
            data: (0..7)
                .map(|i| MediaChild {
                    id: format!("s{i}"),
                    media_type: Some("IMAGE".into()),
                })
                .collect(),
        });
        let item = normalize("brand", &RawItem::Instagram(m)).unwrap();
        assert_eq!(item.kind, ContentKind::Carousel);
        assert_eq!(item.media_count, 7);
    }

    #[test]
    fn test_carousel_without_children_is_an_error_not_one() {
        let err = normalize("brand", &RawItem::Instagram(media("c1", "CAROUSEL_ALBUM"))).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::MissingSlideCount {
                source_id: "c1".into()
            }
        );
    }

    #[test]
    fn test_missing_timestamp_is_dropped_not_defaulted() {
        let mut m = media("p1", "IMAGE");
        m.timestamp = None;
        assert!(matches!(
            normalize("brand", &RawItem::Instagram(m)),
            Err(NormalizeError::MissingPublishDate { .. })
        ));
    }

    #[test]
    fn test_hidden_likes_are_unknown_not_zero() {
        let mut m = media("p1", "IMAGE");
        m.like_count = None;
        let item = normalize("brand", &RawItem::Instagram(m)).unwrap();
        assert_eq!(item.metrics.get(&MetricName::Likes), Some(&None));
        assert_eq!(item.metric(MetricName::Comments), Some(2));
        assert!(item.has_unknown_metrics());
        assert!(!item.metrics.contains_key(&MetricName::Views));
    }

    #[test]
    fn test_video_tracks_views() {
        let mut m = media("v1", "VIDEO");
        m.view_count = Some(900);
        let item = normalize("brand", &RawItem::Instagram(m)).unwrap();
        assert_eq!(item.kind, ContentKind::Video);
        assert_eq!(item.metric(MetricName::Views), Some(900));
        assert_eq!(item.media_count, 1);
    }

    #[test]
    fn test_unsupported_media_type() {
        assert!(matches!(
            normalize("brand", &RawItem::Instagram(media("x", "STORY"))),
            Err(NormalizeError::UnsupportedMediaType { .. })
        ));
    }

    #[test]
    fn test_youtube_video_becomes_episode() {
        let video = YoutubeVideo {
            video_id: "abc".into(),
            title: "Episode 12".into(),
            published_at: Some("2024-05-01T10:00:00Z".into()),
            duration: Some("PT1H".into()),
            view_count: Some("1500".into()),
            like_count: None,
            comment_count: Some("12".into()),
            ..Default::default()
        };
        let item = normalize("@show", &RawItem::Youtube(video)).unwrap();
        assert_eq!(item.kind, ContentKind::PodcastEpisode);
        assert_eq!(item.url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(item.duration_secs, Some(3600));
        assert_eq!(item.metric(MetricName::Views), Some(1500));
        assert_eq!(item.metrics.get(&MetricName::Likes), Some(&None));
    }
}
