// HTTP client tests against a local mock server.
//
// Covers request shapes, pagination and error classification for the
// Instagram Graph API, the YouTube Data API and caption endpoint, and the
// two summarization backends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rivalscan::config::{PacingSettings, RetrySettings};
use rivalscan::error::{SourceError, TextServiceError};
use rivalscan::models::AccountSpec;
use rivalscan::sources::instagram::InstagramClient;
use rivalscan::sources::rate_limit::{CircuitBreaker, GuardedSource, Pacer};
use rivalscan::sources::traits::{ItemRef, LookbackHint, RawItem, SourceClient};
use rivalscan::sources::youtube::YoutubeClient;
use rivalscan::text::gemini::GeminiSummarizer;
use rivalscan::text::openai::OpenAiSummarizer;
use rivalscan::text::traits::{SummaryInput, TextService};

fn hint() -> LookbackHint {
    LookbackHint {
        since: Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap(),
        max_items: 50,
    }
}

fn media(id: &str, timestamp: &str) -> serde_json::Value {
    json!({
        "id": id,
        "caption": format!("post {id}"),
        "media_type": "IMAGE",
        "timestamp": timestamp,
        "permalink": format!("https://www.instagram.com/p/{id}/"),
        "like_count": 10,
        "comments_count": 2
    })
}

// ============================================================
// Instagram Graph API
// ============================================================

#[tokio::test]
async fn instagram_pages_until_the_lookback_hint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/17841400000"))
        .and(query_param("access_token", "token"))
        .and(query_param_contains("fields", "business_discovery.username(acme)"))
        .and(query_param_contains("fields", "media.limit(25)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "business_discovery": {
                "media": {
                    "data": [
                        media("1", "2024-06-14T10:00:00+0000"),
                        media("2", "2024-06-12T10:00:00+0000")
                    ],
                    "paging": { "cursors": { "after": "CUR1" } }
                }
            },
            "id": "17841400000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/17841400000"))
        .and(query_param_contains("fields", "media.after(CUR1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "business_discovery": {
                "media": {
                    "data": [
                        media("3", "2024-06-09T10:00:00+0000"),
                        media("4", "2024-06-01T10:00:00+0000")
                    ],
                    "paging": { "cursors": { "after": "CUR2" } }
                }
            },
            "id": "17841400000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = InstagramClient::new(&server.uri(), "token", "17841400000").unwrap();
    let items = client
        .list_recent(&AccountSpec::new("acme"), &hint(), &Pacer::unpaced())
        .await
        .unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.source_id()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
}

#[tokio::test]
async fn instagram_throttling_code_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Application request limit reached", "type": "OAuthException", "code": 4 }
        })))
        .mount(&server)
        .await;

    let client = InstagramClient::new(&server.uri(), "token", "17841400000").unwrap();
    let err = client
        .list_recent(&AccountSpec::new("acme"), &hint(), &Pacer::unpaced())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::RateLimited { .. }));
}

#[tokio::test]
async fn instagram_unknown_username_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Invalid user id", "code": 110 }
        })))
        .mount(&server)
        .await;

    let client = InstagramClient::new(&server.uri(), "token", "17841400000").unwrap();
    let err = client
        .list_recent(&AccountSpec::new("ghost"), &hint(), &Pacer::unpaced())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));
}

#[tokio::test]
async fn retry_after_header_is_carried_on_rate_limits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "7")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let client = InstagramClient::new(&server.uri(), "token", "17841400000").unwrap();
    let err = client
        .list_recent(&AccountSpec::new("acme"), &hint(), &Pacer::unpaced())
        .await
        .unwrap_err();
    match err {
        SourceError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(7)));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn instagram_detail_includes_carousel_children() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/555"))
        .and(query_param("access_token", "token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "555",
            "media_type": "CAROUSEL_ALBUM",
            "timestamp": "2024-06-14T10:00:00+0000",
            "children": { "data": [{ "id": "a" }, { "id": "b" }, { "id": "c" }] }
        })))
        .mount(&server)
        .await;

    let client = InstagramClient::new(&server.uri(), "token", "17841400000").unwrap();
    let detail = client
        .fetch_detail(&ItemRef::new("acme", "555"), &Pacer::unpaced())
        .await
        .unwrap();

    match detail {
        RawItem::Instagram(media) => {
            assert_eq!(media.children.map(|c| c.data.len()), Some(3));
        }
        other => panic!("expected an Instagram item, got {other:?}"),
    }
}

fn paced(client: impl SourceClient + 'static, request_ms: u64, media_ms: u64) -> GuardedSource {
    let pacing = PacingSettings {
        request_spacing_ms: request_ms,
        media_spacing_ms: media_ms,
        ..PacingSettings::default()
    };
    GuardedSource::new(
        Arc::new(client),
        &pacing,
        &RetrySettings::default(),
        CircuitBreaker::new(1, 0.5),
    )
}

#[tokio::test]
async fn guarded_listing_paces_every_page() {
    let server = MockServer::start().await;

    let pages = [
        ("media.limit(", "1", Some("CUR1")),
        ("media.after(CUR1)", "2", Some("CUR2")),
        ("media.after(CUR2)", "3", None),
    ];
    for (edge, id, next) in pages {
        let mut page = json!({
            "business_discovery": {
                "media": { "data": [media(id, "2024-06-14T10:00:00+0000")] }
            }
        });
        if let Some(cursor) = next {
            page["business_discovery"]["media"]["paging"] =
                json!({ "cursors": { "after": cursor } });
        }
        Mock::given(method("GET"))
            .and(query_param_contains("fields", edge))
            .respond_with(ResponseTemplate::new(200).set_body_json(page))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = InstagramClient::new(&server.uri(), "token", "17841400000").unwrap();
    let source = paced(client, 300, 0);

    let started = Instant::now();
    let items = source
        .list_recent(&AccountSpec::new("acme"), &hint())
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(source.pacer().requests().in_window(), 3);
    // 3 requests, 2 gaps.
    assert!(started.elapsed() >= Duration::from_millis(600));
}

// ============================================================
// YouTube Data API + captions
// ============================================================

async fn mount_channel(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/channels"))
        .and(query_param("forHandle", "@acmepod"))
        .and(query_param("key", "yt-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "contentDetails": { "relatedPlaylists": { "uploads": "UU123" } } }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn youtube_lists_uploads_in_playlist_order() {
    let server = MockServer::start().await;
    mount_channel(&server).await;

    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .and(query_param("playlistId", "UU123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "contentDetails": { "videoId": "v2", "videoPublishedAt": "2024-06-14T10:00:00Z" } },
                { "contentDetails": { "videoId": "v1", "videoPublishedAt": "2024-06-10T10:00:00Z" } }
            ]
        })))
        .mount(&server)
        .await;

    // The batch endpoint answers out of order.
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "v2,v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "v1",
                    "snippet": { "title": "Episode 1", "publishedAt": "2024-06-10T10:00:00Z" },
                    "contentDetails": { "duration": "PT58M3S" },
                    "statistics": { "viewCount": "1200", "commentCount": "8" }
                },
                {
                    "id": "v2",
                    "snippet": { "title": "Episode 2", "publishedAt": "2024-06-14T10:00:00Z" },
                    "contentDetails": { "duration": "PT1H2M" },
                    "statistics": { "viewCount": "300", "likeCount": "25", "commentCount": "4" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = YoutubeClient::new(&server.uri(), &server.uri(), "yt-key").unwrap();
    let items = client
        .list_recent(
            &AccountSpec::new("https://www.youtube.com/@acmepod"),
            &hint(),
            &Pacer::unpaced(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.source_id()).collect();
    assert_eq!(ids, vec!["v2", "v1"]);
    match &items[1] {
        RawItem::Youtube(video) => {
            assert_eq!(video.title, "Episode 1");
            assert_eq!(video.like_count, None);
            assert_eq!(video.duration.as_deref(), Some("PT58M3S"));
        }
        other => panic!("expected a YouTube item, got {other:?}"),
    }
}

#[tokio::test]
async fn youtube_quota_exhaustion_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "The request cannot be completed because you have exceeded your quota.",
                "errors": [{ "reason": "quotaExceeded", "domain": "youtube.quota" }]
            }
        })))
        .mount(&server)
        .await;

    let client = YoutubeClient::new(&server.uri(), &server.uri(), "yt-key").unwrap();
    let err = client
        .list_recent(&AccountSpec::new("@acmepod"), &hint(), &Pacer::unpaced())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::RateLimited { .. }));
}

#[tokio::test]
async fn youtube_unknown_channel_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let client = YoutubeClient::new(&server.uri(), &server.uri(), "yt-key").unwrap();
    let err = client
        .list_recent(&AccountSpec::new("@nobody"), &hint(), &Pacer::unpaced())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)));
}

#[tokio::test]
async fn captions_fall_back_through_languages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .and(query_param("v", "v1"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .and(query_param("v", "v1"))
        .and(query_param("lang", "en-US"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "WEBVTT\nKind: captions\nLanguage: en\n\n\
             00:00:00.000 --> 00:00:02.000\nwelcome back to the show\n\n\
             00:00:02.000 --> 00:00:04.000\n<c>today</c> we talk pricing\n",
        ))
        .mount(&server)
        .await;

    let caption_url = format!("{}/api/timedtext", server.uri());
    let client = YoutubeClient::new(&server.uri(), &caption_url, "yt-key").unwrap();
    let transcript = client
        .fetch_transcript(&ItemRef::new("@acmepod", "v1"), &Pacer::unpaced())
        .await
        .unwrap();

    assert_eq!(
        transcript.as_deref(),
        Some("welcome back to the show today we talk pricing")
    );
}

#[tokio::test]
async fn guarded_caption_attempts_are_paced_as_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(3)
        .mount(&server)
        .await;

    let caption_url = format!("{}/api/timedtext", server.uri());
    let client = YoutubeClient::new(&server.uri(), &caption_url, "yt-key").unwrap();
    let source = paced(client, 0, 250);

    let started = Instant::now();
    let transcript = source
        .fetch_transcript(&ItemRef::new("@acmepod", "v1"))
        .await
        .unwrap();

    assert_eq!(transcript, None);
    assert!(started.elapsed() >= Duration::from_millis(500));
}

// ============================================================
// Text services
// ============================================================

#[tokio::test]
async fn gemini_returns_the_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "  A focused episode on pricing.  " }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service =
        GeminiSummarizer::new(&server.uri(), Some("g-key".to_string()), None, 0).unwrap();
    let summary = service
        .summarize(&SummaryInput::Transcript("we talk pricing".to_string()))
        .await
        .unwrap();
    assert_eq!(summary, "A focused episode on pricing.");
}

#[tokio::test]
async fn gemini_error_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let service =
        GeminiSummarizer::new(&server.uri(), Some("g-key".to_string()), None, 0).unwrap();
    let err = service
        .summarize(&SummaryInput::Audio {
            url: "https://www.youtube.com/watch?v=v1".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TextServiceError::Unavailable(_)));
}

#[tokio::test]
async fn openai_sends_bearer_auth_and_returns_the_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer o-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Pricing, growth, churn." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = OpenAiSummarizer::new(
        &server.uri(),
        Some("o-key".to_string()),
        Some("gpt-4o-mini".to_string()),
        0,
    )
    .unwrap();
    let summary = service
        .summarize(&SummaryInput::Transcript("we talk pricing".to_string()))
        .await
        .unwrap();
    assert_eq!(summary, "Pricing, growth, churn.");
}

#[tokio::test]
async fn openai_empty_completion_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let service =
        OpenAiSummarizer::new(&server.uri(), Some("o-key".to_string()), None, 0).unwrap();
    let err = service
        .summarize(&SummaryInput::Transcript("we talk pricing".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, TextServiceError::Unavailable(_)));
}
