// YouTube source client, backed by the Data API v3 and the timed-text
// caption endpoint.
//
// Listing a channel takes three calls: resolve the channel to its uploads
// playlist, page through the playlist, then batch-fetch statistics and
// durations for the listed videos.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{classify_status, snippet, ApiClient};
use super::rate_limit::Pacer;
use super::traits::{ItemRef, LookbackHint, RawItem, SourceClient};
use crate::error::SourceError;
use crate::models::{AccountSpec, SourceKind};
use crate::pipeline::normalize::parse_timestamp;

pub const DEFAULT_DATA_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_CAPTION_URL: &str = "https://www.youtube.com/api/timedtext";

/// Caption languages tried in order.
const CAPTION_LANGUAGES: [&str; 3] = ["en", "en-US", "en-GB"];

/// Data API maximum for `maxResults` and for ids per `videos` call.
const PAGE_SIZE: usize = 50;

/// One video as we keep it: snippet, content details and statistics
/// flattened. The Data API sends counts as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YoutubeVideo {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_at: Option<String>,
    /// ISO-8601 duration, e.g. `PT1H2M3S`.
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub view_count: Option<String>,
    /// Absent when the channel hides likes.
    #[serde(default)]
    pub like_count: Option<String>,
    #[serde(default)]
    pub comment_count: Option<String>,
}

/// How a configured channel reference is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Handle(String),
    Username(String),
}

impl ChannelRef {
    fn query(&self) -> (&'static str, &str) {
        match self {
            ChannelRef::Id(id) => ("id", id),
            ChannelRef::Handle(handle) => ("forHandle", handle),
            ChannelRef::Username(name) => ("forUsername", name),
        }
    }
}

fn channel_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"youtube\.com/(channel/|@|c/|user/)([A-Za-z0-9_.\-]+)")
            .expect("channel URL regex is valid")
    })
}

/// Resolve a channel URL, `@handle`, or bare channel id.
///
/// Legacy `/c/name` custom URLs have no API lookup of their own; they
/// almost always match the channel's handle, so they resolve as one.
pub fn parse_channel_ref(raw: &str) -> Option<ChannelRef> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(caps) = channel_url_regex().captures(raw) {
        let value = caps[2].to_string();
        return Some(match &caps[1] {
            "channel/" => ChannelRef::Id(value),
            "user/" => ChannelRef::Username(value),
            _ => ChannelRef::Handle(format!("@{value}")),
        });
    }

    if raw.contains('/') {
        return None;
    }
    if let Some(handle) = raw.strip_prefix('@') {
        return (!handle.is_empty()).then(|| ChannelRef::Handle(raw.to_string()));
    }
    if raw.starts_with("UC") && raw.len() == 24 {
        return Some(ChannelRef::Id(raw.to_string()));
    }
    Some(ChannelRef::Handle(format!("@{raw}")))
}

// ── Data API response shapes ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Channel {
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
    #[serde(default)]
    video_published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Video {
    id: String,
    #[serde(default)]
    snippet: Option<VideoSnippet>,
    #[serde(default)]
    content_details: Option<VideoContentDetails>,
    #[serde(default)]
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    #[serde(default)]
    view_count: Option<String>,
    #[serde(default)]
    like_count: Option<String>,
    #[serde(default)]
    comment_count: Option<String>,
}

impl From<Video> for YoutubeVideo {
    fn from(video: Video) -> Self {
        let snippet = video.snippet;
        let stats = video.statistics;
        let (title, description, published_at) = match snippet {
            Some(s) => (s.title, s.description, s.published_at),
            None => (String::new(), String::new(), None),
        };
        let (view_count, like_count, comment_count) = match stats {
            Some(s) => (s.view_count, s.like_count, s.comment_count),
            None => (None, None, None),
        };
        YoutubeVideo {
            video_id: video.id,
            title,
            description,
            published_at,
            duration: video.content_details.and_then(|d| d.duration),
            view_count,
            like_count,
            comment_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

// ── Client ──────────────────────────────────────────────────────────

pub struct YoutubeClient {
    api: ApiClient,
    captions: ApiClient,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(data_api_url: &str, caption_url: &str, api_key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(data_api_url)?,
            captions: ApiClient::new(caption_url)?,
            api_key: api_key.to_string(),
        })
    }

    async fn uploads_playlist(
        &self,
        pacer: &Pacer,
        channel: &ChannelRef,
    ) -> Result<String, SourceError> {
        let (key, value) = channel.query();
        let response: ListResponse<Channel> = self
            .api
            .get_json(
                pacer.requests(),
                "/channels",
                &[
                    ("part", "contentDetails"),
                    (key, value),
                    ("key", self.api_key.as_str()),
                ],
                classify_youtube_error,
            )
            .await?;

        response
            .items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| SourceError::NotFound(format!("no channel matches {value}")))
    }

    async fn videos(
        &self,
        pacer: &Pacer,
        ids: &[String],
    ) -> Result<Vec<YoutubeVideo>, SourceError> {
        let mut videos = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(PAGE_SIZE) {
            let joined = chunk.join(",");
            let response: ListResponse<Video> = self
                .api
                .get_json(
                    pacer.requests(),
                    "/videos",
                    &[
                        ("part", "snippet,contentDetails,statistics"),
                        ("id", joined.as_str()),
                        ("key", self.api_key.as_str()),
                    ],
                    classify_youtube_error,
                )
                .await?;

            // The batch endpoint doesn't promise input order.
            let mut by_id: Vec<YoutubeVideo> =
                response.items.into_iter().map(YoutubeVideo::from).collect();
            for id in chunk {
                if let Some(pos) = by_id.iter().position(|v| &v.video_id == id) {
                    videos.push(by_id.swap_remove(pos));
                }
            }
        }
        Ok(videos)
    }
}

#[async_trait]
impl SourceClient for YoutubeClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Youtube
    }

    async fn list_recent(
        &self,
        account: &AccountSpec,
        hint: &LookbackHint,
        pacer: &Pacer,
    ) -> Result<Vec<RawItem>, SourceError> {
        let channel = parse_channel_ref(&account.id).ok_or_else(|| {
            SourceError::NotFound(format!("unrecognized channel reference {}", account.id))
        })?;
        let playlist = self.uploads_playlist(pacer, &channel).await?;

        let mut ids: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let max_results = hint.max_items.saturating_sub(ids.len()).min(PAGE_SIZE);
            if max_results == 0 {
                break;
            }
            let max_results = max_results.to_string();
            let mut params = vec![
                ("part", "contentDetails"),
                ("playlistId", playlist.as_str()),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page: ListResponse<PlaylistItem> = self
                .api
                .get_json(
                    pacer.requests(),
                    "/playlistItems",
                    &params,
                    classify_youtube_error,
                )
                .await?;

            let reached_window_start = page
                .items
                .last()
                .and_then(|i| i.content_details.video_published_at.as_deref())
                .and_then(parse_timestamp)
                .is_some_and(|ts| ts < hint.since);
            let page_len = page.items.len();
            ids.extend(page.items.into_iter().map(|i| i.content_details.video_id));

            page_token = page.next_page_token;
            if reached_window_start || page_len == 0 || page_token.is_none() {
                break;
            }
        }
        ids.truncate(hint.max_items);

        debug!(channel = %account.id, videos = ids.len(), "Listed YouTube uploads");

        let videos = self.videos(pacer, &ids).await?;
        Ok(videos.into_iter().map(RawItem::Youtube).collect())
    }

    async fn fetch_detail(&self, item: &ItemRef, pacer: &Pacer) -> Result<RawItem, SourceError> {
        self.videos(pacer, std::slice::from_ref(&item.source_id))
            .await?
            .into_iter()
            .next()
            .map(RawItem::Youtube)
            .ok_or_else(|| SourceError::NotFound(format!("video {} not found", item.source_id)))
    }

    /// Each language attempt is a separate media download.
    async fn fetch_transcript(
        &self,
        item: &ItemRef,
        pacer: &Pacer,
    ) -> Result<Option<String>, SourceError> {
        for lang in CAPTION_LANGUAGES {
            let body = self
                .captions
                .get_text(
                    pacer.media(),
                    "",
                    &[("v", item.source_id.as_str()), ("lang", lang), ("fmt", "vtt")],
                    classify_status,
                )
                .await?;

            let text = parse_vtt(&body);
            if !text.is_empty() {
                debug!(video = %item.source_id, lang = lang, chars = text.len(), "Fetched captions");
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}

/// Map a Data API error body onto the source error taxonomy. Quota
/// exhaustion arrives as a 403, same as a genuine permission problem, so
/// the reason string decides.
pub fn classify_youtube_error(status: StatusCode, body: &str) -> SourceError {
    let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) else {
        return classify_status(status, body);
    };
    let reason = parsed
        .error
        .errors
        .first()
        .map(|e| e.reason.as_str())
        .unwrap_or_default();
    let message = format!("{reason}: {}", snippet(&parsed.error.message));

    match reason {
        "quotaExceeded" | "rateLimitExceeded" | "userRateLimitExceeded" | "dailyLimitExceeded" => {
            SourceError::rate_limited(message)
        }
        "channelNotFound" | "playlistNotFound" | "videoNotFound" => SourceError::NotFound(message),
        "forbidden" | "channelClosed" | "channelSuspended" | "playlistItemsNotAccessible" => {
            SourceError::AccessDenied(message)
        }
        _ => match classify_status(status, body) {
            SourceError::RateLimited { .. } => SourceError::rate_limited(message),
            SourceError::NotFound(_) => SourceError::NotFound(message),
            SourceError::AccessDenied(_) => SourceError::AccessDenied(message),
            SourceError::Transient(_) => SourceError::Transient(message),
        },
    }
}

fn vtt_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"))
}

/// Flatten a WebVTT document to plain text.
///
/// Drops the header, NOTE blocks, cue identifiers and timing lines, and
/// inline tags. Auto-generated captions repeat each line across rolling
/// cues, so consecutive duplicates are collapsed.
pub fn parse_vtt(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_note = false;
    let mut in_header = true;

    for raw in vtt.lines() {
        let line = raw.trim();

        if line.is_empty() {
            in_note = false;
            in_header = false;
            continue;
        }
        if in_header || in_note {
            continue;
        }
        if line.starts_with("NOTE") {
            in_note = true;
            continue;
        }
        if line.starts_with("WEBVTT") {
            in_header = true;
            continue;
        }
        if line.contains("-->") {
            continue;
        }
        // Numeric cue identifiers.
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let text = vtt_tag_regex().replace_all(line, "");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if lines.last().map(String::as_str) != Some(text) {
            lines.push(text.to_string());
        }
    }

    lines.join(" ")
}
