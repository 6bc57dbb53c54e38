// Instagram source client, backed by the Graph API `business_discovery` edge.
//
// business_discovery lets a business account read the public media of
// another business or creator account by username. Listings are paginated
// with an `after` cursor; we stop as soon as a page reaches past the
// lookback hint or the item cap.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{classify_status, snippet, ApiClient};
use super::rate_limit::Pacer;
use super::traits::{ItemRef, LookbackHint, RawItem, SourceClient};
use crate::error::SourceError;
use crate::models::{AccountSpec, SourceKind};
use crate::pipeline::normalize::parse_timestamp;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v21.0";

/// Fields requested for every media object.
const MEDIA_FIELDS: &str = "id,caption,media_type,media_product_type,timestamp,permalink,\
like_count,comments_count,children{id,media_type}";

/// Graph API caps page size at 100; smaller pages waste fewer fetches on
/// accounts that post rarely.
const PAGE_SIZE: usize = 25;

/// One media object as the Graph API returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstagramMedia {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    /// IMAGE, VIDEO or CAROUSEL_ALBUM.
    #[serde(default)]
    pub media_type: Option<String>,
    /// FEED, REELS, STORY, AD.
    #[serde(default)]
    pub media_product_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    /// Missing when the owner hides like counts.
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comments_count: Option<u64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub children: Option<MediaChildren>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaChildren {
    #[serde(default)]
    pub data: Vec<MediaChild>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaChild {
    pub id: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    business_discovery: Discovery,
}

#[derive(Debug, Deserialize)]
struct Discovery {
    #[serde(default)]
    media: Option<MediaPage>,
}

#[derive(Debug, Deserialize)]
struct MediaPage {
    #[serde(default)]
    data: Vec<InstagramMedia>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    cursors: Option<Cursors>,
}

#[derive(Debug, Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

pub struct InstagramClient {
    api: ApiClient,
    access_token: String,
    business_account_id: String,
}

impl InstagramClient {
    pub fn new(
        graph_url: &str,
        access_token: &str,
        business_account_id: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api: ApiClient::new(graph_url)?,
            access_token: access_token.to_string(),
            business_account_id: business_account_id.to_string(),
        })
    }

    async fn fetch_page(
        &self,
        pacer: &Pacer,
        username: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<MediaPage, SourceError> {
        let media_edge = match after {
            Some(cursor) => format!("media.after({cursor}).limit({limit})"),
            None => format!("media.limit({limit})"),
        };
        let fields = format!("business_discovery.username({username}){{{media_edge}{{{MEDIA_FIELDS}}}}}");
        let path = format!("/{}", self.business_account_id);

        let response: DiscoveryResponse = self
            .api
            .get_json(
                pacer.requests(),
                &path,
                &[
                    ("fields", fields.as_str()),
                    ("access_token", self.access_token.as_str()),
                ],
                classify_graph_error,
            )
            .await?;

        Ok(response.business_discovery.media.unwrap_or(MediaPage {
            data: Vec::new(),
            paging: None,
        }))
    }
}

#[async_trait]
impl SourceClient for InstagramClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Instagram
    }

    async fn list_recent(
        &self,
        account: &AccountSpec,
        hint: &LookbackHint,
        pacer: &Pacer,
    ) -> Result<Vec<RawItem>, SourceError> {
        let mut items: Vec<RawItem> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let remaining = hint.max_items.saturating_sub(items.len());
            if remaining == 0 {
                break;
            }

            let page = self
                .fetch_page(
                    pacer,
                    &account.id,
                    cursor.as_deref(),
                    remaining.min(PAGE_SIZE),
                )
                .await?;

            let reached_window_start = page
                .data
                .last()
                .and_then(|m| m.timestamp.as_deref())
                .and_then(parse_timestamp)
                .is_some_and(|ts| ts < hint.since);
            let page_len = page.data.len();

            items.extend(page.data.into_iter().map(RawItem::Instagram));

            debug!(
                account = %account.id,
                page_items = page_len,
                total = items.len(),
                "Fetched Instagram media page"
            );

            cursor = page.paging.and_then(|p| p.cursors).and_then(|c| c.after);
            if reached_window_start || page_len == 0 || cursor.is_none() {
                break;
            }
        }

        items.truncate(hint.max_items);
        Ok(items)
    }

    async fn fetch_detail(&self, item: &ItemRef, pacer: &Pacer) -> Result<RawItem, SourceError> {
        let path = format!("/{}", item.source_id);
        let media: InstagramMedia = self
            .api
            .get_json(
                pacer.requests(),
                &path,
                &[
                    ("fields", MEDIA_FIELDS),
                    ("access_token", self.access_token.as_str()),
                ],
                classify_graph_error,
            )
            .await?;
        Ok(RawItem::Instagram(media))
    }
}

/// Map a Graph API error body onto the source error taxonomy. Graph reports
/// most failures as HTTP 400 with a numeric code, so the status alone says
/// little.
pub fn classify_graph_error(status: StatusCode, body: &str) -> SourceError {
    let Ok(parsed) = serde_json::from_str::<GraphErrorBody>(body) else {
        return classify_status(status, body);
    };
    let GraphError { message, code } = parsed.error;
    let message = format!("graph error {code}: {}", snippet(&message));

    match code {
        // Application, user and page-level throttling.
        4 | 17 | 32 | 613 => SourceError::rate_limited(message),
        // Permission errors and expired tokens.
        10 | 190 | 200..=299 => SourceError::AccessDenied(message),
        // Unknown username, bad object id.
        24 | 100 | 110 | 803 => SourceError::NotFound(message),
        // Unknown and temporary service errors.
        1 | 2 => SourceError::Transient(message),
        _ => match classify_status(status, body) {
            SourceError::Transient(_) => SourceError::Transient(message),
            other => other,
        },
    }
}
