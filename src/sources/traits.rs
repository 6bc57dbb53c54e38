// Source client trait — the swap-ready abstraction over content platforms.
//
// Clients list an account's recent items and fetch single items in detail.
// They never filter by date themselves: the lookback hint only tells them
// when it's safe to stop paginating.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::instagram::InstagramMedia;
use super::rate_limit::Pacer;
use super::youtube::YoutubeVideo;
use crate::error::SourceError;
use crate::models::{AccountSpec, SourceKind};

/// Advisory bounds for a listing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackHint {
    /// Items older than this are not needed (clients may still return some).
    pub since: DateTime<Utc>,
    /// Rough upper bound on how many items to list.
    pub max_items: usize,
}

/// Reference to one item for detail or transcript lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub account_id: String,
    pub source_id: String,
}

impl ItemRef {
    pub fn new(account_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            source_id: source_id.into(),
        }
    }
}

/// An item exactly as its source described it. Kept separate from the
/// normalized `ContentItem` so raw payloads can be inspected when
/// normalization goes wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum RawItem {
    Instagram(InstagramMedia),
    Youtube(YoutubeVideo),
}

impl RawItem {
    pub fn source_id(&self) -> &str {
        match self {
            RawItem::Instagram(media) => &media.id,
            RawItem::Youtube(video) => &video.video_id,
        }
    }

    /// The raw publish timestamp string, if the source sent one.
    pub fn published_raw(&self) -> Option<&str> {
        match self {
            RawItem::Instagram(media) => media.timestamp.as_deref(),
            RawItem::Youtube(video) => video.published_at.as_deref(),
        }
    }
}

/// Trait for fetching content from one platform. Implementations are async
/// because every platform is an HTTP API, and must wait on `pacer` before
/// each request they send.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// List an account's recent items in the order the source reports them
    /// (newest first for both supported platforms).
    async fn list_recent(
        &self,
        account: &AccountSpec,
        hint: &LookbackHint,
        pacer: &Pacer,
    ) -> Result<Vec<RawItem>, SourceError>;

    /// Fetch one item with all fields, for when the listing left some out.
    async fn fetch_detail(&self, item: &ItemRef, pacer: &Pacer) -> Result<RawItem, SourceError>;

    /// Fetch the platform's transcript for an item. `Ok(None)` means the
    /// platform has none (or none in a supported language).
    async fn fetch_transcript(
        &self,
        _item: &ItemRef,
        _pacer: &Pacer,
    ) -> Result<Option<String>, SourceError> {
        Ok(None)
    }
}
