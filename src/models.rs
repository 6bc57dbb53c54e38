// Core data model — account specs, normalized content items, run results.
//
// Raw source records live in `sources::traits::RawItem`; everything in this
// module is the source-independent shape that flows through the pipeline
// and ends up in the persisted artifact.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which platform a run pulls content from. Also selects the ranking policy:
/// Instagram items are engagement-ranked, YouTube episodes are summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Instagram,
    Youtube,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Instagram => "instagram",
            SourceKind::Youtube => "youtube",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instagram" | "ig" => Ok(SourceKind::Instagram),
            "youtube" | "yt" => Ok(SourceKind::Youtube),
            other => Err(format!(
                "unknown source '{other}' (expected 'instagram' or 'youtube')"
            )),
        }
    }
}

/// One configured competitor identity.
///
/// The aliases accept the older channel-file layout (`name`, `url`,
/// `search_terms`) so existing config files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSpec {
    /// Handle (`nike`) or channel URL (`https://www.youtube.com/@nike`).
    #[serde(alias = "url", alias = "handle")]
    pub id: String,
    /// When non-empty, only items whose caption/title mentions one of these
    /// keywords (case-insensitive) are kept.
    #[serde(default, alias = "search_terms", skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl AccountSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            keywords: Vec::new(),
            display_name: None,
        }
    }

    /// Human-readable label for logs and terminal output.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Photo,
    Video,
    Carousel,
    PodcastEpisode,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Photo => "Photo",
            ContentKind::Video => "Video",
            ContentKind::Carousel => "Carousel",
            ContentKind::PodcastEpisode => "Episode",
        }
    }
}

/// Named engagement counters. Ordered so the serialized metrics map has a
/// stable key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricName {
    Likes,
    Comments,
    Views,
}

/// Metric values keyed by name. `None` means the source tracks the metric
/// for this kind but did not disclose it (e.g. hidden like counts). That
/// is "unknown", not zero. Metrics the source never reports are absent.
pub type Metrics = BTreeMap<MetricName, Option<u64>>;

/// Summary text attached to podcast episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TextContent {
    Available { summary: String },
    Unknown { reason: String },
}

impl TextContent {
    pub fn unknown(reason: impl Into<String>) -> Self {
        TextContent::Unknown {
            reason: reason.into(),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, TextContent::Available { .. })
    }
}

/// A normalized post or episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub source_id: String,
    pub account_id: String,
    pub published_at: DateTime<Utc>,
    pub kind: ContentKind,
    pub url: String,
    pub caption_or_title: String,
    pub metrics: Metrics,
    /// Number of media attachments; greater than 1 only for carousels.
    pub media_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

impl ContentItem {
    /// The value of a metric, or `None` when absent or unknown.
    pub fn metric(&self, name: MetricName) -> Option<u64> {
        self.metrics.get(&name).copied().flatten()
    }

    pub fn has_unknown_metrics(&self) -> bool {
        self.metrics.values().any(Option::is_none)
    }
}

/// A Content Item in its final position in the Run Result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    /// 1-based position in the result.
    pub rank: usize,
    /// Engagement score; absent for summarized episodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
    #[serde(flatten)]
    pub item: ContentItem,
}

/// Why an account produced no items. Reason codes are part of the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    AccountNotFound,
    AccountAccessDenied,
    AccountRateLimited,
    AccountTransientFailure,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::AccountNotFound => "account_not_found",
            FailureReason::AccountAccessDenied => "account_access_denied",
            FailureReason::AccountRateLimited => "account_rate_limited",
            FailureReason::AccountTransientFailure => "account_transient_failure",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why an account was never fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The circuit breaker tripped before this account started.
    CircuitOpen,
    /// The run-level timeout fired before this account finished.
    RunTimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccountOutcome {
    Succeeded {
        /// Raw items the source returned.
        items_considered: usize,
        /// Items that failed normalization (no publish date, unknown slide count).
        items_dropped: usize,
        /// Items left after the window and keyword filters.
        items_retained: usize,
    },
    Failed {
        reason: FailureReason,
        message: String,
    },
    Skipped {
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReport {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub outcome: AccountOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every configured account was attempted.
    Complete,
    /// The run timed out; results hold what finished in time.
    Partial,
    /// The source blocked a significant fraction of accounts.
    Degraded,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Complete => f.write_str("complete"),
            RunStatus::Partial => f.write_str("partial"),
            RunStatus::Degraded => f.write_str("degraded"),
        }
    }
}

/// Dashboard-style statistics over the emitted items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub photo_count: usize,
    pub video_count: usize,
    pub carousel_count: usize,
    pub episode_count: usize,
    pub average_engagement: u64,
    pub top_engagement: u64,
    pub total_views: u64,
    pub total_duration_secs: u64,
    pub summaries_unavailable: usize,
}

impl ContentSummary {
    pub fn from_items(items: &[RankedItem]) -> Self {
        let mut summary = ContentSummary::default();
        let mut engagement_total = 0u64;
        let mut scored = 0u64;

        for ranked in items {
            let item = &ranked.item;
            match item.kind {
                ContentKind::Photo => summary.photo_count += 1,
                ContentKind::Video => summary.video_count += 1,
                ContentKind::Carousel => summary.carousel_count += 1,
                ContentKind::PodcastEpisode => summary.episode_count += 1,
            }
            if let Some(score) = ranked.score {
                engagement_total = engagement_total.saturating_add(score);
                scored += 1;
                summary.top_engagement = summary.top_engagement.max(score);
            }
            summary.total_views = summary
                .total_views
                .saturating_add(item.metric(MetricName::Views).unwrap_or(0));
            summary.total_duration_secs = summary
                .total_duration_secs
                .saturating_add(item.duration_secs.unwrap_or(0));
            if item.text_content.as_ref().is_some_and(|t| !t.is_known()) {
                summary.summaries_unavailable += 1;
            }
        }

        if scored > 0 {
            // Round half up, as the dashboard always displayed it.
            summary.average_engagement = engagement_total.saturating_add(scored / 2) / scored;
        }
        summary
    }
}

/// Per-run counters and per-account outcomes. Every number here is derived
/// from the account reports and emitted items by [`RunStats::compute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub status: RunStatus,
    pub accounts_attempted: usize,
    pub accounts_succeeded: usize,
    pub accounts_failed: usize,
    pub accounts_skipped: usize,
    pub failures_by_reason: BTreeMap<FailureReason, usize>,
    pub accounts: Vec<AccountReport>,
    pub items_considered: usize,
    pub items_dropped: usize,
    pub items_retained: usize,
    pub duplicates_removed: usize,
    pub items_emitted: usize,
    pub duration_ms: u64,
    pub summary: ContentSummary,
}

/// Run-level facts the account reports alone can't express.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    pub breaker_tripped: bool,
    pub timed_out: bool,
    pub duplicates_removed: usize,
    pub duration_ms: u64,
}

impl RunStats {
    pub fn compute(accounts: Vec<AccountReport>, items: &[RankedItem], flags: RunFlags) -> Self {
        let mut stats = RunStats {
            status: if flags.breaker_tripped {
                RunStatus::Degraded
            } else if flags.timed_out {
                RunStatus::Partial
            } else {
                RunStatus::Complete
            },
            accounts_attempted: 0,
            accounts_succeeded: 0,
            accounts_failed: 0,
            accounts_skipped: 0,
            failures_by_reason: BTreeMap::new(),
            accounts: Vec::new(),
            items_considered: 0,
            items_dropped: 0,
            items_retained: 0,
            duplicates_removed: flags.duplicates_removed,
            items_emitted: items.len(),
            duration_ms: flags.duration_ms,
            summary: ContentSummary::from_items(items),
        };

        for report in &accounts {
            match &report.outcome {
                AccountOutcome::Succeeded {
                    items_considered,
                    items_dropped,
                    items_retained,
                } => {
                    stats.accounts_attempted += 1;
                    stats.accounts_succeeded += 1;
                    stats.items_considered += items_considered;
                    stats.items_dropped += items_dropped;
                    stats.items_retained += items_retained;
                }
                AccountOutcome::Failed { reason, .. } => {
                    stats.accounts_attempted += 1;
                    stats.accounts_failed += 1;
                    *stats.failures_by_reason.entry(*reason).or_insert(0) += 1;
                }
                AccountOutcome::Skipped { .. } => stats.accounts_skipped += 1,
            }
        }

        stats.accounts = accounts;
        stats
    }
}

/// Everything one run produces: the ordered items plus their statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub source: SourceKind,
    pub reference_time: DateTime<Utc>,
    pub window_days: u32,
    pub window_start: DateTime<Utc>,
    pub items: Vec<RankedItem>,
    pub stats: RunStats,
}
