// Aggregator: drive every configured account through the pipeline and
// merge the results.
//
// Accounts run on a small `buffer_unordered` worker pool. All workers
// share one GuardedSource, so pacing and the circuit breaker are per
// source, not per worker. Per-account failures become account reports;
// nothing short of a config or write error escapes a run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::normalize::{normalize, parse_timestamp};
use super::summarize::{cap_episodes, order_episodes, Summarizer};
use super::window::{filter_keywords, filter_window, in_window, window_start};
use crate::config::Settings;
use crate::error::{NormalizeError, SourceError};
use crate::models::{
    AccountOutcome, AccountReport, AccountSpec, ContentItem, RankedItem, RunFlags, RunResult,
    RunStats, SkipReason, SourceKind,
};
use crate::scoring::engagement::rank_by_engagement;
use crate::sources::rate_limit::{CircuitBreaker, GuardedSource};
use crate::sources::traits::{ItemRef, LookbackHint, RawItem, SourceClient};
use crate::text::topics::TfIdfTopics;
use crate::text::traits::TextService;

/// Everything a run needs, resolved up front.
pub struct RunContext {
    pub source: Arc<dyn SourceClient>,
    /// Only consulted for sources that summarize.
    pub text_service: Option<Arc<dyn TextService>>,
    pub settings: Settings,
    pub accounts: Vec<AccountSpec>,
}

impl RunContext {
    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }
}

/// Progress callbacks for the CLI progress bar. Called from worker tasks.
pub trait RunObserver: Send + Sync {
    fn account_started(&self, _account: &AccountSpec) {}
    fn account_finished(&self, _report: &AccountReport) {}
}

pub struct NoopObserver;

impl RunObserver for NoopObserver {}

struct AccountRun {
    report: AccountReport,
    items: Vec<ContentItem>,
}

impl AccountRun {
    fn new(account: &AccountSpec, outcome: AccountOutcome, items: Vec<ContentItem>) -> Self {
        Self {
            report: AccountReport {
                account_id: account.id.clone(),
                display_name: account.display_name.clone(),
                outcome,
            },
            items,
        }
    }

    fn skipped(account: &AccountSpec, reason: SkipReason) -> Self {
        Self::new(account, AccountOutcome::Skipped { reason }, Vec::new())
    }

    fn failed(account: &AccountSpec, err: &SourceError) -> Self {
        Self::new(
            account,
            AccountOutcome::Failed {
                reason: err.reason(),
                message: err.to_string(),
            },
            Vec::new(),
        )
    }
}

/// Per-account view of the settings, shared by every worker.
struct AccountPlan<'a> {
    source: &'a GuardedSource,
    summarizer: Option<&'a Summarizer>,
    settings: &'a Settings,
    reference_time: DateTime<Utc>,
    hint: LookbackHint,
}

/// Run the pipeline across all accounts in `ctx`.
pub async fn aggregate(
    ctx: &RunContext,
    reference_time: DateTime<Utc>,
    observer: &dyn RunObserver,
) -> RunResult {
    let started = Instant::now();
    let settings = &ctx.settings;
    let kind = ctx.kind();

    let breaker = CircuitBreaker::new(ctx.accounts.len(), settings.circuit_breaker_fraction);
    let source = GuardedSource::new(
        Arc::clone(&ctx.source),
        &settings.pacing,
        &settings.retry,
        breaker,
    );

    let summarizer = match kind {
        SourceKind::Youtube => Some(Summarizer::new(
            ctx.text_service.clone(),
            Arc::new(TfIdfTopics::new(settings.max_topics)),
            settings.summarization_method,
        )),
        SourceKind::Instagram => None,
    };

    let since = window_start(reference_time, settings.window_days);
    let plan = AccountPlan {
        source: &source,
        summarizer: summarizer.as_ref(),
        settings,
        reference_time,
        hint: LookbackHint {
            since,
            max_items: settings.max_items_per_account,
        },
    };

    info!(
        source = %kind,
        accounts = ctx.accounts.len(),
        window_days = settings.window_days,
        concurrency = settings.concurrency,
        breaker_threshold = source.breaker().threshold(),
        "Starting analysis run"
    );

    let mut slots: Vec<Option<AccountRun>> = (0..ctx.accounts.len()).map(|_| None).collect();

    // Indexed, not iterated by reference: a `&AccountSpec` closure argument
    // breaks the Send bound on the run future.
    let accounts = &ctx.accounts;
    let runs = stream::iter(0..accounts.len())
        .map(|idx| {
            let plan = &plan;
            let account = &accounts[idx];
            async move {
                // buffer_unordered only polls this once a worker slot frees
                // up, so the breaker check happens right before the fetch.
                if plan.source.breaker().is_open() {
                    return (idx, AccountRun::skipped(account, SkipReason::CircuitOpen));
                }
                observer.account_started(account);
                (idx, process_account(plan, account).await)
            }
        })
        .buffer_unordered(settings.concurrency.max(1));
    tokio::pin!(runs);

    let deadline = tokio::time::sleep(Duration::from_secs(settings.run_timeout_secs));
    tokio::pin!(deadline);

    let mut timed_out = false;
    loop {
        tokio::select! {
            next = runs.next() => match next {
                Some((idx, run)) => {
                    observer.account_finished(&run.report);
                    slots[idx] = Some(run);
                }
                None => break,
            },
            _ = &mut deadline => {
                timed_out = true;
                warn!(
                    timeout_secs = settings.run_timeout_secs,
                    "Run timed out, keeping results collected so far"
                );
                break;
            }
        }
    }

    let mut reports = Vec::with_capacity(ctx.accounts.len());
    let mut merged: Vec<ContentItem> = Vec::new();
    for (account, slot) in ctx.accounts.iter().zip(slots) {
        let run = slot.unwrap_or_else(|| AccountRun::skipped(account, SkipReason::RunTimedOut));
        merged.extend(run.items);
        reports.push(run.report);
    }

    let (merged, duplicates_removed) = dedup_by_source_id(merged);

    let items = match kind {
        SourceKind::Instagram => rank_by_engagement(merged, settings.top_k),
        SourceKind::Youtube => {
            let mut episodes = merged;
            order_episodes(&mut episodes);
            episodes
                .into_iter()
                .enumerate()
                .map(|(i, item)| RankedItem {
                    rank: i + 1,
                    score: None,
                    item,
                })
                .collect()
        }
    };

    let flags = RunFlags {
        breaker_tripped: source.breaker().is_open(),
        timed_out,
        duplicates_removed,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    let stats = RunStats::compute(reports, &items, flags);

    info!(
        source = %kind,
        status = %stats.status,
        attempted = stats.accounts_attempted,
        succeeded = stats.accounts_succeeded,
        failed = stats.accounts_failed,
        skipped = stats.accounts_skipped,
        items = stats.items_emitted,
        duration_ms = stats.duration_ms,
        "Analysis run finished"
    );

    RunResult {
        source: kind,
        reference_time,
        window_days: settings.window_days,
        window_start: since,
        items,
        stats,
    }
}

/// Fetch, normalize, filter and (for episodes) summarize one account.
async fn process_account(plan: &AccountPlan<'_>, account: &AccountSpec) -> AccountRun {
    let raw_items = match plan.source.list_recent(account, &plan.hint).await {
        Ok(items) => items,
        Err(err) => {
            warn!(account = %account.id, error = %err, "Account failed");
            if plan.source.record_failure(&err) {
                warn!(
                    rate_limited = plan.source.breaker().rate_limited_count(),
                    "Circuit breaker tripped, remaining accounts will be skipped"
                );
            }
            return AccountRun::failed(account, &err);
        }
    };

    let items_considered = raw_items.len();
    let mut items_dropped = 0usize;
    let mut items = Vec::with_capacity(raw_items.len());

    for raw in &raw_items {
        match normalize(&account.id, raw) {
            Ok(item) => items.push(item),
            Err(NormalizeError::MissingSlideCount { .. }) if worth_detail_fetch(plan, raw) => {
                match fetch_and_normalize(plan, account, raw).await {
                    Some(item) => items.push(item),
                    None => items_dropped += 1,
                }
            }
            Err(err) => {
                debug!(account = %account.id, error = %err, "Dropping item");
                items_dropped += 1;
            }
        }
    }

    let items = filter_window(items, plan.reference_time, plan.settings.window_days);
    let items = filter_keywords(items, &account.keywords);
    let items_retained = items.len();

    let items = match plan.summarizer {
        Some(summarizer) => {
            let episodes = cap_episodes(items, plan.settings.max_episodes_per_account);
            let mut summarized = Vec::with_capacity(episodes.len());
            for episode in episodes {
                summarized.push(summarizer.summarize(plan.source, episode).await);
            }
            summarized
        }
        None => items,
    };

    info!(
        account = %account.id,
        considered = items_considered,
        dropped = items_dropped,
        retained = items_retained,
        "Account processed"
    );

    AccountRun::new(
        account,
        AccountOutcome::Succeeded {
            items_considered,
            items_dropped,
            items_retained,
        },
        items,
    )
}

/// Only chase the slide count of carousels that could still land in the
/// window.
fn worth_detail_fetch(plan: &AccountPlan<'_>, raw: &RawItem) -> bool {
    raw.published_raw()
        .and_then(parse_timestamp)
        .is_some_and(|ts| in_window(ts, plan.reference_time, plan.settings.window_days))
}

/// One detail fetch for an item the listing left incomplete.
async fn fetch_and_normalize(
    plan: &AccountPlan<'_>,
    account: &AccountSpec,
    raw: &RawItem,
) -> Option<ContentItem> {
    let item_ref = ItemRef::new(&account.id, raw.source_id());
    match plan.source.fetch_detail(&item_ref).await {
        Ok(detail) => match normalize(&account.id, &detail) {
            Ok(item) => Some(item),
            Err(err) => {
                debug!(account = %account.id, error = %err, "Dropping item after detail fetch");
                None
            }
        },
        Err(err) => {
            debug!(account = %account.id, error = %err, "Detail fetch failed, dropping item");
            None
        }
    }
}

/// Keep the first occurrence of each `source_id` (in account order) and
/// report how many repeats were removed.
fn dedup_by_source_id(items: Vec<ContentItem>) -> (Vec<ContentItem>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    let before = items.len();
    let kept: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.source_id.clone()))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, Metrics};

    fn item(id: &str, account: &str) -> ContentItem {
        ContentItem {
            source_id: id.to_string(),
            account_id: account.to_string(),
            published_at: Utc::now(),
            kind: ContentKind::Photo,
            url: String::new(),
            caption_or_title: String::new(),
            metrics: Metrics::new(),
            media_count: 1,
            duration_secs: None,
            text_content: None,
            topics: Vec::new(),
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let items = vec![item("1", "a"), item("2", "a"), item("1", "b"), item("3", "b")];
        let (kept, removed) = dedup_by_source_id(items);
        assert_eq!(removed, 1);
        let ids: Vec<(&str, &str)> = kept
            .iter()
            .map(|i| (i.source_id.as_str(), i.account_id.as_str()))
            .collect();
        assert_eq!(ids, vec![("1", "a"), ("2", "a"), ("3", "b")]);
    }
}
