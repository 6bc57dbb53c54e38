// Colored terminal output for run results and configured accounts.
//
// This module handles all terminal-specific formatting. The main.rs
// command handlers delegate here.

use colored::Colorize;

use crate::config::AnalysisConfig;
use crate::models::{
    AccountOutcome, AccountReport, MetricName, RankedItem, RunResult, RunStatus, SourceKind,
    TextContent,
};

/// Display a full run result: items, account outcomes, and summary stats.
pub fn display_run_result(result: &RunResult) {
    let title = match result.source {
        SourceKind::Instagram => "Top Posts",
        SourceKind::Youtube => "Podcast Episodes",
    };
    println!(
        "\n{}",
        format!(
            "=== {} ({} items, {} days to {}) ===",
            title,
            result.items.len(),
            result.window_days,
            result.reference_time.format("%Y-%m-%d %H:%M UTC")
        )
        .bold()
    );
    println!();

    if result.items.is_empty() {
        println!("  No items in the window.");
    } else {
        match result.source {
            SourceKind::Instagram => display_ranked_posts(&result.items),
            SourceKind::Youtube => display_episodes(&result.items),
        }
    }

    display_accounts_outcome(&result.stats.accounts);
    display_stats(result);
}

fn display_ranked_posts(items: &[RankedItem]) {
    println!(
        "  {:>4}  {:<24} {:<9} {:>8} {:>8} {:>8} {:>9}  {}",
        "Rank".dimmed(),
        "Account".dimmed(),
        "Kind".dimmed(),
        "Likes".dimmed(),
        "Comments".dimmed(),
        "Views".dimmed(),
        "Score".dimmed(),
        "Caption".dimmed(),
    );
    println!("  {}", "-".repeat(100).dimmed());

    for ranked in items {
        let item = &ranked.item;
        let kind = if item.media_count > 1 {
            format!("{} x{}", item.kind.label(), item.media_count)
        } else {
            item.kind.label().to_string()
        };
        let caption = super::truncate_chars(&item.caption_or_title.replace('\n', " "), 40);
        println!(
            "  {:>4}. @{:<22} {:<9} {:>8} {:>8} {:>8} {:>9}  {}",
            ranked.rank,
            item.account_id,
            kind,
            metric_cell(ranked, MetricName::Likes),
            metric_cell(ranked, MetricName::Comments),
            metric_cell(ranked, MetricName::Views),
            ranked.score.unwrap_or(0).to_string().bold(),
            caption.dimmed(),
        );
    }
    if items.iter().any(|r| r.item.has_unknown_metrics()) {
        println!(
            "  {}",
            "? = hidden by the account owner, left out of the score".dimmed()
        );
    }
    println!();
}

/// "?" for unknown, "-" for metrics the kind doesn't track.
fn metric_cell(ranked: &RankedItem, name: MetricName) -> String {
    match ranked.item.metrics.get(&name) {
        Some(Some(value)) => value.to_string(),
        Some(None) => "?".to_string(),
        None => "-".to_string(),
    }
}

fn display_episodes(items: &[RankedItem]) {
    for ranked in items {
        let item = &ranked.item;
        println!(
            "  {}. {}  {}",
            ranked.rank,
            item.caption_or_title.bold(),
            item.published_at.format("%Y-%m-%d").to_string().dimmed()
        );
        println!("     {} · {}", item.account_id, item.url.dimmed());
        if let Some(secs) = item.duration_secs {
            println!("     Duration: {}", format_duration(secs));
        }
        match &item.text_content {
            Some(TextContent::Available { summary }) => {
                let preview = super::truncate_chars(&summary.replace('\n', " "), 300);
                println!("     {}", preview);
            }
            Some(TextContent::Unknown { reason }) => {
                println!("     {} {}", "Summary unavailable:".yellow(), reason.dimmed());
            }
            None => {}
        }
        if !item.topics.is_empty() {
            println!("     Topics: {}", item.topics.join(", ").cyan());
        }
        println!();
    }
}

fn display_accounts_outcome(accounts: &[AccountReport]) {
    println!("{}", "Accounts".bold());
    for report in accounts {
        let label = report.display_name.as_deref().unwrap_or(&report.account_id);
        let outcome = match &report.outcome {
            AccountOutcome::Succeeded {
                items_considered,
                items_retained,
                ..
            } => format!("ok ({items_retained} of {items_considered} in window)")
                .green()
                .to_string(),
            AccountOutcome::Failed { reason, .. } => reason.code().red().to_string(),
            AccountOutcome::Skipped { reason } => {
                format!("skipped ({reason:?})").yellow().to_string()
            }
        };
        println!("  {:<32} {}", label, outcome);
    }
    println!();
}

fn display_stats(result: &RunResult) {
    let stats = &result.stats;
    println!(
        "  Status: {}   Accounts: {} attempted, {} ok, {} failed, {} skipped",
        colorize_status(stats.status),
        stats.accounts_attempted,
        stats.accounts_succeeded,
        stats.accounts_failed,
        stats.accounts_skipped,
    );
    println!(
        "  Items: {} considered, {} dropped, {} retained, {} duplicates, {} emitted",
        stats.items_considered,
        stats.items_dropped,
        stats.items_retained,
        stats.duplicates_removed,
        stats.items_emitted,
    );

    let summary = &stats.summary;
    match result.source {
        SourceKind::Instagram => println!(
            "  Engagement: avg {}  top {}  |  {} photos, {} videos, {} carousels, {} views",
            summary.average_engagement,
            summary.top_engagement,
            summary.photo_count,
            summary.video_count,
            summary.carousel_count,
            summary.total_views,
        ),
        SourceKind::Youtube => println!(
            "  Episodes: {}  total {}  |  {} summaries unavailable",
            summary.episode_count,
            format_duration(summary.total_duration_secs),
            summary.summaries_unavailable,
        ),
    }
    println!("  Duration: {:.1}s", stats.duration_ms as f64 / 1000.0);

    if stats.status == RunStatus::Degraded {
        println!(
            "\n  {} The source rate-limited too many accounts. Empty results here do not mean \"no recent posts\".",
            "!!".red().bold()
        );
    }
}

/// Display the configured accounts per source.
pub fn display_accounts(config: &AnalysisConfig) {
    for source in [SourceKind::Instagram, SourceKind::Youtube] {
        let accounts = config.accounts(source);
        println!(
            "\n{}",
            format!("=== {} ({} accounts) ===", source, accounts.len()).bold()
        );
        for account in accounts {
            let name = account
                .display_name
                .as_deref()
                .map(|n| format!(" ({n})"))
                .unwrap_or_default();
            let keywords = if account.keywords.is_empty() {
                String::new()
            } else {
                format!("  keywords: {}", account.keywords.join(", "))
                    .dimmed()
                    .to_string()
            };
            println!("  {}{}{}", account.id, name, keywords);
        }
    }
    println!();
}

/// Colorize a run status.
pub fn colorize_status(status: RunStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        RunStatus::Complete => text.green().bold(),
        RunStatus::Partial => text.yellow().bold(),
        RunStatus::Degraded => text.red().bold(),
    }
}

/// `1h 02m` / `12m 30s`.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m {seconds:02}s")
    }
}
