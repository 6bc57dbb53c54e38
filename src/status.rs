// Artifact status display — shows when a source was last analyzed and how
// that run went.

use anyhow::Result;
use std::path::Path;

use crate::models::{AccountOutcome, SourceKind};
use crate::output::json::read_result;
use crate::output::terminal::colorize_status;

/// Display the status of the last run for `source`.
pub fn show(source: SourceKind, artifact_path: &Path) -> Result<()> {
    if !artifact_path.exists() {
        println!("Results: none for {source}");
        println!("\nRun `rivalscan run {source}` to analyze competitor content.");
        return Ok(());
    }

    let file_size = std::fs::metadata(artifact_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Results: {} ({})", artifact_path.display(), file_size);

    let result = read_result(artifact_path)?;
    let stats = &result.stats;

    println!(
        "Last run: {} (window {} days from {})",
        result.reference_time.format("%Y-%m-%d %H:%M UTC"),
        result.window_days,
        result.window_start.format("%Y-%m-%d"),
    );
    println!("Status: {}", colorize_status(stats.status));
    println!(
        "Accounts: {} attempted, {} succeeded, {} failed, {} skipped",
        stats.accounts_attempted,
        stats.accounts_succeeded,
        stats.accounts_failed,
        stats.accounts_skipped
    );

    if !stats.failures_by_reason.is_empty() {
        println!("Failures:");
        for (reason, count) in &stats.failures_by_reason {
            println!("  {reason}: {count}");
        }
        for report in &stats.accounts {
            if let AccountOutcome::Failed { reason, message } = &report.outcome {
                println!("  @{} ({}): {}", report.account_id, reason, message);
            }
        }
    }

    println!(
        "Items: {} emitted from {} retained ({} considered)",
        stats.items_emitted, stats.items_retained, stats.items_considered
    );

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
