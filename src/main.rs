use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use rivalscan::config::{AnalysisConfig, Config};
use rivalscan::models::{AccountReport, AccountSpec, RunStatus, SourceKind};
use rivalscan::pipeline::aggregate::RunObserver;

/// rivalscan: see what your competitors published this week.
///
/// Pulls recent content from configured Instagram accounts and YouTube
/// channels, ranks posts by engagement and summarizes podcast episodes.
#[derive(Parser)]
#[command(name = "rivalscan", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis for one source and write the result artifact
    Run {
        /// Source to analyze (instagram or youtube)
        source: SourceKind,

        /// Analysis config file (default: $RIVALSCAN_CONFIG or rivalscan.json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for the result artifact (default: $RIVALSCAN_OUTPUT_DIR or output)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Replay a recorded fixture file instead of calling the platform
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Print the result without writing the artifact
        #[arg(long)]
        no_write: bool,

        /// Reference time for the window (RFC 3339, default: now)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },

    /// List the configured accounts per source
    Accounts {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate the analysis config and check credentials
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the last persisted result for a source
    Status {
        source: SourceKind,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Serve the analysis endpoint over HTTP
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on (default: 3000)
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Address to bind (default: 127.0.0.1)
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Replay `<dir>/<source>.json` fixtures instead of calling the platforms
        #[arg(long)]
        fixture_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rivalscan=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            config: config_path,
            output_dir,
            fixture,
            no_write,
            as_of,
        } => {
            let mut config = Config::load()?;
            if let Some(path) = config_path {
                config.analysis_config_path = path;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }

            let analysis = AnalysisConfig::load(&config.analysis_config_path)?;
            let ctx = rivalscan::pipeline::build_context(
                &config,
                &analysis,
                source,
                fixture.as_deref(),
            )?;

            let reference_time = as_of.unwrap_or_else(Utc::now);
            println!(
                "Analyzing {} {} accounts...",
                ctx.accounts.len(),
                source.to_string().bold()
            );

            let progress = ProgressObserver::new(ctx.accounts.len());
            let result = if no_write {
                rivalscan::pipeline::run_analysis(&ctx, reference_time, &progress).await
            } else {
                let path = config.artifact_path(source);
                let result =
                    rivalscan::pipeline::run_and_persist(&ctx, &path, reference_time, &progress)
                        .await?;
                info!(path = %path.display(), "Artifact updated");
                result
            };
            progress.finish();

            rivalscan::output::terminal::display_run_result(&result);
            if !no_write {
                println!(
                    "\nResults written to {}",
                    config.artifact_path(source).display()
                );
            }

            return Ok(exit_code(result.stats.status));
        }

        Commands::Accounts { config: config_path } => {
            let mut config = Config::load()?;
            if let Some(path) = config_path {
                config.analysis_config_path = path;
            }
            let analysis = AnalysisConfig::load(&config.analysis_config_path)?;
            rivalscan::output::terminal::display_accounts(&analysis);
        }

        Commands::CheckConfig { config: config_path } => {
            let mut config = Config::load()?;
            if let Some(path) = config_path {
                config.analysis_config_path = path;
            }
            let analysis = AnalysisConfig::load(&config.analysis_config_path)?;
            println!(
                "Config OK: {}",
                config.analysis_config_path.display().to_string().bold()
            );
            println!(
                "  window {} days, top {}, concurrency {}",
                analysis.settings.window_days,
                analysis.settings.top_k,
                analysis.settings.concurrency
            );

            for source in [SourceKind::Instagram, SourceKind::Youtube] {
                let count = analysis.accounts(source).len();
                if count == 0 {
                    println!("  {source}: {}", "no accounts".dimmed());
                    continue;
                }
                match config.require_source(source) {
                    Ok(()) => println!("  {source}: {count} accounts, {}", "credentials set".green()),
                    Err(e) => println!("  {source}: {count} accounts, {} {e}", "Warning:".yellow()),
                }
            }

            let summarizer_key = match analysis.settings.summarization_backend {
                rivalscan::config::SummarizationBackend::ServiceA => &config.gemini_api_key,
                rivalscan::config::SummarizationBackend::ServiceB => &config.openai_api_key,
            };
            if !analysis.youtube.is_empty() && summarizer_key.is_none() {
                println!(
                    "  {} no text service key set; episode summaries will be unavailable",
                    "Warning:".yellow()
                );
            }
        }

        Commands::Status { source, output_dir } => {
            let mut config = Config::load()?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            rivalscan::status::show(source, &config.artifact_path(source))?;
        }

        #[cfg(feature = "web")]
        Commands::Serve {
            port,
            bind,
            fixture_dir,
        } => {
            let config = Config::load()?;
            rivalscan::web::run_server(config, fixture_dir, port, &bind).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// 0 complete, 3 partial, 2 degraded. Hard failures exit 1 via `Err`.
fn exit_code(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Complete => ExitCode::SUCCESS,
        RunStatus::Partial => ExitCode::from(3),
        RunStatus::Degraded => ExitCode::from(2),
    }
}

/// Account-level progress bar for `rivalscan run`.
struct ProgressObserver {
    pb: ProgressBar,
}

impl ProgressObserver {
    fn new(accounts: usize) -> Self {
        let pb = ProgressBar::new(accounts as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("  Accounts [{bar:30}] {pos}/{len} {msg}")
        {
            pb.set_style(style);
        }
        Self { pb }
    }

    fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl RunObserver for ProgressObserver {
    fn account_started(&self, account: &AccountSpec) {
        self.pb.set_message(account.label().to_string());
    }

    fn account_finished(&self, _report: &AccountReport) {
        self.pb.inc(1);
    }
}
