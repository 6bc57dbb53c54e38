use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{AccountSpec, SourceKind};

/// Secrets and endpoints loaded from environment variables.
///
/// All secrets come from env vars (never from the analysis file, never
/// written to the artifact). The .env file is loaded automatically at
/// startup via dotenvy.
pub struct Config {
    /// Graph API token for a business/creator account (business discovery).
    pub instagram_access_token: String,
    /// Instagram user id of the business account the token belongs to.
    pub instagram_business_account_id: String,
    pub instagram_graph_url: String,
    pub youtube_api_key: String,
    pub youtube_api_url: String,
    /// Public timed-text endpoint for caption transcripts.
    pub youtube_caption_url: String,
    /// Key for the `service_a` summarizer (Gemini). Optional; without it
    /// every summary is reported as unavailable.
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    /// Key for the `service_b` summarizer (OpenAI). Optional.
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    /// Path of the JSON analysis config (accounts + settings).
    pub analysis_config_path: PathBuf,
    /// Directory the per-source result artifacts are written into.
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Nothing is required at load time; call the `require_*` checks before
    /// touching a live source.
    pub fn load() -> Result<Self> {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            instagram_access_token: env::var("INSTAGRAM_ACCESS_TOKEN").unwrap_or_default(),
            instagram_business_account_id: env::var("INSTAGRAM_BUSINESS_ACCOUNT_ID")
                .unwrap_or_default(),
            instagram_graph_url: env::var("INSTAGRAM_GRAPH_URL").unwrap_or_else(|_| {
                crate::sources::instagram::DEFAULT_GRAPH_URL.to_string()
            }),
            youtube_api_key: env::var("YOUTUBE_API_KEY").unwrap_or_default(),
            youtube_api_url: env::var("YOUTUBE_API_URL")
                .unwrap_or_else(|_| crate::sources::youtube::DEFAULT_DATA_API_URL.to_string()),
            youtube_caption_url: env::var("YOUTUBE_CAPTION_URL")
                .unwrap_or_else(|_| crate::sources::youtube::DEFAULT_CAPTION_URL.to_string()),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_api_url: env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| crate::text::gemini::DEFAULT_API_URL.to_string()),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_api_url: env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| crate::text::openai::DEFAULT_API_URL.to_string()),
            analysis_config_path: env::var("RIVALSCAN_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("rivalscan.json")),
            output_dir: env::var("RIVALSCAN_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
        })
    }

    /// Check that Graph API credentials are configured.
    pub fn require_instagram(&self) -> Result<()> {
        if self.instagram_access_token.is_empty() || self.instagram_business_account_id.is_empty()
        {
            anyhow::bail!(
                "INSTAGRAM_ACCESS_TOKEN and INSTAGRAM_BUSINESS_ACCOUNT_ID must be set.\n\
                 Add them to your .env file. See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the YouTube Data API key is configured.
    pub fn require_youtube(&self) -> Result<()> {
        if self.youtube_api_key.is_empty() {
            anyhow::bail!(
                "YOUTUBE_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    pub fn require_source(&self, source: SourceKind) -> Result<()> {
        match source {
            SourceKind::Instagram => self.require_instagram(),
            SourceKind::Youtube => self.require_youtube(),
        }
    }

    /// Where the artifact for `source` lives. One file per source, so a
    /// new run replaces the previous run's result.
    pub fn artifact_path(&self, source: SourceKind) -> PathBuf {
        self.output_dir.join(format!("{source}-analysis.json"))
    }
}

/// How episode text reaches the summarizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizationMethod {
    /// Use the platform's own caption transcript, falling back to the
    /// episode's audio reference when none exists.
    #[default]
    #[serde(alias = "youtube")]
    PlatformTranscript,
    /// Send the audio reference to the (paid) text service.
    #[serde(alias = "openai_whisper")]
    PaidTranscription,
    /// Don't summarize; episodes are kept with unknown text.
    Skip,
}

/// Which text service produces summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizationBackend {
    /// Google Gemini.
    #[default]
    #[serde(alias = "gemini")]
    ServiceA,
    /// OpenAI chat completions.
    #[serde(alias = "openai", alias = "openai_gpt")]
    ServiceB,
}

/// Inter-request spacing per pacing class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PacingSettings {
    /// Minimum gap between listing/detail calls to one source.
    pub request_spacing_ms: u64,
    /// Minimum gap between media downloads (caption transcripts).
    pub media_spacing_ms: u64,
    /// Minimum gap between text service calls.
    pub text_service_spacing_ms: u64,
    /// Sliding window cap for listing/detail calls.
    pub window_max_requests: u32,
    pub window_secs: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            request_spacing_ms: 1_000,
            media_spacing_ms: 15_000,
            text_service_spacing_ms: 2_000,
            window_max_requests: 200,
            window_secs: 3_600,
        }
    }
}

/// Exponential backoff for rate-limited and transient failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetrySettings {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Spread each backoff by +/-25%.
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
            jitter: true,
        }
    }
}

/// Every recognized run option with its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// Trailing window, in days, of content eligible for ranking.
    pub window_days: u32,
    /// How many engagement-ranked items the result keeps (across all accounts).
    pub top_k: usize,
    pub summarization_method: SummarizationMethod,
    pub summarization_backend: SummarizationBackend,
    /// Backend model override; each backend has its own default.
    pub summarization_model: Option<String>,
    /// Upper bound on topic keywords per episode.
    pub max_topics: usize,
    /// Advisory listing depth passed to the source client.
    pub max_items_per_account: usize,
    /// Newest in-window episodes summarized per channel.
    pub max_episodes_per_account: usize,
    /// Accounts processed in parallel. Pacing is shared across workers.
    pub concurrency: usize,
    /// Wall-clock bound for a whole run.
    pub run_timeout_secs: u64,
    /// Fraction of accounts failing with rate limits that trips the breaker.
    pub circuit_breaker_fraction: f64,
    pub pacing: PacingSettings,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_days: 7,
            top_k: 20,
            summarization_method: SummarizationMethod::default(),
            summarization_backend: SummarizationBackend::default(),
            summarization_model: None,
            max_topics: 5,
            max_items_per_account: 50,
            max_episodes_per_account: 3,
            concurrency: 2,
            run_timeout_secs: 600,
            circuit_breaker_fraction: 0.5,
            pacing: PacingSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=365).contains(&self.window_days) {
            return Err(ConfigError::invalid("settings.window_days", "must be between 1 and 365"));
        }
        if self.top_k == 0 {
            return Err(ConfigError::invalid("settings.top_k", "must be at least 1"));
        }
        if self.max_topics > 20 {
            return Err(ConfigError::invalid("settings.max_topics", "must be at most 20"));
        }
        if self.max_items_per_account == 0 {
            return Err(ConfigError::invalid(
                "settings.max_items_per_account",
                "must be at least 1",
            ));
        }
        if self.max_episodes_per_account == 0 {
            return Err(ConfigError::invalid(
                "settings.max_episodes_per_account",
                "must be at least 1",
            ));
        }
        if !(1..=8).contains(&self.concurrency) {
            return Err(ConfigError::invalid("settings.concurrency", "must be between 1 and 8"));
        }
        if self.run_timeout_secs == 0 {
            return Err(ConfigError::invalid("settings.run_timeout_secs", "must be at least 1"));
        }
        if !(self.circuit_breaker_fraction > 0.0 && self.circuit_breaker_fraction <= 1.0) {
            return Err(ConfigError::invalid(
                "settings.circuit_breaker_fraction",
                "must be in (0, 1]",
            ));
        }
        if self.pacing.window_max_requests == 0 || self.pacing.window_secs == 0 {
            return Err(ConfigError::invalid(
                "settings.pacing",
                "window_max_requests and window_secs must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("settings.retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(
                "settings.retry",
                "base_delay_ms must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }
}

/// Accounts may be written as a bare handle or as a full spec object.
#[derive(Deserialize)]
#[serde(untagged)]
enum AccountEntry {
    Handle(String),
    Spec(AccountSpec),
}

impl From<AccountEntry> for AccountSpec {
    fn from(entry: AccountEntry) -> Self {
        match entry {
            AccountEntry::Handle(id) => AccountSpec::new(id),
            AccountEntry::Spec(spec) => spec,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceSection {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalysisFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    instagram: SourceSection,
    #[serde(default)]
    youtube: SourceSection,
}

/// The analysis config file: accounts per source plus one settings block.
///
/// ```json
/// {
///   "settings": { "window_days": 7, "top_k": 20 },
///   "instagram": { "accounts": ["acme", { "id": "rival", "keywords": ["launch"] }] },
///   "youtube": { "accounts": [{ "id": "https://www.youtube.com/@acme", "name": "Acme" }] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub settings: Settings,
    pub instagram: Vec<AccountSpec>,
    pub youtube: Vec<AccountSpec>,
}

impl AnalysisConfig {
    /// Read, parse and validate the config file. Any problem is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Parse and validate config text; `origin` is only used in error messages.
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: AnalysisFile =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;

        file.settings.validate()?;

        let config = Self {
            settings: file.settings,
            instagram: clean_accounts(file.instagram.accounts, SourceKind::Instagram)?,
            youtube: clean_accounts(file.youtube.accounts, SourceKind::Youtube)?,
        };

        if config.instagram.is_empty() && config.youtube.is_empty() {
            return Err(ConfigError::invalid("accounts", "no accounts configured"));
        }

        Ok(config)
    }

    pub fn accounts(&self, source: SourceKind) -> &[AccountSpec] {
        match source {
            SourceKind::Instagram => &self.instagram,
            SourceKind::Youtube => &self.youtube,
        }
    }
}

/// Trim ids, drop the conventional leading '@' on Instagram handles, and
/// reject empty or duplicate accounts.
fn clean_accounts(
    entries: Vec<AccountEntry>,
    source: SourceKind,
) -> Result<Vec<AccountSpec>, ConfigError> {
    let mut accounts: Vec<AccountSpec> = Vec::with_capacity(entries.len());

    for (i, entry) in entries.into_iter().enumerate() {
        let mut spec = AccountSpec::from(entry);
        let trimmed = spec.id.trim();
        let id = match source {
            SourceKind::Instagram => trimmed.trim_start_matches('@'),
            SourceKind::Youtube => trimmed,
        };
        if id.is_empty() {
            return Err(ConfigError::invalid(
                format!("{source}.accounts[{i}]"),
                "account id is empty",
            ));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid(
                format!("{source}.accounts[{i}]"),
                format!("account id '{id}' contains whitespace"),
            ));
        }
        spec.id = id.to_string();
        spec.keywords = spec
            .keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if accounts.iter().any(|a| a.id.eq_ignore_ascii_case(&spec.id)) {
            return Err(ConfigError::invalid(
                format!("{source}.accounts[{i}]"),
                format!("duplicate account '{}'", spec.id),
            ));
        }
        accounts.push(spec);
    }

    Ok(accounts)
}
