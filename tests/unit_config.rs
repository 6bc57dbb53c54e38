// Unit tests for analysis config parsing and validation.
//
// Every problem with the config file must surface as a ConfigError before
// any fetch happens.

use std::path::Path;

use rivalscan::config::{AnalysisConfig, Settings, SummarizationBackend, SummarizationMethod};
use rivalscan::error::ConfigError;
use rivalscan::models::SourceKind;

fn parse(raw: &str) -> Result<AnalysisConfig, ConfigError> {
    AnalysisConfig::parse(raw, Path::new("test.json"))
}

fn invalid_field(raw: &str) -> String {
    match parse(raw) {
        Err(ConfigError::Invalid { field, .. }) => field,
        other => panic!("expected Invalid, got {other:?}"),
    }
}

// ============================================================
// Accounts
// ============================================================

#[test]
fn accounts_accept_bare_handles_and_full_specs() {
    let config = parse(
        r#"{
            "instagram": { "accounts": ["@acme", { "id": "rival", "keywords": [" launch ", ""], "display_name": "Rival Co" }] },
            "youtube": { "accounts": [{ "url": "https://www.youtube.com/@acme", "name": "Acme Pod" }] }
        }"#,
    )
    .unwrap();

    let ig = config.accounts(SourceKind::Instagram);
    assert_eq!(ig.len(), 2);
    assert_eq!(ig[0].id, "acme");
    assert_eq!(ig[1].keywords, vec!["launch".to_string()]);
    assert_eq!(ig[1].label(), "Rival Co");

    let yt = config.accounts(SourceKind::Youtube);
    assert_eq!(yt[0].id, "https://www.youtube.com/@acme");
    assert_eq!(yt[0].display_name.as_deref(), Some("Acme Pod"));
}

#[test]
fn youtube_ids_keep_their_at_sign() {
    let config = parse(r#"{ "youtube": { "accounts": ["@acmepod"] } }"#).unwrap();
    assert_eq!(config.youtube[0].id, "@acmepod");
}

#[test]
fn no_accounts_at_all_is_invalid() {
    assert_eq!(invalid_field(r#"{ "instagram": { "accounts": [] } }"#), "accounts");
}

#[test]
fn empty_account_id_is_invalid() {
    assert_eq!(
        invalid_field(r#"{ "instagram": { "accounts": ["acme", "  @ "] } }"#),
        "instagram.accounts[1]"
    );
}

#[test]
fn duplicate_accounts_are_invalid_case_insensitively() {
    assert_eq!(
        invalid_field(r#"{ "instagram": { "accounts": ["Acme", "@acme"] } }"#),
        "instagram.accounts[1]"
    );
}

#[test]
fn whitespace_inside_an_id_is_invalid() {
    assert_eq!(
        invalid_field(r#"{ "youtube": { "accounts": ["acme pod"] } }"#),
        "youtube.accounts[0]"
    );
}

// ============================================================
// Settings
// ============================================================

#[test]
fn omitted_settings_take_their_defaults() {
    let config = parse(r#"{ "instagram": { "accounts": ["acme"] } }"#).unwrap();
    assert_eq!(config.settings, Settings::default());
    assert_eq!(config.settings.window_days, 7);
    assert_eq!(config.settings.top_k, 20);
    assert_eq!(
        config.settings.summarization_method,
        SummarizationMethod::PlatformTranscript
    );
}

#[test]
fn legacy_method_and_backend_names_are_accepted() {
    let config = parse(
        r#"{
            "settings": { "summarization_method": "openai_whisper", "summarization_backend": "openai" },
            "youtube": { "accounts": ["@acme"] }
        }"#,
    )
    .unwrap();
    assert_eq!(
        config.settings.summarization_method,
        SummarizationMethod::PaidTranscription
    );
    assert_eq!(
        config.settings.summarization_backend,
        SummarizationBackend::ServiceB
    );
}

#[test]
fn nested_settings_merge_with_defaults() {
    let config = parse(
        r#"{
            "settings": { "retry": { "max_attempts": 2 }, "pacing": { "request_spacing_ms": 250 } },
            "instagram": { "accounts": ["acme"] }
        }"#,
    )
    .unwrap();
    assert_eq!(config.settings.retry.max_attempts, 2);
    assert_eq!(config.settings.retry.base_delay_ms, 2_000);
    assert_eq!(config.settings.pacing.request_spacing_ms, 250);
    assert_eq!(config.settings.pacing.media_spacing_ms, 15_000);
}

#[test]
fn unknown_settings_are_rejected() {
    let result = parse(
        r#"{ "settings": { "window_dayz": 3 }, "instagram": { "accounts": ["acme"] } }"#,
    );
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn out_of_range_settings_are_rejected() {
    let cases = [
        (r#"{ "window_days": 0 }"#, "settings.window_days"),
        (r#"{ "window_days": 366 }"#, "settings.window_days"),
        (r#"{ "top_k": 0 }"#, "settings.top_k"),
        (r#"{ "concurrency": 9 }"#, "settings.concurrency"),
        (r#"{ "circuit_breaker_fraction": 0.0 }"#, "settings.circuit_breaker_fraction"),
        (r#"{ "run_timeout_secs": 0 }"#, "settings.run_timeout_secs"),
        (
            r#"{ "retry": { "base_delay_ms": 5000, "max_delay_ms": 1000 } }"#,
            "settings.retry",
        ),
    ];
    for (settings, field) in cases {
        let raw = format!(r#"{{ "settings": {settings}, "instagram": {{ "accounts": ["acme"] }} }}"#);
        assert_eq!(invalid_field(&raw), field, "settings: {settings}");
    }
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(parse("{ not json"), Err(ConfigError::Parse { .. })));
}

#[test]
fn missing_file_is_a_read_error() {
    let result = AnalysisConfig::load(Path::new("/nonexistent/rivalscan.json"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn shipped_example_config_is_valid() {
    let config = parse(include_str!("../rivalscan.example.json")).unwrap();
    assert_eq!(config.instagram.len(), 2);
    assert_eq!(config.youtube.len(), 2);
    assert_eq!(config.settings, Settings::default());
}
