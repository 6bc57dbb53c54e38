// Frozen-input source that replays a JSON fixture instead of calling a
// platform. Used for reproducible runs (`--fixture`) and throughout the
// tests.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::rate_limit::Pacer;
use super::traits::{ItemRef, LookbackHint, RawItem, SourceClient};
use crate::error::SourceError;
use crate::models::{AccountSpec, SourceKind};

/// Error kinds a fixture account can be scripted to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureError {
    NotFound,
    AccessDenied,
    RateLimited,
    Transient,
}

impl FixtureError {
    fn to_source_error(self, account_id: &str) -> SourceError {
        match self {
            FixtureError::NotFound => SourceError::NotFound(account_id.to_string()),
            FixtureError::AccessDenied => SourceError::AccessDenied(account_id.to_string()),
            FixtureError::RateLimited => SourceError::rate_limited(account_id.to_string()),
            FixtureError::Transient => SourceError::Transient(account_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FixtureAccount {
    Error { error: FixtureError },
    Items { items: Vec<RawItem> },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureFile {
    #[serde(default)]
    accounts: HashMap<String, FixtureAccount>,
    #[serde(default)]
    transcripts: HashMap<String, String>,
    #[serde(default)]
    details: HashMap<String, RawItem>,
}

pub struct FixtureSource {
    kind: SourceKind,
    accounts: HashMap<String, FixtureAccount>,
    transcripts: HashMap<String, String>,
    details: HashMap<String, RawItem>,
}

impl FixtureSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            accounts: HashMap::new(),
            transcripts: HashMap::new(),
            details: HashMap::new(),
        }
    }

    /// Load a fixture file from disk.
    pub fn load(kind: SourceKind, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(kind, &raw)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    pub fn from_json(kind: SourceKind, raw: &str) -> Result<Self> {
        let file: FixtureFile = serde_json::from_str(raw)?;
        Ok(Self {
            kind,
            accounts: file.accounts,
            transcripts: file.transcripts,
            details: file.details,
        })
    }

    pub fn with_items(mut self, account_id: &str, items: Vec<RawItem>) -> Self {
        self.accounts
            .insert(account_id.to_string(), FixtureAccount::Items { items });
        self
    }

    pub fn with_error(mut self, account_id: &str, error: FixtureError) -> Self {
        self.accounts
            .insert(account_id.to_string(), FixtureAccount::Error { error });
        self
    }

    pub fn with_transcript(mut self, source_id: &str, text: &str) -> Self {
        self.transcripts
            .insert(source_id.to_string(), text.to_string());
        self
    }

    /// Full record served by `fetch_detail` when the listing was partial.
    pub fn with_detail(mut self, item: RawItem) -> Self {
        self.details.insert(item.source_id().to_string(), item);
        self
    }
}

#[async_trait]
impl SourceClient for FixtureSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn list_recent(
        &self,
        account: &AccountSpec,
        _hint: &LookbackHint,
        _pacer: &Pacer,
    ) -> Result<Vec<RawItem>, SourceError> {
        match self.accounts.get(&account.id) {
            Some(FixtureAccount::Items { items }) => Ok(items.clone()),
            Some(FixtureAccount::Error { error }) => Err(error.to_source_error(&account.id)),
            None => Err(SourceError::NotFound(format!(
                "{} is not in the fixture",
                account.id
            ))),
        }
    }

    async fn fetch_detail(&self, item: &ItemRef, _pacer: &Pacer) -> Result<RawItem, SourceError> {
        if let Some(detail) = self.details.get(&item.source_id) {
            return Ok(detail.clone());
        }
        // Fall back to the listed record.
        match self.accounts.get(&item.account_id) {
            Some(FixtureAccount::Items { items }) => items
                .iter()
                .find(|raw| raw.source_id() == item.source_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(item.source_id.clone())),
            Some(FixtureAccount::Error { error }) => Err(error.to_source_error(&item.account_id)),
            None => Err(SourceError::NotFound(item.source_id.clone())),
        }
    }

    async fn fetch_transcript(
        &self,
        item: &ItemRef,
        _pacer: &Pacer,
    ) -> Result<Option<String>, SourceError> {
        Ok(self.transcripts.get(&item.source_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn hint() -> LookbackHint {
        LookbackHint {
            since: Utc::now(),
            max_items: 50,
        }
    }

    #[tokio::test]
    async fn test_fixture_json_replays_items_and_errors() {
        let raw = r#"{
            "accounts": {
                "brand_a": { "items": [
                    { "source": "instagram", "id": "1", "media_type": "IMAGE",
                      "timestamp": "2024-05-01T10:00:00+0000" }
                ]},
                "brand_b": { "error": "access_denied" }
            },
            "transcripts": { "vid1": "hello" }
        }"#;
        let source = FixtureSource::from_json(SourceKind::Instagram, raw).unwrap();

        let items = source
            .list_recent(&AccountSpec::new("brand_a"), &hint(), &Pacer::unpaced())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id(), "1");

        let err = source
            .list_recent(&AccountSpec::new("brand_b"), &hint(), &Pacer::unpaced())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::AccessDenied(_)));

        let transcript = source
            .fetch_transcript(&ItemRef::new("x", "vid1"), &Pacer::unpaced())
            .await
            .unwrap();
        assert_eq!(transcript.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let source = FixtureSource::new(SourceKind::Youtube);
        let err = source
            .list_recent(&AccountSpec::new("ghost"), &hint(), &Pacer::unpaced())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn test_unknown_fixture_keys_are_rejected() {
        assert!(FixtureSource::from_json(SourceKind::Instagram, r#"{"acounts":{}}"#).is_err());
    }
}
