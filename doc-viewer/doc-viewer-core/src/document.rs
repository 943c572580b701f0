//! Document entity pushed by agents and tracked through its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

const ID_LEN: usize = 8;

/// Lifecycle state of a document. `Complete` is terminal.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Active,
    Complete,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => "active",
            DocumentStatus::Complete => "complete",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub source: Option<String>,
    /// Folder-like location, also used as the upsert key.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DocumentMetadata {
    /// Trimmed path if one was supplied and is non-empty.
    pub fn upsert_key(&self) -> Option<&str> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub(crate) fn new(id: String, input: NewDocument, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title,
            content: input.content,
            status: DocumentStatus::Active,
            created_at: now,
            updated_at: now,
            metadata: input.metadata,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DocumentStatus::Active
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

/// Lightweight listing view of a document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating (or upserting) a document.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.metadata.path = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_title(&self.title)
    }
}

pub(crate) fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("title is required".into()));
    }
    Ok(())
}

/// Short random identifier; uniqueness is enforced by the store.
pub(crate) fn generate_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_defaults_when_missing() {
        let input: NewDocument = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
        assert_eq!(input.content, "");
        assert_eq!(input.metadata, DocumentMetadata::default());
        assert!(input.metadata.tags.is_empty());
    }

    #[test]
    fn blank_path_is_not_an_upsert_key() {
        let mut meta = DocumentMetadata::default();
        assert_eq!(meta.upsert_key(), None);
        meta.path = Some("   ".into());
        assert_eq!(meta.upsert_key(), None);
        meta.path = Some(" project/specs ".into());
        assert_eq!(meta.upsert_key(), Some("project/specs"));
    }

    #[test]
    fn whitespace_title_fails_validation() {
        let err = NewDocument::new("  ", "body").validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(NewDocument::new("ok", "").validate().is_ok());
    }

    #[test]
    fn ids_are_short_hex() {
        let id = generate_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Complete).unwrap(),
            "\"complete\""
        );
        assert_eq!(DocumentStatus::Active.as_str(), "active");
    }
}
