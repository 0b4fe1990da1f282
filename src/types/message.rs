//! Persisted conversation entities: messages, files, sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::part::Part;
use super::settings::GenerationSettings;

/// Role of a persisted message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Error,
}

/// Where a message file's bytes live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSource {
    /// Raw bytes held inline.
    Inline { data: Vec<u8> },
    /// A server-side upload reference. Upload URIs are credential-scoped:
    /// a session holding one must keep using the credential that created it.
    Remote { uri: String },
}

/// A file attached to (or produced by) a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageFile {
    pub name: String,
    pub mime_type: String,
    pub source: FileSource,
}

impl MessageFile {
    pub fn inline(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: FileSource::Inline { data },
        }
    }

    pub fn remote(name: impl Into<String>, mime_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: FileSource::Remote { uri: uri.into() },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source, FileSource::Remote { .. })
    }
}

/// A persisted conversation message.
///
/// Created with `is_loading = true` when a generation job starts; mutated
/// only by the finalizer (or the error path) and immutable once
/// `is_loading = false`, except for user-initiated edit/continue which
/// re-opens it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    #[serde(default)]
    pub files: Vec<MessageFile>,
    #[serde(default)]
    pub raw_parts: Vec<Part>,
    #[serde(default)]
    pub signatures: Vec<String>,
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_end_time: Option<DateTime<Utc>>,
    /// Once set, never recomputed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_token_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    /// Running total across the session; monotonically non-decreasing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_total_tokens: Option<u64>,
}

impl ChatMessage {
    /// Create a user message with optional attachments.
    pub fn user(text: impl Into<String>, files: Vec<MessageFile>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: text.into(),
            thoughts: None,
            files,
            raw_parts: Vec::new(),
            signatures: Vec::new(),
            is_loading: false,
            generation_start_time: None,
            generation_end_time: None,
            thinking_time_ms: None,
            first_token_time_ms: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            cumulative_total_tokens: None,
        }
    }

    /// Create the loading model-message placeholder for a starting job.
    /// Its id doubles as the generation id in the job registry.
    pub fn loading_model(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Model,
            content: String::new(),
            thoughts: None,
            files: Vec::new(),
            raw_parts: Vec::new(),
            signatures: Vec::new(),
            is_loading: true,
            generation_start_time: Some(started_at),
            generation_end_time: None,
            thinking_time_ms: None,
            first_token_time_ms: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            cumulative_total_tokens: None,
        }
    }

    /// Whether the message carries any visible output at all.
    pub fn is_empty_response(&self) -> bool {
        self.content.is_empty()
            && self.files.is_empty()
            && self.thoughts.as_deref().unwrap_or("").is_empty()
    }
}

/// A persisted conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: String,
    /// Ordered by creation, append-mostly. Rewinding truncates the tail;
    /// the truncated suffix is discarded, not archived.
    pub messages: Vec<ChatMessage>,
    pub settings: GenerationSettings,
    /// Credential pinned to this session because a message still references
    /// a credential-scoped server-side upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_api_key: Option<String>,
    pub title: String,
    pub timestamp: DateTime<Utc>,
}
