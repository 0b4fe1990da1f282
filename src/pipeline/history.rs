//! History reconciler: optimistic append-or-rewind over the session list.
//!
//! All mutations are pure functions `prev → next`, applied by the store
//! against its latest snapshot. Concurrent jobs patch only the message
//! matching their own generation id, so interleaved commits cannot lose
//! each other's updates.

use chrono::{DateTime, Utc};

use crate::types::{ChatMessage, ChatSession, GenerationSettings, Role};

const TITLE_WORDS: usize = 7;
const FALLBACK_TITLE: &str = "New chat";

/// One reconciliation step against a session.
pub struct SessionPatch {
    pub session_id: String,
    /// Messages to append (typically the user turn plus the loading model
    /// placeholder).
    pub new_messages: Vec<ChatMessage>,
    /// Truncate the session at this message id (dropping it and everything
    /// after) before appending. Edit-and-resend and continue both use this.
    pub rewind_at: Option<String>,
    /// Settings for a newly-created session.
    pub settings: GenerationSettings,
    /// Pin this credential to the session (server-side uploads are
    /// credential-scoped).
    pub lock_api_key: Option<String>,
}

/// Apply a patch: create the session when absent, else rewind-then-append.
pub fn reconcile(
    mut sessions: Vec<ChatSession>,
    patch: SessionPatch,
    now: DateTime<Utc>,
) -> Vec<ChatSession> {
    match sessions.iter_mut().find(|s| s.id == patch.session_id) {
        Some(session) => {
            if let Some(rewind_id) = &patch.rewind_at {
                if let Some(idx) = session.messages.iter().position(|m| &m.id == rewind_id) {
                    // The truncated suffix is discarded, not archived.
                    session.messages.truncate(idx);
                }
            }
            session.messages.extend(patch.new_messages);
            session.timestamp = now;
            if patch.lock_api_key.is_some() {
                session.locked_api_key = patch.lock_api_key;
            }
        }
        None => {
            let title = derive_title(&patch.new_messages);
            sessions.push(ChatSession {
                id: patch.session_id,
                messages: patch.new_messages,
                settings: patch.settings,
                locked_api_key: patch.lock_api_key,
                title,
                timestamp: now,
            });
        }
    }
    sessions
}

/// Patch a single message by id. Updates nothing else, so commits from
/// concurrent jobs interleave safely.
pub fn update_message(
    mut sessions: Vec<ChatSession>,
    session_id: &str,
    message_id: &str,
    patch: impl FnOnce(&mut ChatMessage),
) -> Vec<ChatSession> {
    if let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) {
        if let Some(message) = session.messages.iter_mut().find(|m| m.id == message_id) {
            patch(message);
        }
    }
    sessions
}

/// Derive a session title: the first ~7 words of the first non-empty user
/// message, else a fallback from the first model message or first attached
/// file name, else a generic placeholder.
pub fn derive_title(messages: &[ChatMessage]) -> String {
    let user_text = messages
        .iter()
        .find(|m| m.role == Role::User && !m.content.trim().is_empty())
        .map(|m| m.content.as_str());
    if let Some(text) = user_text {
        return truncate_words(text);
    }
    if let Some(model_text) = messages
        .iter()
        .find(|m| m.role == Role::Model && !m.content.trim().is_empty())
        .map(|m| m.content.as_str())
    {
        return truncate_words(model_text);
    }
    if let Some(file) = messages.iter().flat_map(|m| m.files.iter()).next() {
        return file.name.clone();
    }
    FALLBACK_TITLE.to_string()
}

fn truncate_words(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(TITLE_WORDS + 1).collect();
    if words.len() > TITLE_WORDS {
        format!("{}…", words[..TITLE_WORDS].join(" "))
    } else {
        words.join(" ")
    }
}

/// The running token total as of the last finalized message, for the
/// monotonic cumulative counter.
pub fn last_cumulative_tokens(session: &ChatSession, before_message_id: &str) -> u64 {
    session
        .messages
        .iter()
        .take_while(|m| m.id != before_message_id)
        .filter_map(|m| m.cumulative_total_tokens)
        .last()
        .unwrap_or(0)
}
