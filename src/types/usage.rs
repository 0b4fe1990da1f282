//! Token usage reporting.

use serde::{Deserialize, Serialize};

/// Token usage as reported by the provider's chunk metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    /// Direct completion-token count; some responses omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_token_count: Option<u32>,
    #[serde(default)]
    pub total_token_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts_token_count: Option<u32>,
}

impl UsageMetadata {
    /// Completion tokens, falling back to `total − prompt` when the
    /// provider omits a direct count.
    pub fn completion_tokens(&self) -> u32 {
        self.candidates_token_count
            .unwrap_or_else(|| self.total_token_count.saturating_sub(self.prompt_token_count))
    }
}
