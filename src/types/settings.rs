//! Generation settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Settings controlling one generation turn.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    /// Numeric reasoning token budget. Takes precedence over
    /// [`thinking_level`](Self::thinking_level) when > 0.
    pub thinking_budget: Option<u32>,
    pub thinking_level: Option<ThinkingLevel>,
    /// Provider built-in tools enabled for this turn.
    #[serde(default)]
    #[builder(default)]
    pub tools: Vec<BuiltinTool>,
    /// Structured-output schema. Cleared when any built-in tool is enabled;
    /// the provider rejects schema + tool combinations.
    pub response_schema: Option<serde_json::Value>,
    /// Spawn a best-effort visualization job after prose completions.
    #[serde(default)]
    #[builder(default)]
    pub auto_visualize: bool,
}

/// Reasoning-effort level for models without a numeric budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThinkingLevel {
    Low,
    Medium,
    High,
}

/// Provider built-in tools. Mutually exclusive with structured output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinTool {
    WebSearch,
    CodeExecution,
    UrlContext,
    DeepSearch,
}

/// Why a stream finished, as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Safety,
    Other,
}

impl FinishReason {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::Length,
            "SAFETY" | "PROHIBITED_CONTENT" => Self::Safety,
            _ => Self::Other,
        }
    }
}
