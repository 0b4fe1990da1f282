//! Provider abstraction: the remote generation endpoint as a black-box
//! streaming RPC.

pub mod gemini;
pub mod http;

pub use gemini::GeminiProvider;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{BuiltinTool, FinishReason, Part, ThinkingLevel, UsageMetadata};

/// Wire-level turn role. Persisted [`Role::Error`](crate::types::Role)
/// messages never reach the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One turn of provider-facing conversation content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: TurnRole::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: TurnRole::Model,
            parts,
        }
    }
}

/// A locally-executed tool the model may call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Generation configuration as assembled by the request builder.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RequestConfig {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    /// Numeric reasoning budget; wins over `thinking_level` when > 0.
    pub thinking_budget: Option<u32>,
    pub thinking_level: Option<ThinkingLevel>,
    #[serde(default)]
    pub builtin_tools: Vec<BuiltinTool>,
    #[serde(default)]
    pub function_declarations: Vec<FunctionDeclaration>,
    pub response_schema: Option<serde_json::Value>,
}

/// A fully-assembled provider request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub config: RequestConfig,
}

/// A grounding citation attached to generated content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Grounding/citation metadata captured across a stream.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GroundingMetadata {
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_context: Option<serde_json::Value>,
}

impl GroundingMetadata {
    /// Merge a newer chunk's metadata into this one: last-wins for
    /// everything except citations, which are deduplicated by URI and
    /// unioned across chunks.
    pub fn absorb(&mut self, newer: GroundingMetadata) {
        for citation in newer.citations {
            if !self.citations.iter().any(|c| c.uri == citation.uri) {
                self.citations.push(citation);
            }
        }
        if !newer.search_queries.is_empty() {
            self.search_queries = newer.search_queries;
        }
        if newer.url_context.is_some() {
            self.url_context = newer.url_context;
        }
    }
}

/// One chunk of an incremental provider response.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub parts: Vec<Part>,
    pub usage: Option<UsageMetadata>,
    pub grounding: Option<GroundingMetadata>,
    pub finish_reason: Option<FinishReason>,
}

/// Stream of chunks from a provider.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// The remote generation provider, treated as a black-box streaming RPC.
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Open a chunked response for the given request.
    async fn stream_generate(&self, api_key: &str, request: &ProviderRequest)
        -> Result<ChunkStream>;
}
