//! Gemini streaming provider.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::TernError;
use crate::types::{FinishReason, Part, UsageMetadata};

use super::http::{parse_sse_data, shared_client, status_to_error};
use super::{
    BuiltinTool, ChunkStream, Citation, GroundingMetadata, ProviderRequest, StreamChunk,
    StreamingProvider, TurnRole,
};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Streaming provider backed by the Gemini `streamGenerateContent` RPC.
pub struct GeminiProvider {
    base_url: String,
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different endpoint (tests, proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn build_request_body(request: &ProviderRequest) -> Value {
        let contents: Vec<Value> = request
            .contents
            .iter()
            .map(|content| {
                let parts: Vec<Value> = content.parts.iter().map(Part::to_wire).collect();
                json!({
                    "role": match content.role {
                        TurnRole::User => "user",
                        TurnRole::Model => "model",
                    },
                    "parts": parts,
                })
            })
            .collect();

        let mut body = json!({ "contents": contents });
        let obj = body.as_object_mut().unwrap();

        if let Some(ref sys) = request.system_instruction {
            obj.insert(
                "systemInstruction".into(),
                json!({ "parts": [{ "text": sys }] }),
            );
        }

        let cfg = &request.config;
        let mut gen_config = serde_json::Map::new();
        if let Some(temp) = cfg.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = cfg.top_p {
            gen_config.insert("topP".into(), top_p.into());
        }
        match cfg.thinking_budget {
            Some(budget) if budget > 0 => {
                gen_config.insert(
                    "thinkingConfig".into(),
                    json!({ "thinkingBudget": budget, "includeThoughts": true }),
                );
            }
            _ => {
                if let Some(level) = cfg.thinking_level {
                    gen_config.insert(
                        "thinkingConfig".into(),
                        json!({ "thinkingLevel": level.to_string(), "includeThoughts": true }),
                    );
                }
            }
        }
        if let Some(ref schema) = cfg.response_schema {
            gen_config.insert("responseMimeType".into(), "application/json".into());
            gen_config.insert("responseSchema".into(), schema.clone());
        }
        if !gen_config.is_empty() {
            obj.insert("generationConfig".into(), Value::Object(gen_config));
        }

        let mut tools: Vec<Value> = Vec::new();
        if !cfg.function_declarations.is_empty() {
            let decls: Vec<Value> = cfg
                .function_declarations
                .iter()
                .map(|d| {
                    json!({
                        "name": d.name,
                        "description": d.description,
                        "parameters": d.parameters,
                    })
                })
                .collect();
            tools.push(json!({ "functionDeclarations": decls }));
        }
        for tool in &cfg.builtin_tools {
            tools.push(match tool {
                // Deep search rides the search tool on the wire.
                BuiltinTool::WebSearch | BuiltinTool::DeepSearch => json!({ "googleSearch": {} }),
                BuiltinTool::CodeExecution => json!({ "codeExecution": {} }),
                BuiltinTool::UrlContext => json!({ "urlContext": {} }),
            });
        }
        if !tools.is_empty() {
            obj.insert("tools".into(), json!(tools));
        }

        body
    }
}

#[async_trait]
impl StreamingProvider for GeminiProvider {
    async fn stream_generate(
        &self,
        api_key: &str,
        request: &ProviderRequest,
    ) -> crate::error::Result<ChunkStream> {
        let body = Self::build_request_body(request);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, request.model, api_key
        );

        debug!(model = %request.model, turns = request.contents.len(), "gemini stream_generate");

        let resp = shared_client().post(&url).json(&body).send().await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(TernError::Network(e));
                        break;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    let Some(data) = parse_sse_data(&line) else { continue };
                    match serde_json::from_str::<GeminiStreamResponse>(data) {
                        Ok(resp) => yield Ok(parse_chunk(resp)),
                        Err(e) => {
                            yield Err(TernError::Stream(format!("malformed chunk: {e}")));
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_chunk(resp: GeminiStreamResponse) -> StreamChunk {
    let mut chunk = StreamChunk {
        usage: resp.usage_metadata,
        ..Default::default()
    };

    let Some(candidate) = resp.candidates.into_iter().next() else {
        return chunk;
    };

    if let Some(content) = candidate.content {
        chunk.parts = content.parts.iter().filter_map(Part::from_wire).collect();
    }
    chunk.finish_reason = candidate
        .finish_reason
        .as_deref()
        .map(FinishReason::from_wire);
    chunk.grounding = parse_grounding(
        candidate.grounding_metadata.as_ref(),
        candidate.url_context_metadata,
    );

    chunk
}

fn parse_grounding(
    grounding: Option<&Value>,
    url_context: Option<Value>,
) -> Option<GroundingMetadata> {
    if grounding.is_none() && url_context.is_none() {
        return None;
    }
    let mut meta = GroundingMetadata {
        url_context,
        ..Default::default()
    };
    if let Some(g) = grounding {
        if let Some(chunks) = g.get("groundingChunks").and_then(Value::as_array) {
            for entry in chunks {
                let Some(web) = entry.get("web") else { continue };
                let Some(uri) = web.get("uri").and_then(Value::as_str) else { continue };
                meta.citations.push(Citation {
                    uri: uri.to_string(),
                    title: web.get("title").and_then(Value::as_str).map(str::to_string),
                });
            }
        }
        if let Some(queries) = g.get("webSearchQueries").and_then(Value::as_array) {
            meta.search_queries = queries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
    }
    Some(meta)
}

// Internal wire types.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<Value>,
    url_context_metadata: Option<Value>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<Value>,
}
