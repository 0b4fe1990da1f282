//! The part model: one discrete unit of provider output.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single unit of provider output (or, for [`Part::FunctionResponse`],
/// of tool output echoed back to the provider).
///
/// Parts are immutable once produced: the stream adapter creates them, the
/// accumulator and the function-call executor consume them. A part that
/// carries a thought signature must round-trip unchanged into the next turn
/// or the provider will reject the continuation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Incremental answer text.
    TextDelta { text: String },
    /// Incremental reasoning ("thought") text, distinct from the answer.
    ThoughtDelta { text: String },
    /// Inline binary file, payload base64-encoded as received on the wire.
    FileData { mime_type: String, data: String },
    /// Reference to a server-side upload. Request-direction only; upload
    /// URIs are scoped to the credential that created them.
    FileRef { mime_type: String, uri: String },
    /// Executable code block emitted by the provider's code-execution tool.
    ExecutableCode { language: String, code: String },
    /// Result of a provider-side code execution.
    CodeResult {
        outcome: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    /// A tool invocation requested by the model.
    FunctionCall {
        name: String,
        args: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// A bare thought signature; merged into whichever part it accompanies.
    Signature { value: String },
    /// A tool result echoed back to the provider. Request-direction only.
    FunctionResponse {
        name: String,
        response: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn thought(text: impl Into<String>) -> Self {
        Self::ThoughtDelta { text: text.into() }
    }

    /// Whether this part carries visible (non-thought) content.
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            Self::TextDelta { .. }
                | Self::FileData { .. }
                | Self::ExecutableCode { .. }
                | Self::CodeResult { .. }
        )
    }

    /// Render the exact provider wire JSON for this part.
    ///
    /// Function-call parts serialize with their signature attached so the
    /// echoed turn is byte-identical to the part originally received.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::TextDelta { text } => json!({ "text": text }),
            Self::ThoughtDelta { text } => json!({ "text": text, "thought": true }),
            Self::FileData { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
            Self::FileRef { mime_type, uri } => json!({
                "fileData": { "mimeType": mime_type, "fileUri": uri }
            }),
            Self::ExecutableCode { language, code } => json!({
                "executableCode": { "language": language, "code": code }
            }),
            Self::CodeResult { outcome, output } => {
                let mut inner = json!({ "outcome": outcome });
                if let Some(out) = output {
                    inner["output"] = json!(out);
                }
                json!({ "codeExecutionResult": inner })
            }
            Self::FunctionCall {
                name,
                args,
                signature,
            } => {
                let mut part = json!({ "functionCall": { "name": name, "args": args } });
                if let Some(sig) = signature {
                    part["thoughtSignature"] = json!(sig);
                }
                part
            }
            Self::Signature { value } => json!({ "thoughtSignature": value }),
            Self::FunctionResponse {
                name,
                response,
                signature,
            } => {
                let mut part = json!({
                    "functionResponse": { "name": name, "response": response }
                });
                if let Some(sig) = signature {
                    part["thoughtSignature"] = json!(sig);
                }
                part
            }
        }
    }

    /// Parse a provider wire part. Returns `None` for part shapes the
    /// pipeline does not consume (e.g. video metadata).
    pub fn from_wire(value: &Value) -> Option<Self> {
        let signature = value
            .get("thoughtSignature")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(fc) = value.get("functionCall") {
            return Some(Self::FunctionCall {
                name: fc.get("name")?.as_str()?.to_string(),
                args: fc.get("args").cloned().unwrap_or_else(|| json!({})),
                signature,
            });
        }
        if let Some(text) = value.get("text").and_then(Value::as_str) {
            let is_thought = value
                .get("thought")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            return Some(if is_thought {
                Self::ThoughtDelta { text: text.to_string() }
            } else {
                Self::TextDelta { text: text.to_string() }
            });
        }
        if let Some(file) = value.get("fileData") {
            return Some(Self::FileRef {
                mime_type: file.get("mimeType")?.as_str()?.to_string(),
                uri: file.get("fileUri")?.as_str()?.to_string(),
            });
        }
        if let Some(inline) = value.get("inlineData") {
            return Some(Self::FileData {
                mime_type: inline.get("mimeType")?.as_str()?.to_string(),
                data: inline.get("data")?.as_str()?.to_string(),
            });
        }
        if let Some(code) = value.get("executableCode") {
            return Some(Self::ExecutableCode {
                language: code.get("language")?.as_str()?.to_string(),
                code: code.get("code")?.as_str()?.to_string(),
            });
        }
        if let Some(result) = value.get("codeExecutionResult") {
            return Some(Self::CodeResult {
                outcome: result.get("outcome")?.as_str()?.to_string(),
                output: result
                    .get("output")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        // A part with only a thoughtSignature and no other payload.
        if signature.is_some() && value.as_object().map_or(false, |o| o.len() == 1) {
            return Some(Self::Signature {
                value: signature.unwrap(),
            });
        }
        None
    }

    /// Attach a bare signature to this part, if it can carry one.
    /// Returns `false` when the part has no signature slot.
    pub fn attach_signature(&mut self, sig: &str) -> bool {
        match self {
            Self::FunctionCall { signature, .. } | Self::FunctionResponse { signature, .. } => {
                if signature.is_none() {
                    *signature = Some(sig.to_string());
                }
                true
            }
            _ => false,
        }
    }
}
