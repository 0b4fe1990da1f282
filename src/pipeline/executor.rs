//! Function-call executor: the bounded tool-use loop.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, TernError};
use crate::provider::{Content, ProviderRequest, StreamingProvider};
use crate::tools::Tool;
use crate::types::Part;

use super::accumulator::Accumulator;
use super::registry::JobRegistry;
use super::stream::{consume_stream, StreamOutput};

/// Maximum tool-loop iterations. The observed provider behavior has no
/// ceiling; a bound keeps a confused model from looping forever.
pub const MAX_TOOL_DEPTH: usize = 8;

/// Run the streaming loop until a response carries no function call.
///
/// On each detected call, the named tool executes locally, history is
/// extended with the verbatim call part and its result, and the stream is
/// re-opened with the same config and cancellation signal. Tool failures
/// are never fatal: they come back as the tool's result text so the model
/// can react.
pub async fn run_loop(
    provider: &dyn StreamingProvider,
    api_key: &str,
    mut request: ProviderRequest,
    tools: &[Box<dyn Tool>],
    acc: &mut Accumulator,
    registry: &JobRegistry,
    generation_id: &str,
    cancel: &CancellationToken,
) -> Result<StreamOutput> {
    let mut merged_grounding: Option<crate::provider::GroundingMetadata> = None;

    for depth in 0..MAX_TOOL_DEPTH {
        let stream = provider.stream_generate(api_key, &request).await?;
        let mut output = consume_stream(stream, acc, registry, generation_id, cancel).await?;

        if let Some(grounding) = output.grounding.take() {
            match merged_grounding.as_mut() {
                Some(existing) => existing.absorb(grounding),
                None => merged_grounding = Some(grounding),
            }
        }

        if output.cancelled || output.function_calls.is_empty() {
            output.grounding = merged_grounding;
            return Ok(output);
        }

        debug!(
            generation_id,
            depth,
            calls = output.function_calls.len(),
            "executing function calls"
        );

        let mut response_parts = Vec::with_capacity(output.function_calls.len());
        for call in &output.function_calls {
            let Part::FunctionCall {
                name,
                args,
                signature,
            } = call
            else {
                continue;
            };
            let result = execute_tool(tools, name, args).await;
            response_parts.push(Part::FunctionResponse {
                name: name.clone(),
                response: result,
                signature: signature.clone(),
            });
        }

        // The call parts go back verbatim as a model turn, followed by a
        // user turn carrying the results. All context now lives in history;
        // the next iteration sends no new turn.
        request.contents.push(Content::model(output.function_calls));
        request.contents.push(Content::user(response_parts));
    }

    Err(TernError::Stream(format!(
        "tool loop exceeded maximum depth of {MAX_TOOL_DEPTH}"
    )))
}

/// Execute one named tool. Unknown names and execution failures produce a
/// synthetic error payload fed back as the tool's result.
async fn execute_tool(
    tools: &[Box<dyn Tool>],
    name: &str,
    args: &serde_json::Value,
) -> serde_json::Value {
    let Some(tool) = tools.iter().find(|t| t.name() == name) else {
        warn!(tool = name, "model called an unknown tool");
        return json!({ "error": format!("unknown tool '{name}'") });
    };
    match tool.execute(args).await {
        Ok(value) => value,
        Err(e) => {
            warn!(tool = name, error = %e, "tool execution failed");
            json!({ "error": e.to_string() })
        }
    }
}
