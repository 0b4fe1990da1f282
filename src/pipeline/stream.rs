//! Stream adapter: drives the provider's chunked response and dispatches
//! parts.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Result;
use crate::provider::{ChunkStream, GroundingMetadata};
use crate::types::{FinishReason, Part, UsageMetadata};

use super::accumulator::Accumulator;
use super::registry::JobRegistry;

/// What one pass over a stream produced, beyond the accumulator contents.
#[derive(Debug, Default)]
pub struct StreamOutput {
    /// Function-call parts, preserved verbatim (signatures included).
    pub function_calls: Vec<Part>,
    pub usage: Option<UsageMetadata>,
    pub grounding: Option<GroundingMetadata>,
    pub finish_reason: Option<FinishReason>,
    /// The cancellation signal fired; remaining chunks were not consumed.
    pub cancelled: bool,
}

/// Consume a chunk stream, dispatching every part exactly once: text,
/// thought, code, and file parts to the accumulator; function calls into
/// the output for the executor. Bare signature parts are merged into the
/// part they accompany.
///
/// Parts are processed in arrival order with no reordering or buffering
/// beyond the current chunk. The cancellation signal is checked before each
/// chunk; once it fires, no further chunks are consumed.
pub async fn consume_stream(
    mut stream: ChunkStream,
    acc: &mut Accumulator,
    registry: &JobRegistry,
    generation_id: &str,
    cancel: &CancellationToken,
) -> Result<StreamOutput> {
    let mut output = StreamOutput::default();

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            output.cancelled = true;
            return Ok(output);
        }
        let chunk = chunk?;
        trace!(
            generation_id,
            parts = chunk.parts.len(),
            "chunk received"
        );

        for part in &chunk.parts {
            registry.mark_first_token(generation_id);
            if part.is_content() {
                registry.mark_first_content(generation_id);
            }
            match part {
                Part::FunctionCall { .. } => output.function_calls.push(part.clone()),
                Part::Signature { value } => {
                    // A bare signature belongs to the part it follows; only
                    // function calls have a slot for it.
                    match output.function_calls.last_mut() {
                        Some(fc) => {
                            fc.attach_signature(value);
                        }
                        None => acc.on_part(part),
                    }
                }
                _ => acc.on_part(part),
            }
        }

        if let Some(usage) = chunk.usage {
            output.usage = Some(usage);
        }
        if let Some(grounding) = chunk.grounding {
            match output.grounding.as_mut() {
                Some(existing) => existing.absorb(grounding),
                None => output.grounding = Some(grounding),
            }
        }
        if let Some(reason) = chunk.finish_reason {
            output.finish_reason = Some(reason);
        }
    }

    Ok(output)
}
