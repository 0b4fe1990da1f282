//! Finalizer: flushes the accumulator into the persisted message and
//! applies completion policy.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

use crate::error::TernError;
use crate::types::{ChatMessage, Role, UsageMetadata};

use super::accumulator::Accumulator;
use super::registry::GenerationJob;

/// How the stream ended.
#[derive(Debug)]
pub enum Disposition {
    Completed,
    Cancelled,
    Failed(TernError),
}

/// What the caller must do after finalization.
#[derive(Debug, PartialEq, Eq)]
pub enum FinalizeAction {
    Done,
    /// Empty response on a fast-tier model: trigger exactly one automatic
    /// continuation against the same message id.
    AutoContinue,
}

/// Flush the accumulator into the message and settle its terminal state.
///
/// The buffer is consumed here; this is the only place persisted state is
/// touched with generation output. Content appends so that continue-mode
/// jobs extend the re-opened message rather than replacing it.
#[allow(clippy::too_many_arguments)]
pub fn finalize(
    message: &mut ChatMessage,
    job: &GenerationJob,
    acc: Accumulator,
    usage: Option<&UsageMetadata>,
    disposition: Disposition,
    fast_tier: bool,
    continuation_attempted: bool,
    prev_cumulative: u64,
) -> FinalizeAction {
    message.content.push_str(&acc.text);
    if !acc.thoughts.is_empty() {
        message
            .thoughts
            .get_or_insert_with(String::new)
            .push_str(&acc.thoughts);
    }
    message.files.extend(acc.files);
    message.raw_parts.extend(acc.raw_parts);
    message.signatures.extend(acc.signatures);
    message.is_loading = false;
    message.generation_end_time = Some(Utc::now());

    match disposition {
        Disposition::Cancelled => {
            // Partial content stands as-is; no empty-response substitution,
            // no error text.
            FinalizeAction::Done
        }
        Disposition::Failed(err) => {
            if !message.content.is_empty() {
                message.content.push_str("\n\n");
            }
            message.content.push_str(&format!("Error: {err}"));
            message.role = Role::Error;
            FinalizeAction::Done
        }
        Disposition::Completed => {
            if message.thinking_time_ms.is_none() {
                message.thinking_time_ms = job.thinking_ms();
            }
            if message.first_token_time_ms.is_none() {
                message.first_token_time_ms = job.first_token_ms();
            }
            if let Some(usage) = usage {
                message.prompt_tokens = Some(usage.prompt_token_count);
                message.completion_tokens = Some(usage.completion_tokens());
                message.total_tokens = Some(usage.total_token_count);
                message.cumulative_total_tokens =
                    Some(prev_cumulative + u64::from(usage.total_token_count));
            }

            if message.is_empty_response() {
                if fast_tier && !continuation_attempted {
                    return FinalizeAction::AutoContinue;
                }
                message.role = Role::Error;
                message.content = "The model returned an empty response.".to_string();
            }
            FinalizeAction::Done
        }
    }
}

/// Heuristic for the auto-visualization side job: prose qualifies, markup
/// and code-dominated answers do not.
pub fn looks_like_prose(text: &str) -> bool {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    let markup = MARKUP.get_or_init(|| {
        Regex::new(r"(?s)^\s*<(!DOCTYPE|html|svg|\?xml)").expect("valid regex")
    });

    let trimmed = text.trim();
    if trimmed.len() < 80 || markup.is_match(trimmed) {
        return false;
    }
    // Mostly fenced code is not prose.
    let fenced: usize = trimmed
        .split("```")
        .skip(1)
        .step_by(2)
        .map(str::len)
        .sum();
    fenced * 2 < trimmed.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_is_not_prose() {
        assert!(!looks_like_prose("<!DOCTYPE html><html><body>hello</body></html>"));
        assert!(!looks_like_prose("<svg xmlns='http://www.w3.org/2000/svg'></svg>"));
    }

    #[test]
    fn long_plain_text_is_prose() {
        let text = "The tidal bore travels upstream twice a day, and the \
                    fishing fleet times its departures around the turn.";
        assert!(looks_like_prose(text));
    }

    #[test]
    fn code_dominated_answers_are_not_prose() {
        let text = "Here you go:\n```rust\nfn main() { println!(\"hi\"); }\nfn other() {}\nfn more() {}\nfn again() {}\n```";
        assert!(!looks_like_prose(text));
    }
}
