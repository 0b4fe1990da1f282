//! Per-job accumulation buffer.

use base64::Engine;
use tracing::debug;

use crate::types::{MessageFile, Part};

/// MIME types accepted for inline files, beyond the prefix families below.
const ALLOWED_MIME_EXACT: &[&str] = &[
    "application/pdf",
    "application/json",
    "application/javascript",
    "application/xml",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "application/rtf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

const ALLOWED_MIME_PREFIXES: &[&str] = &["image/", "audio/", "video/", "text/"];

fn mime_supported(mime: &str) -> bool {
    ALLOWED_MIME_PREFIXES.iter().any(|p| mime.starts_with(p))
        || ALLOWED_MIME_EXACT.contains(&mime)
}

/// Transient per-job scratch state, owned exclusively by the active job and
/// never visible outside the pipeline until the finalizer flushes it.
///
/// Appends are pure concatenation: no normalization, trimming, or
/// deduplication.
#[derive(Debug, Default)]
pub struct Accumulator {
    pub text: String,
    pub thoughts: String,
    pub files: Vec<MessageFile>,
    pub raw_parts: Vec<Part>,
    pub signatures: Vec<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one part to the appropriate buffer field.
    pub fn on_part(&mut self, part: &Part) {
        match part {
            Part::TextDelta { text } => self.text.push_str(text),
            Part::ThoughtDelta { text } => self.thoughts.push_str(text),
            Part::FileData { mime_type, data } => {
                if !mime_supported(mime_type) {
                    debug!(mime = %mime_type, "dropping inline file with unsupported type");
                    return;
                }
                match base64::engine::general_purpose::STANDARD.decode(data) {
                    Ok(bytes) => {
                        let name = format!("generated-{}", self.files.len() + 1);
                        self.files.push(MessageFile::inline(name, mime_type, bytes));
                    }
                    Err(e) => {
                        debug!(mime = %mime_type, error = %e, "dropping undecodable inline file");
                        return;
                    }
                }
            }
            Part::ExecutableCode { .. } | Part::CodeResult { .. } => {}
            Part::Signature { value } => {
                self.signatures.push(value.clone());
                return;
            }
            // Function calls belong to the executor; responses and upload
            // references are request-direction parts.
            Part::FunctionCall { .. } | Part::FunctionResponse { .. } | Part::FileRef { .. } => {
                return
            }
        }
        self.raw_parts.push(part.clone());
    }

    /// Whether nothing visible has accumulated.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.thoughts.is_empty() && self.files.is_empty()
    }
}
