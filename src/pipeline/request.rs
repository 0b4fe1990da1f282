//! Request builder: assembles the provider request from history, the new
//! turn, and generation settings.

use base64::Engine;
use tracing::debug;

use crate::error::{Result, TernError};
use crate::models::{self, ModelTraits};
use crate::provider::{Content, ProviderRequest, RequestConfig};
use crate::tools::{file_preamble, Tool, Workspace};
use crate::types::{ChatMessage, FileSource, GenerationSettings, MessageFile, Part, Role};

/// How the new turn opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    /// Append an ordinary user turn.
    Normal,
    /// Resume generation of an existing model message: the new turn is
    /// `model`-role with a minimal continuation seed.
    Continue,
    /// Synthesize the pending user turn, then open a model turn with an
    /// unterminated reasoning-open delimiter. Only for models declaring
    /// support.
    Raw,
}

/// Inputs to one request assembly.
pub struct RequestInput<'a> {
    pub model: &'a str,
    /// Prior messages, already truncated at any edit point.
    pub history: &'a [ChatMessage],
    pub text: &'a str,
    pub files: &'a [MessageFile],
    pub settings: &'a GenerationSettings,
    pub system_instruction: Option<&'a str>,
    pub mode: TurnMode,
}

/// Build the provider request.
///
/// # Errors
///
/// [`TernError::Configuration`] pre-flight for a missing model id or a raw
/// mode request against a model without raw support. No job has been
/// registered when these surface.
pub async fn build_request(
    input: RequestInput<'_>,
    workspace: Option<&dyn Workspace>,
    tools: &[Box<dyn Tool>],
) -> Result<ProviderRequest> {
    if input.model.is_empty() {
        return Err(TernError::Configuration("no model id selected".into()));
    }
    let traits = models::traits_for(input.model);

    let mut contents = history_contents(input.history);
    append_new_turn(&mut contents, &input, &traits)?;

    let mut system_instruction = input.system_instruction.map(str::to_string);
    let mut config = assemble_config(input.settings);

    // Project file access: one read_file declaration plus a preamble
    // describing the available files.
    if let Some(ws) = workspace {
        let preamble = file_preamble(ws).await;
        if !preamble.is_empty() {
            system_instruction = Some(match system_instruction {
                Some(sys) => format!("{sys}\n\n{preamble}"),
                None => preamble,
            });
        }
        for tool in tools {
            config.function_declarations.push(tool.declaration());
        }
    }

    debug!(
        model = input.model,
        turns = contents.len(),
        mode = ?input.mode,
        "request assembled"
    );

    Ok(ProviderRequest {
        model: input.model.to_string(),
        system_instruction,
        contents,
        config,
    })
}

/// Convert persisted history into provider turns. Error messages never
/// reach the provider.
fn history_contents(history: &[ChatMessage]) -> Vec<Content> {
    let mut contents = Vec::with_capacity(history.len());
    for msg in history {
        match msg.role {
            Role::User => contents.push(Content::user(message_parts(msg))),
            Role::Model => {
                // Prefer the raw parts captured at stream time; they carry
                // thought flags and signatures the plain text does not.
                let parts = if msg.raw_parts.is_empty() {
                    if msg.content.is_empty() {
                        continue;
                    }
                    vec![Part::text(msg.content.clone())]
                } else {
                    msg.raw_parts.clone()
                };
                contents.push(Content::model(parts));
            }
            Role::Error => {}
        }
    }
    contents
}

fn message_parts(msg: &ChatMessage) -> Vec<Part> {
    let mut parts = Vec::new();
    if !msg.content.is_empty() {
        parts.push(Part::text(msg.content.clone()));
    }
    parts.extend(msg.files.iter().map(file_part));
    parts
}

fn file_part(file: &MessageFile) -> Part {
    match &file.source {
        FileSource::Inline { data } => Part::FileData {
            mime_type: file.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        },
        FileSource::Remote { uri } => Part::FileRef {
            mime_type: file.mime_type.clone(),
            uri: uri.clone(),
        },
    }
}

fn append_new_turn(
    contents: &mut Vec<Content>,
    input: &RequestInput<'_>,
    traits: &ModelTraits,
) -> Result<()> {
    match input.mode {
        TurnMode::Normal => {
            let mut parts = Vec::new();
            if !input.text.is_empty() {
                parts.push(Part::text(input.text));
            }
            parts.extend(input.files.iter().map(file_part));
            if !parts.is_empty() {
                contents.push(Content::user(parts));
            }
        }
        TurnMode::Continue => {
            // A minimal model-role seed makes the provider resume the
            // existing message instead of opening a new turn.
            let seed = models::continuation_seed(traits);
            contents.push(Content::model(vec![Part::text(seed)]));
        }
        TurnMode::Raw => {
            let Some(delimiter) = traits.reasoning_delimiter.filter(|_| traits.supports_raw_mode)
            else {
                return Err(TernError::Configuration(format!(
                    "model {} does not support raw mode",
                    input.model
                )));
            };
            let mut parts = Vec::new();
            if !input.text.is_empty() {
                parts.push(Part::text(input.text));
            }
            parts.extend(input.files.iter().map(file_part));
            if !parts.is_empty() {
                contents.push(Content::user(parts));
            }
            contents.push(Content::model(vec![Part::text(delimiter.open)]));
        }
    }
    Ok(())
}

/// Merge settings into the request config. Built-in tools are mutually
/// exclusive with structured output; enabling any clears the schema. A
/// positive numeric thinking budget wins over the level enum.
fn assemble_config(settings: &GenerationSettings) -> RequestConfig {
    let budget = settings.thinking_budget.filter(|b| *b > 0);
    let response_schema = if settings.tools.is_empty() {
        settings.response_schema.clone()
    } else {
        None
    };
    RequestConfig {
        temperature: settings.temperature,
        top_p: settings.top_p,
        thinking_budget: budget,
        thinking_level: if budget.is_some() {
            None
        } else {
            settings.thinking_level
        },
        builtin_tools: settings.tools.clone(),
        function_declarations: Vec::new(),
        response_schema,
    }
}
