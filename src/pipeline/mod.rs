//! The streaming generation pipeline.
//!
//! `ChatPipeline` ties the components together: pre-flight checks, one
//! spawned task per generation job, the tool-call loop, finalization, and
//! the optimistic history commit. The job registry spans the whole flow so
//! jobs can be cancelled externally at any point.

pub mod accumulator;
pub mod executor;
pub mod finalizer;
pub mod history;
pub mod registry;
pub mod request;
pub mod stream;

pub use accumulator::Accumulator;
pub use executor::{run_loop, MAX_TOOL_DEPTH};
pub use finalizer::{finalize, looks_like_prose, Disposition, FinalizeAction};
pub use history::{derive_title, last_cumulative_tokens, reconcile, update_message, SessionPatch};
pub use registry::{GenerationJob, JobRegistry};
pub use request::{build_request, RequestInput, TurnMode};
pub use stream::{consume_stream, StreamOutput};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::credentials::CredentialResolver;
use crate::error::{Result, TernError};
use crate::models;
use crate::provider::{Content, ProviderRequest, RequestConfig, StreamingProvider};
use crate::store::SessionStore;
use crate::tools::{ReadFileTool, Tool, Workspace};
use crate::types::{ChatMessage, GenerationSettings, MessageFile, Part, Role};

/// Receives best-effort visualization artifacts from the side job.
pub trait ArtifactSink: Send + Sync {
    fn on_artifact(&self, session_id: &str, message_id: &str, artifact: String);
}

/// Terminal result of one generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Handle for an in-flight generation.
#[derive(Debug)]
pub struct GenerationHandle {
    pub generation_id: String,
    result: oneshot::Receiver<Outcome>,
}

impl GenerationHandle {
    /// Wait for the job to reach a terminal state.
    pub async fn wait(self) -> Outcome {
        self.result.await.unwrap_or(Outcome::Cancelled)
    }
}

/// A send/resend action.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub session_id: String,
    pub model: String,
    pub text: String,
    pub files: Vec<MessageFile>,
    pub settings: GenerationSettings,
    /// Truncate the session at this message id before appending. Edit-and-
    /// resend reuses the send path through this field.
    pub rewind_at: Option<String>,
    /// Open the model turn in raw completion style. Only for models
    /// declaring support.
    pub raw_mode: bool,
}

/// The streaming generation pipeline.
pub struct ChatPipeline {
    provider: Arc<dyn StreamingProvider>,
    store: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialResolver>,
    registry: Arc<JobRegistry>,
    workspace: Option<Arc<dyn Workspace>>,
    tools: Arc<Vec<Box<dyn Tool>>>,
    artifact_sink: Option<Arc<dyn ArtifactSink>>,
    system_instruction: Option<String>,
    /// Generation ids that already received their one automatic
    /// continuation.
    continuation_attempts: Arc<Mutex<HashSet<String>>>,
}

impl ChatPipeline {
    pub fn new(
        provider: Arc<dyn StreamingProvider>,
        store: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            provider,
            store,
            credentials,
            registry: Arc::new(JobRegistry::new()),
            workspace: None,
            tools: Arc::new(Vec::new()),
            artifact_sink: None,
            system_instruction: None,
            continuation_attempts: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Attach a workspace; enables the `read_file` tool.
    pub fn with_workspace(mut self, workspace: Arc<dyn Workspace>) -> Self {
        self.tools = Arc::new(vec![
            Box::new(ReadFileTool::new(workspace.clone())) as Box<dyn Tool>
        ]);
        self.workspace = Some(workspace);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_artifact_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.artifact_sink = Some(sink);
        self
    }

    /// The injectable job registry (for observation and tests).
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Request cooperative cancellation of a job. Unknown ids are a no-op.
    pub fn cancel(&self, generation_id: &str) {
        self.registry.cancel(generation_id);
    }

    /// Send a new user turn (or edit-and-resend via `rewind_at`).
    ///
    /// Pre-flight failures (missing model, missing credential, raw mode on
    /// an unsupporting model) surface before any job is registered.
    pub async fn send(&self, req: SendRequest) -> Result<GenerationHandle> {
        if req.model.is_empty() {
            return Err(TernError::Configuration("no model id selected".into()));
        }
        let traits = models::traits_for(&req.model);
        if req.raw_mode && !traits.supports_raw_mode {
            return Err(TernError::Configuration(format!(
                "model {} does not support raw mode",
                req.model
            )));
        }

        let sessions = self.store.snapshot().await;
        let session = sessions.iter().find(|s| s.id == req.session_id);
        let locked_key = session.and_then(|s| s.locked_api_key.clone());
        let credential = self.credentials.resolve(locked_key.as_deref()).await?;

        // History for the request: the session's messages, minus anything
        // at or after the rewind point.
        let mut base_history: Vec<ChatMessage> = session
            .map(|s| s.messages.clone())
            .unwrap_or_default();
        if let Some(rewind_id) = &req.rewind_at {
            if let Some(idx) = base_history.iter().position(|m| &m.id == rewind_id) {
                base_history.truncate(idx);
            }
        }
        let prev_cumulative = base_history
            .iter()
            .filter_map(|m| m.cumulative_total_tokens)
            .last()
            .unwrap_or(0);

        let user_message = ChatMessage::user(req.text.clone(), req.files.clone());
        let loading = ChatMessage::loading_model(Utc::now());
        let generation_id = loading.id.clone();

        let cancel = self.registry.register(&generation_id, &req.session_id)?;

        // Server-side uploads are scoped to the credential that made them:
        // a rotated key plus a remote file reference pins the key.
        let lock_api_key = (credential.rotated && req.files.iter().any(MessageFile::is_remote))
            .then(|| credential.api_key.clone());

        let patch = SessionPatch {
            session_id: req.session_id.clone(),
            new_messages: vec![user_message.clone(), loading.clone()],
            rewind_at: req.rewind_at.clone(),
            settings: req.settings.clone(),
            lock_api_key,
        };
        if let Err(e) = self
            .store
            .update(Box::new(move |prev| reconcile(prev, patch, Utc::now())))
            .await
        {
            self.registry.release(&generation_id);
            return Err(e);
        }

        let mode = if req.raw_mode {
            TurnMode::Raw
        } else {
            TurnMode::Normal
        };

        Ok(self.spawn_job(JobSpec {
            generation_id,
            session_id: req.session_id,
            model: req.model,
            settings: req.settings,
            base_history,
            user_message: Some(user_message),
            message: loading,
            text: req.text,
            files: req.files,
            mode,
            api_key: credential.api_key,
            prev_cumulative,
            cancel,
        }))
    }

    /// Resume generation of an existing model message.
    pub async fn continue_generation(
        &self,
        session_id: &str,
        message_id: &str,
        model: &str,
    ) -> Result<GenerationHandle> {
        if model.is_empty() {
            return Err(TernError::Configuration("no model id selected".into()));
        }
        let sessions = self.store.snapshot().await;
        let session = sessions
            .iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| TernError::InvalidState(format!("unknown session {session_id}")))?;
        let idx = session
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| TernError::InvalidState(format!("unknown message {message_id}")))?;
        let target = &session.messages[idx];
        if target.role != Role::Model {
            return Err(TernError::InvalidState(
                "only model messages can be continued".into(),
            ));
        }
        let credential = self
            .credentials
            .resolve(session.locked_api_key.as_deref())
            .await?;

        let base_history = session.messages[..idx].to_vec();
        let prev_cumulative = last_cumulative_tokens(session, message_id);
        let settings = session.settings.clone();

        let cancel = self.registry.register(message_id, session_id)?;

        // Re-open the message while the continuation streams.
        let sid = session_id.to_string();
        let mid = message_id.to_string();
        if let Err(e) = self
            .store
            .update(Box::new(move |prev| {
                update_message(prev, &sid, &mid, |m| m.is_loading = true)
            }))
            .await
        {
            self.registry.release(message_id);
            return Err(e);
        }

        let mut message = target.clone();
        message.is_loading = true;

        Ok(self.spawn_job(JobSpec {
            generation_id: message_id.to_string(),
            session_id: session_id.to_string(),
            model: model.to_string(),
            settings,
            base_history,
            user_message: None,
            message,
            text: String::new(),
            files: Vec::new(),
            mode: TurnMode::Continue,
            api_key: credential.api_key,
            prev_cumulative,
            cancel,
        }))
    }

    /// Discard a model message and generate a fresh reply from the turns
    /// before it.
    pub async fn regenerate(
        &self,
        session_id: &str,
        message_id: &str,
        model: &str,
    ) -> Result<GenerationHandle> {
        if model.is_empty() {
            return Err(TernError::Configuration("no model id selected".into()));
        }
        let sessions = self.store.snapshot().await;
        let session = sessions
            .iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| TernError::InvalidState(format!("unknown session {session_id}")))?;
        let idx = session
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| TernError::InvalidState(format!("unknown message {message_id}")))?;
        let credential = self
            .credentials
            .resolve(session.locked_api_key.as_deref())
            .await?;

        let base_history = session.messages[..idx].to_vec();
        let prev_cumulative = last_cumulative_tokens(session, message_id);
        let settings = session.settings.clone();

        let loading = ChatMessage::loading_model(Utc::now());
        let generation_id = loading.id.clone();
        let cancel = self.registry.register(&generation_id, session_id)?;

        let patch = SessionPatch {
            session_id: session_id.to_string(),
            new_messages: vec![loading.clone()],
            rewind_at: Some(message_id.to_string()),
            settings: settings.clone(),
            lock_api_key: None,
        };
        if let Err(e) = self
            .store
            .update(Box::new(move |prev| reconcile(prev, patch, Utc::now())))
            .await
        {
            self.registry.release(&generation_id);
            return Err(e);
        }

        Ok(self.spawn_job(JobSpec {
            generation_id,
            session_id: session_id.to_string(),
            model: model.to_string(),
            settings,
            base_history,
            user_message: None,
            message: loading,
            text: String::new(),
            files: Vec::new(),
            mode: TurnMode::Normal,
            api_key: credential.api_key,
            prev_cumulative,
            cancel,
        }))
    }

    fn spawn_job(&self, spec: JobSpec) -> GenerationHandle {
        let (result_tx, result_rx) = oneshot::channel();
        let handle = GenerationHandle {
            generation_id: spec.generation_id.clone(),
            result: result_rx,
        };

        let provider = self.provider.clone();
        let store = self.store.clone();
        let registry = self.registry.clone();
        let workspace = self.workspace.clone();
        let tools = self.tools.clone();
        let artifact_sink = self.artifact_sink.clone();
        let system_instruction = self.system_instruction.clone();
        let attempts = self.continuation_attempts.clone();

        tokio::spawn(async move {
            let outcome = run_job(
                spec,
                provider,
                store,
                registry,
                workspace,
                tools,
                artifact_sink,
                system_instruction,
                attempts,
            )
            .await;
            let _ = result_tx.send(outcome);
        });

        handle
    }
}

/// Everything one spawned job needs, owned.
struct JobSpec {
    generation_id: String,
    session_id: String,
    model: String,
    settings: GenerationSettings,
    /// Request-facing history, ending before the new turn.
    base_history: Vec<ChatMessage>,
    /// The user turn added by this action, if any.
    user_message: Option<ChatMessage>,
    /// Working copy of the model message this job owns.
    message: ChatMessage,
    text: String,
    files: Vec<MessageFile>,
    mode: TurnMode,
    api_key: String,
    prev_cumulative: u64,
    cancel: tokio_util::sync::CancellationToken,
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    mut spec: JobSpec,
    provider: Arc<dyn StreamingProvider>,
    store: Arc<dyn SessionStore>,
    registry: Arc<JobRegistry>,
    workspace: Option<Arc<dyn Workspace>>,
    tools: Arc<Vec<Box<dyn Tool>>>,
    artifact_sink: Option<Arc<dyn ArtifactSink>>,
    system_instruction: Option<String>,
    attempts: Arc<Mutex<HashSet<String>>>,
) -> Outcome {
    let traits = models::traits_for(&spec.model);
    let mut cancel = spec.cancel.clone();

    let outcome = loop {
        // The request sees the base history, the new user turn, and, when
        // resuming, the partial model message itself.
        let mut history = spec.base_history.clone();
        if let Some(user) = &spec.user_message {
            history.push(user.clone());
        }
        if spec.mode == TurnMode::Continue {
            history.push(spec.message.clone());
        }

        let input = RequestInput {
            model: &spec.model,
            history: &history,
            text: &spec.text,
            files: &spec.files,
            settings: &spec.settings,
            system_instruction: system_instruction.as_deref(),
            mode: spec.mode,
        };
        let built = build_request(input, workspace.as_deref(), &tools).await;

        let mut acc = Accumulator::new();
        let run = match built {
            Ok(request) => {
                run_loop(
                    provider.as_ref(),
                    &spec.api_key,
                    request,
                    &tools,
                    &mut acc,
                    &registry,
                    &spec.generation_id,
                    &cancel,
                )
                .await
            }
            Err(e) => Err(e),
        };

        let Some(job) = registry.release(&spec.generation_id) else {
            warn!(generation_id = %spec.generation_id, "job vanished from registry");
            break Outcome::Failed("job vanished from registry".into());
        };

        let (disposition, usage, outcome) = match run {
            Ok(output) if output.cancelled => {
                (Disposition::Cancelled, output.usage, Outcome::Cancelled)
            }
            Ok(output) => (Disposition::Completed, output.usage, Outcome::Completed),
            Err(e) => {
                let reason = e.to_string();
                (Disposition::Failed(e), None, Outcome::Failed(reason))
            }
        };

        let attempted = attempts
            .lock()
            .unwrap()
            .contains(&spec.generation_id);
        let action = finalize(
            &mut spec.message,
            &job,
            acc,
            usage.as_ref(),
            disposition,
            traits.fast_tier,
            attempted,
            spec.prev_cumulative,
        );

        match action {
            FinalizeAction::AutoContinue => {
                debug!(
                    generation_id = %spec.generation_id,
                    "empty fast-tier response, attempting automatic continuation"
                );
                attempts
                    .lock()
                    .unwrap()
                    .insert(spec.generation_id.clone());
                cancel = match registry.register(&spec.generation_id, &spec.session_id) {
                    Ok(token) => token,
                    Err(e) => break Outcome::Failed(e.to_string()),
                };
                spec.message.is_loading = true;
                spec.mode = TurnMode::Continue;
                if let Some(user) = spec.user_message.take() {
                    spec.base_history.push(user);
                }
                spec.text.clear();
                spec.files.clear();
            }
            FinalizeAction::Done => break outcome,
        }
    };

    // Commit the keyed patch: only this job's message is touched, so
    // concurrent jobs' commits interleave without lost updates.
    let final_message = spec.message.clone();
    let session_id = spec.session_id.clone();
    let message_id = spec.generation_id.clone();
    if let Err(e) = store
        .update(Box::new(move |prev| {
            update_message(prev, &session_id, &message_id, |m| *m = final_message)
        }))
        .await
    {
        warn!(error = %e, "failed to commit finalized message");
        return Outcome::Failed(e.to_string());
    }

    if outcome == Outcome::Completed {
        maybe_spawn_visualization(&spec, provider, artifact_sink);
    }

    outcome
}

const VISUALIZATION_INSTRUCTION: &str = "Produce a single self-contained HTML document that \
visualizes the key points of the following answer. Respond with only the HTML.";

/// Best-effort side job: a stateless single-turn generation whose failure
/// never affects the primary result.
fn maybe_spawn_visualization(
    spec: &JobSpec,
    provider: Arc<dyn StreamingProvider>,
    sink: Option<Arc<dyn ArtifactSink>>,
) {
    let Some(sink) = sink else { return };
    if !spec.settings.auto_visualize
        || spec.message.role != Role::Model
        || !looks_like_prose(&spec.message.content)
    {
        return;
    }

    let request = ProviderRequest {
        model: spec.model.clone(),
        system_instruction: Some(VISUALIZATION_INSTRUCTION.to_string()),
        contents: vec![Content::user(vec![Part::text(spec.message.content.clone())])],
        config: RequestConfig::default(),
    };
    let api_key = spec.api_key.clone();
    let session_id = spec.session_id.clone();
    let message_id = spec.generation_id.clone();

    tokio::spawn(async move {
        let mut artifact = String::new();
        match provider.stream_generate(&api_key, &request).await {
            Ok(mut stream) => {
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(chunk) => {
                            for part in chunk.parts {
                                if let Part::TextDelta { text } = part {
                                    artifact.push_str(&text);
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "visualization stream failed");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "visualization request failed");
                return;
            }
        }
        if !artifact.is_empty() {
            sink.on_artifact(&session_id, &message_id, artifact);
        }
    });
}
