//! Commonly used items, re-exported.

pub use crate::credentials::{
    Credential, CredentialResolver, EnvCredentialResolver, StaticCredentialResolver,
};
pub use crate::error::{Result, TernError};
pub use crate::pipeline::{
    ArtifactSink, ChatPipeline, GenerationHandle, JobRegistry, Outcome, SendRequest, TurnMode,
};
pub use crate::provider::{
    ChunkStream, Content, GeminiProvider, ProviderRequest, StreamChunk, StreamingProvider,
    TurnRole,
};
pub use crate::store::{MemoryStore, SessionStore};
pub use crate::tools::{DirWorkspace, ReadFileTool, Tool, Workspace};
pub use crate::types::{
    BuiltinTool, ChatMessage, ChatSession, FileSource, GenerationSettings, MessageFile, Part,
    Role, ThinkingLevel, UsageMetadata,
};
