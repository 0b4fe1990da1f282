//! Core types for the generation pipeline.

pub mod message;
pub mod part;
pub mod settings;
pub mod usage;

pub use message::{ChatMessage, ChatSession, FileSource, MessageFile, Role};
pub use part::Part;
pub use settings::{BuiltinTool, FinishReason, GenerationSettings, ThinkingLevel};
pub use usage::UsageMetadata;
