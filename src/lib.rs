//! Streaming generation pipeline for LLM chat clients.
//!
//! Issues a request to a remote generation provider, consumes the chunked
//! response, reconstructs heterogeneous content (text, thoughts, inline
//! files, executable code, tool calls), drives a bounded tool-call loop,
//! and reconciles the result into persisted, editable conversation history.
//! Supports cancellation, concurrent jobs, token accounting, and
//! partial-failure recovery.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tern::prelude::*;
//!
//! # async fn example() -> tern::error::Result<()> {
//! let pipeline = ChatPipeline::new(
//!     Arc::new(GeminiProvider::new()),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(EnvCredentialResolver::new()),
//! );
//! let handle = pipeline
//!     .send(SendRequest {
//!         session_id: "s1".into(),
//!         model: "gemini-2.5-pro".into(),
//!         text: "Hello!".into(),
//!         files: vec![],
//!         settings: GenerationSettings::default(),
//!         rewind_at: None,
//!         raw_mode: false,
//!     })
//!     .await?;
//! let outcome = handle.wait().await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod prelude;
pub mod provider;
pub mod store;
pub mod tools;
pub mod types;
