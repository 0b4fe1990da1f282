//! Credential resolution for the generation pipeline.
//!
//! The pipeline never chooses keys itself; an injected resolver supplies a
//! usable credential and signals the recoverable "not configured" condition
//! distinctly from hard failures.

use async_trait::async_trait;

use crate::error::{Result, TernError};

/// A resolved credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub api_key: String,
    /// Whether the resolver rotated to a different key than the previous
    /// request used. Relevant for sessions holding server-side uploads,
    /// which are credential-scoped.
    pub rotated: bool,
}

/// Supplies the credential for a generation request.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve a usable credential, honoring a session lock when present.
    ///
    /// # Errors
    ///
    /// Returns [`TernError::NotConfigured`] when no credential source is
    /// set up; any other error is a hard failure.
    async fn resolve(&self, locked_key: Option<&str>) -> Result<Credential>;
}

/// Environment-backed resolver (`GEMINI_API_KEY`, then `GOOGLE_API_KEY`).
#[derive(Debug, Default)]
pub struct EnvCredentialResolver;

impl EnvCredentialResolver {
    pub fn new() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve(&self, locked_key: Option<&str>) -> Result<Credential> {
        if let Some(key) = locked_key {
            return Ok(Credential {
                api_key: key.to_string(),
                rotated: false,
            });
        }
        let key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                TernError::NotConfigured(
                    "no API key: set GEMINI_API_KEY or GOOGLE_API_KEY".to_string(),
                )
            })?;
        Ok(Credential {
            api_key: key,
            rotated: false,
        })
    }
}

/// Fixed-key resolver, mainly for tests and embedding applications.
#[derive(Debug, Clone)]
pub struct StaticCredentialResolver {
    api_key: String,
    rotated: bool,
}

impl StaticCredentialResolver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            rotated: false,
        }
    }

    /// Mark the key as freshly rotated, as a pool-backed resolver would
    /// after switching keys.
    pub fn rotated(mut self) -> Self {
        self.rotated = true;
        self
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, locked_key: Option<&str>) -> Result<Credential> {
        if let Some(key) = locked_key {
            return Ok(Credential {
                api_key: key.to_string(),
                rotated: false,
            });
        }
        Ok(Credential {
            api_key: self.api_key.clone(),
            rotated: self.rotated,
        })
    }
}
