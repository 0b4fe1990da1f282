//! Persisted session store.
//!
//! The pipeline never touches physical storage; it hands the store
//! whole-list functional updates and the store applies them against its
//! latest snapshot. Deriving the next state from the snapshot at commit
//! time is what keeps concurrent jobs from losing each other's updates.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::ChatSession;

/// A whole-list functional update: `prev → next`.
pub type SessionUpdate = Box<dyn FnOnce(Vec<ChatSession>) -> Vec<ChatSession> + Send>;

/// Durable session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Apply a functional update against the latest snapshot.
    async fn update(&self, update: SessionUpdate) -> Result<()>;

    /// Read the current session list.
    async fn snapshot(&self) -> Vec<ChatSession>;
}

/// In-memory store; the default for tests and embedding applications.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<Vec<ChatSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn update(&self, update: SessionUpdate) -> Result<()> {
        let mut guard = self.sessions.write().await;
        let prev = std::mem::take(&mut *guard);
        *guard = update(prev);
        Ok(())
    }

    async fn snapshot(&self) -> Vec<ChatSession> {
        self.sessions.read().await.clone()
    }
}
