//! Job registry: at-most-one active job per generation id.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, TernError};

/// One in-flight generation request, uniquely keyed by generation id.
///
/// The registry owns the job exclusively; [`JobRegistry::release`] transfers
/// ownership out (to the finalizer) and destroys the registry entry.
#[derive(Debug)]
pub struct GenerationJob {
    pub id: String,
    pub session_id: String,
    pub cancel: CancellationToken,
    pub started_at: Instant,
    pub first_token_at: Option<Instant>,
    pub first_content_at: Option<Instant>,
}

impl GenerationJob {
    fn new(id: String, session_id: String, cancel: CancellationToken) -> Self {
        Self {
            id,
            session_id,
            cancel,
            started_at: Instant::now(),
            first_token_at: None,
            first_content_at: None,
        }
    }

    /// Milliseconds from request start to first token, if one arrived.
    pub fn first_token_ms(&self) -> Option<u64> {
        self.first_token_at
            .map(|t| t.duration_since(self.started_at).as_millis() as u64)
    }

    /// Milliseconds from request start to first visible content.
    pub fn thinking_ms(&self) -> Option<u64> {
        self.first_content_at
            .map(|t| t.duration_since(self.started_at).as_millis() as u64)
    }
}

/// Injectable registry of in-flight jobs.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, GenerationJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job. A duplicate id signals a programming defect, not
    /// a user-facing failure.
    pub fn register(&self, id: &str, session_id: &str) -> Result<CancellationToken> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(id) {
            return Err(TernError::InvalidState(format!(
                "generation {id} already has an active job"
            )));
        }
        let token = CancellationToken::new();
        jobs.insert(
            id.to_string(),
            GenerationJob::new(id.to_string(), session_id.to_string(), token.clone()),
        );
        Ok(token)
    }

    /// Request cancellation. Idempotent; unknown ids are a no-op. The signal
    /// is observed cooperatively at the next suspension point.
    pub fn cancel(&self, id: &str) {
        let jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get(id) {
            job.cancel.cancel();
        }
    }

    /// Remove the job and transfer ownership to the caller.
    pub fn release(&self, id: &str) -> Option<GenerationJob> {
        self.jobs.lock().unwrap().remove(id)
    }

    /// Stamp the first-token time. Idempotent.
    pub fn mark_first_token(&self, id: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(id) {
            job.first_token_at.get_or_insert_with(Instant::now);
        }
    }

    /// Stamp the first visible-content time. Idempotent.
    pub fn mark_first_content(&self, id: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(id) {
            job.first_content_at.get_or_insert_with(Instant::now);
        }
    }

    /// Whether a live entry exists for this id.
    pub fn is_active(&self, id: &str) -> bool {
        self.jobs.lock().unwrap().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = JobRegistry::new();
        registry.register("g1", "s1").unwrap();
        assert!(matches!(
            registry.register("g1", "s1"),
            Err(TernError::InvalidState(_))
        ));
    }

    #[test]
    fn cancel_unknown_id_is_a_noop() {
        let registry = JobRegistry::new();
        registry.cancel("missing");
    }

    #[test]
    fn cancel_is_idempotent_and_sets_the_signal() {
        let registry = JobRegistry::new();
        let token = registry.register("g1", "s1").unwrap();
        registry.cancel("g1");
        registry.cancel("g1");
        assert!(token.is_cancelled());
    }

    #[test]
    fn release_transfers_ownership() {
        let registry = JobRegistry::new();
        registry.register("g1", "s1").unwrap();
        let job = registry.release("g1").unwrap();
        assert_eq!(job.id, "g1");
        assert!(!registry.is_active("g1"));
        assert!(registry.release("g1").is_none());
    }

    #[test]
    fn first_token_stamp_is_idempotent() {
        let registry = JobRegistry::new();
        registry.register("g1", "s1").unwrap();
        registry.mark_first_token("g1");
        let first = {
            let jobs = registry.jobs.lock().unwrap();
            jobs["g1"].first_token_at.unwrap()
        };
        registry.mark_first_token("g1");
        let second = {
            let jobs = registry.jobs.lock().unwrap();
            jobs["g1"].first_token_at.unwrap()
        };
        assert_eq!(first, second);
    }
}
