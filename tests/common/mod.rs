//! Shared test helpers: a scripted mock provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use tern::error::TernError;
use tern::provider::{ChunkStream, ProviderRequest, StreamChunk, StreamingProvider};
use tern::types::{Part, UsageMetadata};

/// A mock provider that replays scripted chunk streams and captures every
/// request it receives.
#[derive(Default)]
pub struct MockStreamProvider {
    scripts: Mutex<VecDeque<Vec<StreamChunk>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockStreamProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one full stream of chunks for the next request.
    pub fn queue_stream(&self, chunks: Vec<StreamChunk>) {
        self.scripts.lock().unwrap().push_back(chunks);
    }

    /// Queue a stream that emits the given text deltas, then a final chunk
    /// carrying usage metadata.
    pub fn queue_text(&self, deltas: &[&str], usage: Option<UsageMetadata>) {
        let mut chunks: Vec<StreamChunk> = deltas.iter().map(|d| text_chunk(d)).collect();
        chunks.push(StreamChunk {
            usage,
            ..Default::default()
        });
        self.queue_stream(chunks);
    }

    /// Queue a stream that completes with no content at all.
    pub fn queue_empty(&self, usage: Option<UsageMetadata>) {
        self.queue_stream(vec![StreamChunk {
            usage,
            ..Default::default()
        }]);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamingProvider for MockStreamProvider {
    async fn stream_generate(
        &self,
        _api_key: &str,
        request: &ProviderRequest,
    ) -> Result<ChunkStream, TernError> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();

        let stream = async_stream::stream! {
            for chunk in chunks {
                yield Ok(chunk);
            }
        };
        Ok(Box::pin(stream))
    }
}

pub fn text_chunk(text: &str) -> StreamChunk {
    StreamChunk {
        parts: vec![Part::text(text)],
        ..Default::default()
    }
}

pub fn thought_chunk(text: &str) -> StreamChunk {
    StreamChunk {
        parts: vec![Part::thought(text)],
        ..Default::default()
    }
}

pub fn usage(prompt: u32, candidates: Option<u32>, total: u32) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: prompt,
        candidates_token_count: candidates,
        total_token_count: total,
        thoughts_token_count: None,
    }
}
