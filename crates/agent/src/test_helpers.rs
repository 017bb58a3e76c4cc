//! Shared test helpers: scripted providers and response builders.

use crate::context::ContextAssembler;
use async_trait::async_trait;
use ragrelay_core::error::ProviderError;
use ragrelay_core::message::{Message, MessageToolCall};
use ragrelay_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use ragrelay_config::RetrievalConfig;
use ragrelay_providers::ProviderRouter;
use ragrelay_store::{InMemoryVectorStore, StaticCatalog};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    embedding: Option<Vec<f32>>,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            embedding: None,
            delay: Duration::ZERO,
        }
    }

    pub fn replies(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn single_text(text: &str) -> Self {
        Self::replies(vec![text_response(text)])
    }

    /// Answer `embed` with this vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Sleep before every completion.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no more responses"))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let embedding = self
            .embedding
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("scripted embeddings".into()))?;
        Ok(EmbeddingResponse {
            embeddings: vec![embedding; request.inputs.len()],
            model: request.model,
            usage: None,
        })
    }
}

/// A router whose default provider ("openai") is `provider`.
pub fn router_with(provider: Arc<dyn Provider>) -> ProviderRouter {
    let mut router = ProviderRouter::new("openai");
    router.register("openai", provider);
    router
}

/// An assembler over empty in-memory stores, for agents without knowledge bases.
pub fn empty_assembler(provider: Arc<dyn Provider>) -> Arc<ContextAssembler> {
    Arc::new(ContextAssembler::new(
        router_with(provider),
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(StaticCatalog::default()),
        RetrievalConfig::default(),
    ))
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A plain text response (no tool calls).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// A response requesting tool calls.
pub fn tool_call_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls("", tool_calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
