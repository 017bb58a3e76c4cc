//! Context assembly pipeline.
//!
//! `assemble` turns the user's message into the context block appended to
//! the agent prompt:
//!
//! 1. **Rewrite** the message into a standalone question (one auxiliary LLM call)
//! 2. **Embed** the standalone question
//! 3. **Search** every knowledge base through [`bounded_fan_out`]
//! 4. **Resolve** the files referenced by the retrieved chunks
//! 5. **Render** chunks grouped by file, see [`render_context`]
//!
//! The standalone question is used for retrieval only; the model still sees
//! the user's original message.

use ragrelay_config::{FailurePolicy, RetrievalConfig};
use ragrelay_core::agent::KnowledgeBaseRef;
use ragrelay_core::error::{Error, Result, StoreError};
use ragrelay_core::knowledge::{FileStore, RetrievedChunk, VectorStore};
use ragrelay_core::message::Message;
use ragrelay_core::provider::EmbeddingRequest;
use ragrelay_providers::ProviderRouter;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::render::render_context;
use super::standalone::rewrite_request;
use crate::fanout::bounded_fan_out;

pub struct ContextAssembler {
    router: ProviderRouter,
    vectors: Arc<dyn VectorStore>,
    files: Arc<dyn FileStore>,
    settings: RetrievalConfig,
}

impl ContextAssembler {
    pub fn new(
        router: ProviderRouter,
        vectors: Arc<dyn VectorStore>,
        files: Arc<dyn FileStore>,
        settings: RetrievalConfig,
    ) -> Self {
        Self {
            router,
            vectors,
            files,
            settings,
        }
    }

    /// Build the context block for one turn.
    ///
    /// Returns an empty string when there are no knowledge bases (without
    /// any LLM call) or when no chunk survives file resolution.
    pub async fn assemble(
        &self,
        message: &str,
        history: &[Message],
        knowledge_bases: &[KnowledgeBaseRef],
        instructions: Option<&str>,
    ) -> Result<String> {
        if knowledge_bases.is_empty() {
            return Ok(String::new());
        }

        let start = Instant::now();
        let question = self.standalone_question(message, history, instructions).await?;
        let vector = self.embed(&question).await?;
        let chunks = self.search_all(knowledge_bases, &vector).await?;

        let mut file_ids: Vec<String> = Vec::new();
        for chunk in &chunks {
            if !file_ids.contains(&chunk.file_id) {
                file_ids.push(chunk.file_id.clone());
            }
        }
        if file_ids.is_empty() {
            debug!(knowledge_bases = knowledge_bases.len(), "No chunks retrieved");
            return Ok(String::new());
        }

        let files = self.files.load_files_by_ids(&file_ids).await?;
        if files.len() < file_ids.len() {
            warn!(
                requested = file_ids.len(),
                resolved = files.len(),
                "Some retrieved files could not be resolved"
            );
        }

        let context = render_context(&chunks, &files);
        info!(
            knowledge_bases = knowledge_bases.len(),
            chunks = chunks.len(),
            files = files.len(),
            chars = context.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Context assembled"
        );
        Ok(context)
    }

    async fn standalone_question(
        &self,
        message: &str,
        history: &[Message],
        instructions: Option<&str>,
    ) -> Result<String> {
        let (provider, model) = self.router.resolve(&self.settings.rewrite_model)?;
        let request = rewrite_request(&model, instructions, history, message);

        let response = provider.complete(request).await?;
        let question = response.message.content.trim();
        debug!(model = %model, question, "Standalone question");

        if question.is_empty() {
            return Ok(message.to_string());
        }
        Ok(question.to_string())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self
            .router
            .named_or_default(self.settings.embedding_provider.as_deref())?;
        let response = provider
            .embed(EmbeddingRequest {
                model: self.settings.embedding_model.clone(),
                inputs: vec![text.to_string()],
            })
            .await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("embedding provider returned no vectors".into()))
    }

    /// Search every knowledge base; a missing collection counts as empty.
    async fn search_all(
        &self,
        knowledge_bases: &[KnowledgeBaseRef],
        vector: &[f32],
    ) -> Result<Vec<RetrievedChunk>> {
        let top_k = self.settings.top_k;
        let searches: Vec<_> = knowledge_bases
            .iter()
            .map(|kb| async move {
                match self.vectors.search(&kb.id, vector, top_k).await {
                    Err(StoreError::CollectionNotFound(_)) => {
                        debug!(knowledge_base = %kb.id, "Collection not found, treating as empty");
                        Ok(Vec::new())
                    }
                    other => other,
                }
            })
            .collect();

        let outcome = bounded_fan_out(searches, self.settings.concurrency).await;

        let mut chunks = Vec::new();
        let mut first_error = None;
        for (kb, result) in knowledge_bases.iter().zip(outcome.into_outcomes()) {
            match result {
                Ok(found) => {
                    debug!(knowledge_base = %kb.id, hits = found.len(), "Knowledge base searched");
                    chunks.extend(found);
                }
                Err(e) => {
                    warn!(knowledge_base = %kb.id, name = %kb.name, error = %e, "Knowledge base search failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match (self.settings.failure_policy, first_error) {
            (FailurePolicy::FailFast, Some(e)) => Err(e.into()),
            _ => Ok(chunks),
        }
    }
}
