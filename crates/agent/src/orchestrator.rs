//! Per-turn entry point: agent lookup, tool binding, engine construction.

use async_trait::async_trait;
use futures::stream;
use ragrelay_config::ExecutionConfig;
use ragrelay_core::agent::{AgentDelegate, AgentDirectory, ExecutionResult};
use ragrelay_core::error::Result;
use ragrelay_core::message::{ConversationTurn, Message};
use ragrelay_core::tool::ToolRegistry;
use ragrelay_providers::ProviderRouter;
use ragrelay_tools::ToolAdapterFactory;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ContextAssembler;
use crate::engine::{CompletionHook, ExecutionEngine, TurnStream, failure_message};
use crate::stream_event::StreamEvent;

/// Loads an agent, binds its toolsets, and runs one turn on a fresh engine.
///
/// Holds no per-turn state. It is also the [`AgentDelegate`] handed to
/// agent-typed tools, so one agent can ask another.
pub struct TurnOrchestrator {
    router: ProviderRouter,
    assembler: Arc<ContextAssembler>,
    directory: Arc<dyn AgentDirectory>,
    webhook_timeout: Duration,
    execution: ExecutionConfig,
    this: Weak<TurnOrchestrator>,
}

impl TurnOrchestrator {
    pub fn new(
        router: ProviderRouter,
        assembler: Arc<ContextAssembler>,
        directory: Arc<dyn AgentDirectory>,
        webhook_timeout: Duration,
        execution: ExecutionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            router,
            assembler,
            directory,
            webhook_timeout,
            execution,
            this: this.clone(),
        })
    }

    /// Run a blocking turn.
    ///
    /// Fails only when the agent cannot be prepared; execution failures come
    /// back as an unsuccessful result.
    pub async fn answer(
        &self,
        agent_id: &str,
        question: &str,
        history: Vec<Message>,
    ) -> Result<ExecutionResult> {
        let engine = self.prepare(agent_id).await?;
        Ok(engine.run(&ConversationTurn::new(question, history)).await)
    }

    /// Run a streaming turn.
    ///
    /// Preparation failures are reported in-stream, so the returned stream
    /// always ends with `end_turn`.
    pub async fn answer_streaming(
        &self,
        agent_id: &str,
        question: &str,
        history: Vec<Message>,
        on_complete: Option<Arc<dyn CompletionHook>>,
        cancel: CancellationToken,
    ) -> TurnStream {
        match self.prepare(agent_id).await {
            Ok(engine) => {
                let turn = ConversationTurn::new(question, history);
                Arc::new(engine).stream(turn, on_complete, cancel)
            }
            Err(e) => {
                warn!(agent = agent_id, error = %e, "Could not prepare streaming turn");
                let error = StreamEvent::Error {
                    error: e.to_string(),
                    message: failure_message(&e),
                };
                Box::pin(stream::iter([error, StreamEvent::EndTurn]))
            }
        }
    }

    async fn prepare(&self, agent_id: &str) -> Result<ExecutionEngine> {
        let agent = self.directory.load_agent_config(agent_id).await?;

        let mut factory = ToolAdapterFactory::new(self.webhook_timeout);
        if let Some(this) = self.this.upgrade() {
            factory = factory.with_delegate(this);
        }

        let mut tools = ToolRegistry::new();
        for toolset_id in &agent.toolsets {
            let toolset = self.directory.load_toolset(toolset_id).await?;
            factory.build_toolset(&toolset, &mut tools)?;
        }

        let (provider, model) = self.router.resolve(&agent.model)?;
        info!(
            agent = %agent.id,
            model = %model,
            tools = tools.len(),
            knowledge_bases = agent.knowledge_bases.len(),
            "Agent prepared"
        );

        Ok(ExecutionEngine::new(
            agent,
            provider,
            model,
            tools,
            self.assembler.clone(),
            &self.execution,
        ))
    }
}

#[async_trait]
impl AgentDelegate for TurnOrchestrator {
    async fn delegate(&self, agent_id: &str, question: &str) -> Result<ExecutionResult> {
        debug!(agent = agent_id, "Delegating to agent");
        self.answer(agent_id, question, Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        ScriptedProvider, empty_assembler, router_with, text_response, tool_call, tool_call_response,
    };
    use futures::StreamExt;
    use ragrelay_config::{Catalog, CatalogAgent};
    use ragrelay_core::agent::AgentConfig;
    use ragrelay_core::error::{DirectoryError, Error};
    use ragrelay_core::toolset::{ToolRecord, ToolsetRecord};
    use ragrelay_store::StaticCatalog;
    use serde_json::json;

    fn agent(id: &str, prompt: &str, toolsets: Vec<String>) -> CatalogAgent {
        CatalogAgent {
            config: AgentConfig {
                id: id.into(),
                name: id.into(),
                prompt: prompt.into(),
                contextualize_prompt: None,
                model: "gpt-4o".into(),
                max_response_tokens: None,
                temperature: 0.0,
                history_message_count: 2,
                knowledge_bases: vec![],
                toolsets,
            },
            is_active: true,
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(Catalog {
            agents: vec![
                agent("front", "You route questions.", vec!["experts".into()]),
                agent("tax", "You are a tax expert.", vec![]),
            ],
            toolsets: vec![ToolsetRecord {
                id: "experts".into(),
                toolset_type: "CUSTOM".into(),
                name: "Experts".into(),
                tools: vec![ToolRecord {
                    id: "t-1".into(),
                    tool_type: "AGENT".into(),
                    name: "ask_tax".into(),
                    description: Some("Ask the tax expert".into()),
                    target_agent_id: Some("tax".into()),
                    is_active: true,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            files: Default::default(),
        })
    }

    fn orchestrator(provider: Arc<ScriptedProvider>) -> Arc<TurnOrchestrator> {
        TurnOrchestrator::new(
            router_with(provider.clone()),
            empty_assembler(provider),
            Arc::new(catalog()),
            Duration::from_secs(5),
            ExecutionConfig::default(),
        )
    }

    #[tokio::test]
    async fn agent_tool_delegates_to_another_agent() {
        let provider = Arc::new(ScriptedProvider::replies(vec![
            tool_call_response(vec![tool_call("ask_tax", json!({"query": "VAT rate?"}))]),
            text_response("The VAT rate is 23%."),
            text_response("According to our expert, 23%."),
        ]));
        let orchestrator = orchestrator(provider.clone());

        let result = orchestrator.answer("front", "What's the VAT?", vec![]).await.unwrap();
        assert!(result.success);
        assert_eq!(result.response, "According to our expert, 23%.");

        let requests = provider.requests();
        assert_eq!(requests[0].tools[0].name, "ask_tax");
        assert_eq!(requests[1].messages[0].content, "You are a tax expert.");
        assert_eq!(requests[1].messages[1].content, "VAT rate?");
        assert_eq!(requests[2].messages.last().unwrap().content, "The VAT rate is 23%.");
    }

    #[tokio::test]
    async fn unknown_agent_is_an_error() {
        let orchestrator = orchestrator(Arc::new(ScriptedProvider::replies(vec![])));
        let err = orchestrator.answer("ghost", "hi", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Directory(DirectoryError::AgentNotFound(_))));
    }

    #[tokio::test]
    async fn unknown_agent_streams_error_then_end_turn() {
        let orchestrator = orchestrator(Arc::new(ScriptedProvider::replies(vec![])));
        let events: Vec<_> = orchestrator
            .answer_streaming("ghost", "hi", vec![], None, CancellationToken::new())
            .await
            .collect()
            .await;
        let statuses: Vec<_> = events.iter().map(StreamEvent::status).collect();
        assert_eq!(statuses, ["error", "end_turn"]);
    }

    #[tokio::test]
    async fn history_is_windowed_per_agent() {
        let provider = Arc::new(ScriptedProvider::single_text("ok"));
        let orchestrator = orchestrator(provider.clone());
        let history = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
            Message::assistant("four"),
        ];

        let result = orchestrator.answer("tax", "five", history).await.unwrap();
        let contents: Vec<_> = provider.requests()[0]
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(contents, ["You are a tax expert.", "three", "four", "five"]);

        let kept: Vec<_> = result.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(kept, ["one", "two", "three", "four", "five", "ok"]);
        assert_eq!(result.history_len, 4);
        assert_eq!(result.new_messages().len(), 2);
    }
}
