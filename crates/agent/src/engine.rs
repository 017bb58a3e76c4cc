//! The execution engine: one agent, one turn, blocking or streaming.
//!
//! Both entry points share [`ExecutionEngine::execute`], the tool-calling
//! loop. `run` folds every failure into a failed [`ExecutionResult`];
//! `stream` runs the loop on a background task and hands back a
//! [`TurnStream`] that always finishes with exactly one `end_turn`.

use async_trait::async_trait;
use futures::Stream;
use futures::stream;
use ragrelay_config::ExecutionConfig;
use ragrelay_core::agent::{AgentConfig, ExecutionResult};
use ragrelay_core::error::{Error, Result, ToolError};
use ragrelay_core::message::{ConversationTurn, Message, MessageToolCall};
use ragrelay_core::provider::{Provider, ProviderRequest, Usage};
use ragrelay_core::tool::{ToolCall, ToolRegistry};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::context::ContextAssembler;
use crate::stream_event::StreamEvent;

/// Events of one streaming turn.
pub type TurnStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

const GENERIC_FAILURE: &str = "An error occurred while running the agent.";

/// Called once with the turn's result after a stream finishes successfully.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_complete(&self, result: ExecutionResult) -> Result<()>;
}

/// What the producer task pushes to the consumer.
enum Pumped {
    Event(StreamEvent),
    Done,
}

type Emitter = mpsc::UnboundedSender<Pumped>;

fn emit(emitter: Option<&Emitter>, event: StreamEvent) {
    if let Some(tx) = emitter {
        // A closed channel means the consumer is gone; cancellation stops us.
        let _ = tx.send(Pumped::Event(event));
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Internal("turn cancelled".into())),
        result = fut => result,
    }
}

/// The user-facing text for a failed turn.
pub fn failure_message(error: &Error) -> String {
    if error.is_upstream_status() {
        format!(
            "An error occurred while running the agent; a referenced link or resource is probably invalid: {error}"
        )
    } else {
        GENERIC_FAILURE.to_string()
    }
}

pub struct ExecutionEngine {
    agent: AgentConfig,
    provider: Arc<dyn Provider>,
    model: String,
    tools: ToolRegistry,
    context: Arc<ContextAssembler>,
    keepalive: Duration,
    max_tool_iterations: usize,
}

impl ExecutionEngine {
    pub fn new(
        agent: AgentConfig,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: ToolRegistry,
        context: Arc<ContextAssembler>,
        execution: &ExecutionConfig,
    ) -> Self {
        Self {
            agent,
            provider,
            model: model.into(),
            tools,
            context,
            keepalive: execution.keepalive(),
            max_tool_iterations: execution.max_tool_iterations,
        }
    }

    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    /// Run the turn to completion. Never fails; errors become a failed result.
    pub async fn run(&self, turn: &ConversationTurn) -> ExecutionResult {
        let never = CancellationToken::new();
        match self.execute(turn, None, &never).await {
            Ok(result) => result,
            Err(e) => {
                warn!(agent = %self.agent.id, error = %e, "Turn failed");
                failed_result(turn, &e)
            }
        }
    }

    /// Run the turn on a background task and stream its events.
    ///
    /// Cancelling `cancel`, or dropping the returned stream, stops the
    /// producer at its next suspension point. `on_complete` only runs when
    /// the turn succeeds, detached from the stream.
    pub fn stream(
        self: Arc<Self>,
        turn: ConversationTurn,
        on_complete: Option<Arc<dyn CompletionHook>>,
        cancel: CancellationToken,
    ) -> TurnStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let producer_cancel = cancel.child_token();
        let keepalive = self.keepalive;
        let guard = producer_cancel.clone().drop_guard();

        tokio::spawn(async move {
            match self.execute(&turn, Some(&tx), &producer_cancel).await {
                Ok(result) => {
                    let _ = tx.send(Pumped::Done);
                    if let Some(hook) = on_complete {
                        tokio::spawn(async move {
                            if let Err(e) = hook.on_complete(result).await {
                                warn!(error = %e, "Completion hook failed");
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!(agent = %self.agent.id, error = %e, "Streaming turn failed");
                    let _ = tx.send(Pumped::Event(StreamEvent::Error {
                        error: e.to_string(),
                        message: failure_message(&e),
                    }));
                    let _ = tx.send(Pumped::Done);
                }
            }
        });

        let consumer = Consumer {
            rx,
            keepalive,
            phase: Phase::Streaming,
            _cancel_on_drop: guard,
        };
        Box::pin(stream::unfold(consumer, |mut consumer| async move {
            let event = consumer.next_event().await?;
            Some((event, consumer))
        }))
    }

    /// The tool-calling loop shared by both entry points.
    async fn execute(
        &self,
        turn: &ConversationTurn,
        emitter: Option<&Emitter>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        emit(emitter, StreamEvent::Searching);

        let window = history_window(&turn.history, self.agent.history_message_count);
        let context = until_cancelled(
            cancel,
            self.context.assemble(
                &turn.message,
                window,
                &self.agent.knowledge_bases,
                self.agent.contextualize_prompt.as_deref(),
            ),
        )
        .await?;

        let system_prompt = if context.is_empty() {
            self.agent.prompt.clone()
        } else {
            format!("{}\n\n{}", self.agent.prompt, context)
        };

        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend(window.iter().cloned());
        messages.push(Message::user(&turn.message));
        let turn_start = messages.len() - 1;

        let schemas = self.tools.schemas();
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;

        for iteration in 1..=self.max_tool_iterations {
            debug!(
                agent = %self.agent.id,
                model = %self.model,
                iteration,
                messages = messages.len(),
                "Model iteration"
            );

            let mut request = ProviderRequest::new(&self.model, messages.clone());
            request.temperature = self.agent.temperature;
            request.max_tokens = self.agent.max_response_tokens;
            request.tools = schemas.clone();
            request.stream = emitter.is_some();

            let (message, usage) = until_cancelled(cancel, self.call_model(request, emitter)).await?;
            if let Some(usage) = usage {
                input_tokens += u64::from(usage.prompt_tokens);
                output_tokens += u64::from(usage.completion_tokens);
            }

            if message.tool_calls.is_empty() {
                let response = message.content.clone();
                messages.push(message);
                info!(
                    agent = %self.agent.id,
                    iterations = iteration,
                    input_tokens,
                    output_tokens,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Turn completed"
                );
                let mut updated = turn.history.clone();
                updated.extend(messages.drain(turn_start..));
                return Ok(ExecutionResult {
                    response,
                    messages: updated,
                    history_len: turn.history.len(),
                    input_tokens,
                    output_tokens,
                    success: true,
                    error: None,
                });
            }

            let tool_calls = message.tool_calls.clone();
            messages.push(message);
            for tc in &tool_calls {
                let output = self.dispatch(tc, emitter, cancel).await?;
                messages.push(Message::tool_result(&tc.id, output));
            }
        }

        Err(Error::Internal(format!(
            "tool-calling loop exceeded {} iterations",
            self.max_tool_iterations
        )))
    }

    /// One model round-trip. In streaming mode deltas are emitted as they arrive.
    async fn call_model(
        &self,
        request: ProviderRequest,
        emitter: Option<&Emitter>,
    ) -> Result<(Message, Option<Usage>)> {
        if emitter.is_none() {
            let response = self.provider.complete(request).await?;
            return Ok((response.message, response.usage));
        }

        let mut rx = self.provider.stream(request).await?;
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = None;

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.thinking.filter(|t| !t.is_empty()) {
                emit(emitter, StreamEvent::Thinking { delta });
            }
            if let Some(delta) = chunk.content.filter(|c| !c.is_empty()) {
                text.push_str(&delta);
                emit(emitter, StreamEvent::Response { delta });
            }
            tool_calls.extend(chunk.tool_calls);
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        let message = if tool_calls.is_empty() {
            Message::assistant(text)
        } else {
            Message::assistant_with_tool_calls(text, tool_calls)
        };
        Ok((message, usage))
    }

    /// Execute one requested tool call and return what the model gets back.
    ///
    /// Bad arguments and unknown tools are reported to the model so it can
    /// retry; any other adapter failure ends the turn.
    async fn dispatch(
        &self,
        tc: &MessageToolCall,
        emitter: Option<&Emitter>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        emit(
            emitter,
            StreamEvent::ToolCall {
                name: tc.name.clone(),
                args: tc.arguments.clone(),
            },
        );

        let outcome = match parse_arguments(&tc.arguments) {
            Ok(arguments) => {
                emit(emitter, StreamEvent::ToolRunning { name: tc.name.clone() });
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };
                let started = Instant::now();
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Internal("turn cancelled".into())),
                    outcome = self.tools.execute(&call) => outcome,
                };
                info!(
                    tool = %tc.name,
                    duration_ms = started.elapsed().as_millis() as u64,
                    success = outcome.as_ref().map(|r| r.success).unwrap_or(false),
                    "Tool executed"
                );
                outcome
            }
            Err(e) => Err(e),
        };

        let output = match outcome {
            Ok(result) => result.output,
            Err(e @ (ToolError::InvalidArguments(_) | ToolError::NotFound(_))) => {
                warn!(tool = %tc.name, error = %e, "Tool call rejected, reporting to model");
                format!("Error: {e}")
            }
            Err(e) => return Err(e.into()),
        };

        emit(
            emitter,
            StreamEvent::ToolResult {
                name: tc.name.clone(),
                result: output.clone(),
            },
        );
        Ok(output)
    }
}

/// The newest `count` history messages sent to the model (0 sends all).
///
/// The window never opens on tool plumbing: a tool result without its
/// assistant call would be rejected by the model.
fn history_window(history: &[Message], count: usize) -> &[Message] {
    if count == 0 || history.len() <= count {
        return history;
    }
    let mut start = history.len() - count;
    while start < history.len() && !history[start].is_dialogue() {
        start += 1;
    }
    &history[start..]
}

fn parse_arguments(raw: &str) -> std::result::Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(format!("malformed JSON: {e}")))
}

fn failed_result(turn: &ConversationTurn, error: &Error) -> ExecutionResult {
    ExecutionResult {
        response: failure_message(error),
        messages: turn.history.clone(),
        history_len: turn.history.len(),
        success: false,
        error: Some(error.to_string()),
        ..Default::default()
    }
}

enum Phase {
    Streaming,
    Ending,
    Finished,
}

/// Consumer side of a streaming turn: keepalives on idle, `end_turn` last.
struct Consumer {
    rx: mpsc::UnboundedReceiver<Pumped>,
    keepalive: Duration,
    phase: Phase,
    _cancel_on_drop: DropGuard,
}

impl Consumer {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        match self.phase {
            Phase::Finished => None,
            Phase::Ending => {
                self.phase = Phase::Finished;
                Some(StreamEvent::EndTurn)
            }
            Phase::Streaming => match tokio::time::timeout(self.keepalive, self.rx.recv()).await {
                Err(_) => Some(StreamEvent::Keepalive),
                Ok(Some(Pumped::Event(event))) => Some(event),
                Ok(Some(Pumped::Done)) => {
                    self.phase = Phase::Finished;
                    Some(StreamEvent::EndTurn)
                }
                Ok(None) => {
                    self.phase = Phase::Ending;
                    Some(StreamEvent::Error {
                        error: "producer stopped before finishing the turn".into(),
                        message: GENERIC_FAILURE.into(),
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        ScriptedProvider, empty_assembler, text_response, tool_call, tool_call_response,
    };
    use futures::StreamExt;
    use ragrelay_core::error::ProviderError;
    use ragrelay_core::tool::{Tool, ToolResult};
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the text back"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("text is required".into()))?;
            Ok(ToolResult::json(true, json!({"echo": text})))
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "delegate exploded".into(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ExecutionResult>>);

    #[async_trait]
    impl CompletionHook for Recorder {
        async fn on_complete(&self, result: ExecutionResult) -> Result<()> {
            self.0.lock().unwrap().push(result);
            Ok(())
        }
    }

    fn agent() -> AgentConfig {
        AgentConfig {
            id: "support".into(),
            name: "Support".into(),
            prompt: "You are helpful.".into(),
            contextualize_prompt: None,
            model: "gpt-4o".into(),
            max_response_tokens: Some(512),
            temperature: 0.2,
            history_message_count: 0,
            knowledge_bases: vec![],
            toolsets: vec![],
        }
    }

    fn engine(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> Arc<ExecutionEngine> {
        Arc::new(ExecutionEngine::new(
            agent(),
            provider.clone(),
            "gpt-4o",
            tools,
            empty_assembler(provider),
            &ExecutionConfig::default(),
        ))
    }

    fn tools() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo));
        registry.register(Box::new(Broken));
        registry
    }

    fn statuses(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::status).collect()
    }

    #[tokio::test]
    async fn run_returns_answer_and_history() {
        let provider = Arc::new(ScriptedProvider::single_text("Hello!"));
        let engine = engine(provider.clone(), ToolRegistry::new());
        let turn = ConversationTurn::new("hi", vec![Message::user("earlier"), Message::assistant("ok")]);

        let result = engine.run(&turn).await;
        assert!(result.success);
        assert_eq!(result.response, "Hello!");
        assert_eq!(result.history_len, 2);
        assert_eq!(result.new_messages().len(), 2);
        assert_eq!(result.input_tokens, 10);
        assert_eq!(result.output_tokens, 5);

        let request = &provider.requests()[0];
        assert_eq!(request.messages[0].content, "You are helpful.");
        assert_eq!(request.max_tokens, Some(512));
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn windowed_prompt_keeps_full_history_in_result() {
        let provider = Arc::new(ScriptedProvider::single_text("ok"));
        let mut windowed = agent();
        windowed.history_message_count = 2;
        let engine = ExecutionEngine::new(
            windowed,
            provider.clone(),
            "gpt-4o",
            ToolRegistry::new(),
            empty_assembler(provider.clone()),
            &ExecutionConfig::default(),
        );
        let history = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
            Message::assistant("four"),
        ];

        let result = engine.run(&ConversationTurn::new("five", history)).await;
        let sent: Vec<_> = provider.requests()[0].messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(sent, ["You are helpful.", "three", "four", "five"]);

        let kept: Vec<_> = result.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(kept, ["one", "two", "three", "four", "five", "ok"]);
        assert_eq!(result.history_len, 4);
    }

    #[test]
    fn window_skips_leading_tool_plumbing() {
        let call = MessageToolCall {
            id: "c1".into(),
            name: "lookup".into(),
            arguments: "{}".into(),
        };
        let history = vec![
            Message::user("q"),
            Message::assistant_with_tool_calls("", vec![call]),
            Message::tool_result("c1", "data"),
            Message::assistant("answer"),
            Message::user("follow-up"),
        ];

        let kept = history_window(&history, 4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "answer");

        assert_eq!(history_window(&history, 0).len(), 5);
        assert_eq!(history_window(&history, 10).len(), 5);
    }

    #[tokio::test]
    async fn run_executes_tools_and_loops() {
        let provider = Arc::new(ScriptedProvider::replies(vec![
            tool_call_response(vec![tool_call("echo", json!({"text": "ping"}))]),
            text_response("The echo said ping."),
        ]));
        let engine = engine(provider.clone(), tools());

        let result = engine.run(&ConversationTurn::new("echo ping", vec![])).await;
        assert!(result.success);
        assert_eq!(result.response, "The echo said ping.");
        assert_eq!(result.input_tokens, 20);

        let second = &provider.requests()[1];
        let tool_message = second.messages.last().unwrap();
        assert_eq!(tool_message.content, r#"{"echo":"ping"}"#);
        assert_eq!(second.tools.len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let provider = Arc::new(ScriptedProvider::replies(vec![
            tool_call_response(vec![tool_call("missing", json!({}))]),
            text_response("Sorry, I can't do that."),
        ]));
        let engine = engine(provider.clone(), tools());

        let result = engine.run(&ConversationTurn::new("do it", vec![])).await;
        assert!(result.success);
        let fed_back = provider.requests()[1].messages.last().unwrap().content.clone();
        assert!(fed_back.starts_with("Error:"), "{fed_back}");
    }

    #[tokio::test]
    async fn adapter_failure_fails_the_turn() {
        let provider = Arc::new(ScriptedProvider::replies(vec![tool_call_response(vec![tool_call(
            "broken",
            json!({}),
        )])]));
        let engine = engine(provider, tools());

        let result = engine.run(&ConversationTurn::new("go", vec![])).await;
        assert!(!result.success);
        assert_eq!(result.response, GENERIC_FAILURE);
        assert!(result.error.unwrap().contains("delegate exploded"));
    }

    #[tokio::test]
    async fn upstream_status_error_flags_invalid_reference() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::ApiError {
            status_code: 404,
            message: "model not found".into(),
        })]));
        let engine = engine(provider, ToolRegistry::new());
        let history = vec![Message::user("before")];

        let result = engine.run(&ConversationTurn::new("hi", history)).await;
        assert!(!result.success);
        assert!(result.response.contains("probably invalid"));
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn mcp_server_status_error_flags_invalid_reference() {
        use ragrelay_tools::McpTool;
        use ragrelay_tools::mcp::StreamableHttpClient;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint"))
            .mount(&server)
            .await;

        let client = StreamableHttpClient::new(format!("{}/mcp", server.uri()), &Default::default());
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(McpTool::new(
            "lookup",
            None,
            None,
            json!({"type": "object"}),
            Arc::new(client),
        )));
        let provider = Arc::new(ScriptedProvider::replies(vec![tool_call_response(vec![tool_call(
            "lookup",
            json!({}),
        )])]));

        let result = engine(provider, registry).run(&ConversationTurn::new("go", vec![])).await;
        assert!(!result.success);
        assert!(result.response.contains("probably invalid"));
        assert!(result.error.unwrap().contains("404"));
    }

    #[tokio::test]
    async fn tool_loop_is_bounded() {
        let replies = (0..3)
            .map(|_| tool_call_response(vec![tool_call("echo", json!({"text": "again"}))]))
            .collect();
        let provider = Arc::new(ScriptedProvider::replies(replies));
        let config = ExecutionConfig {
            max_tool_iterations: 3,
            ..Default::default()
        };
        let engine = ExecutionEngine::new(
            agent(),
            provider.clone(),
            "gpt-4o",
            tools(),
            empty_assembler(provider),
            &config,
        );

        let result = engine.run(&ConversationTurn::new("loop", vec![])).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("exceeded 3 iterations"));
    }

    #[tokio::test]
    async fn stream_emits_tool_lifecycle_and_ends_once() {
        let provider = Arc::new(ScriptedProvider::replies(vec![
            tool_call_response(vec![tool_call("echo", json!({"text": "ping"}))]),
            text_response("Done."),
        ]));
        let engine = engine(provider, tools());

        let events: Vec<_> = engine
            .stream(ConversationTurn::new("echo", vec![]), None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            statuses(&events),
            ["searching", "tool_call", "tool_running", "tool_result", "response", "end_turn"]
        );
        assert_eq!(
            events[1],
            StreamEvent::ToolCall {
                name: "echo".into(),
                args: r#"{"text":"ping"}"#.into()
            }
        );
        assert_eq!(events[4], StreamEvent::Response { delta: "Done.".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_gets_keepalives() {
        let provider = Arc::new(ScriptedProvider::single_text("finally").with_delay(Duration::from_secs(25)));
        let engine = engine(provider, ToolRegistry::new());

        let events: Vec<_> = engine
            .stream(ConversationTurn::new("hi", vec![]), None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            statuses(&events),
            ["searching", "keepalive", "keepalive", "response", "end_turn"]
        );
    }

    #[tokio::test]
    async fn stream_error_precedes_end_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network("reset".into()))]));
        let engine = engine(provider, ToolRegistry::new());
        let hook = Arc::new(Recorder::default());

        let events: Vec<_> = engine
            .stream(ConversationTurn::new("hi", vec![]), Some(hook.clone() as Arc<dyn CompletionHook>), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(statuses(&events), ["searching", "error", "end_turn"]);
        match &events[1] {
            StreamEvent::Error { error, message } => {
                assert!(error.contains("reset"));
                assert_eq!(message, GENERIC_FAILURE);
            }
            other => panic!("unexpected event {other:?}"),
        }

        tokio::task::yield_now().await;
        assert!(hook.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_hook_runs_after_success() {
        let provider = Arc::new(ScriptedProvider::single_text("Hi there"));
        let engine = engine(provider, ToolRegistry::new());
        let hook = Arc::new(Recorder::default());

        let events: Vec<_> = engine
            .stream(ConversationTurn::new("hi", vec![]), Some(hook.clone() as Arc<dyn CompletionHook>), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(events.last(), Some(&StreamEvent::EndTurn));

        for _ in 0..10 {
            if !hook.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let results = hook.0.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].response, "Hi there");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_stream_still_ends_with_end_turn() {
        let provider = Arc::new(ScriptedProvider::single_text("late").with_delay(Duration::from_secs(5)));
        let engine = engine(provider, ToolRegistry::new());
        let cancel = CancellationToken::new();

        let mut stream = engine.stream(ConversationTurn::new("hi", vec![]), None, cancel.clone());
        assert_eq!(stream.next().await, Some(StreamEvent::Searching));
        cancel.cancel();

        let rest: Vec<_> = stream.collect().await;
        assert_eq!(statuses(&rest), ["error", "end_turn"]);
    }
}
