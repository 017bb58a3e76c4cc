//! Agent configuration snapshot and the collaborators that resolve agents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::DirectoryError;
use crate::message::Message;
use crate::toolset::Toolset;

/// Everything one turn needs to know about an agent.
///
/// Loaded once per turn and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// System prompt.
    #[serde(default)]
    pub prompt: String,

    /// Replaces the default standalone-question instruction when non-empty.
    #[serde(default)]
    pub contextualize_prompt: Option<String>,

    /// Model identifier, optionally prefixed with a provider name (`openai/gpt-4o`).
    pub model: String,

    #[serde(default)]
    pub max_response_tokens: Option<u32>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// How many prior messages to keep; 0 keeps all of them.
    #[serde(default)]
    pub history_message_count: usize,

    #[serde(default)]
    pub knowledge_bases: Vec<KnowledgeBaseRef>,

    /// Toolset identifiers, in the order their tools are offered.
    #[serde(default)]
    pub toolsets: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A knowledge base the agent may retrieve from. Its id names the vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// The outcome of one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub response: String,

    /// Original history followed by the messages produced this turn.
    pub messages: Vec<Message>,

    /// Length of the original history within `messages`.
    pub history_len: usize,

    pub input_tokens: u64,
    pub output_tokens: u64,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Messages appended during this turn.
    pub fn new_messages(&self) -> &[Message] {
        &self.messages[self.history_len.min(self.messages.len())..]
    }
}

/// Resolves agents and toolsets by identifier.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Fails with [`DirectoryError::AgentNotFound`] for unknown or inactive agents.
    async fn load_agent_config(&self, agent_id: &str) -> Result<AgentConfig, DirectoryError>;

    async fn load_toolset(&self, toolset_id: &str) -> Result<Toolset, DirectoryError>;
}

/// Runs a whole non-streaming turn for another agent.
#[async_trait]
pub trait AgentDelegate: Send + Sync {
    async fn delegate(&self, agent_id: &str, question: &str) -> crate::Result<ExecutionResult>;
}
