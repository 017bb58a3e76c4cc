//! # RagRelay Core
//!
//! Domain types, collaborator traits, and error definitions for the RagRelay
//! chat-turn engine. This crate has **no runtime wiring**: it defines the
//! model that the provider, store, tool, and agent crates implement against.
//!
//! ## Layout
//!
//! - [`provider`]: the LLM backend abstraction (complete, stream, embed)
//! - [`tool`]: invocable tool adapters and the per-turn registry
//! - [`toolset`]: persisted tool/toolset records and their closed decoded forms
//! - [`knowledge`]: vector search and file-metadata collaborators
//! - [`agent`]: per-turn agent snapshot, directory, and delegation traits

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod toolset;
pub mod knowledge;
pub mod agent;

// Re-export key types at crate root for ergonomics
pub use error::{
    DirectoryError, Error, McpError, ProviderError, Result, StoreError, ToolError,
};
pub use message::{ConversationTurn, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolSchema, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use toolset::{
    HttpMethod, ToolCatalogWriter, ToolDefinition, ToolRecord, ToolSpec, ToolType, Toolset,
    ToolsetKind, ToolsetRecord, ToolsetType, WebhookSpec,
};
pub use knowledge::{FileMetadata, FileStore, RetrievedChunk, VectorStore};
pub use agent::{AgentConfig, AgentDelegate, AgentDirectory, ExecutionResult, KnowledgeBaseRef};
