//! Tool adapters for RagRelay.
//!
//! Persisted tool definitions become invocable [`Tool`](ragrelay_core::Tool)s
//! through the [`ToolAdapterFactory`]:
//! - webhook tools make a templated HTTP call
//! - agent tools delegate the query to another agent's full turn
//! - MCP tools proxy `tools/call` to the toolset's MCP server
//!
//! MCP tool definitions are discovered once, ahead of time, by [`mcp::discover`].

pub mod delegate;
pub mod factory;
pub mod mcp;
pub mod naming;
pub mod webhook;

pub use delegate::AgentTool;
pub use factory::ToolAdapterFactory;
pub use mcp::{McpClient, McpTool, discover, materialize};
pub use naming::tool_identifier;
pub use webhook::WebhookTool;
