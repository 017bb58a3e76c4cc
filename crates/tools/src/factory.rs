//! Turns decoded tool definitions into invocable adapters.

use ragrelay_core::agent::AgentDelegate;
use ragrelay_core::error::ToolError;
use ragrelay_core::tool::{Tool, ToolRegistry};
use ragrelay_core::toolset::{ToolDefinition, ToolSpec, Toolset, ToolsetKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::delegate::AgentTool;
use crate::mcp::{McpClient, McpTool, StreamableHttpClient};
use crate::webhook::WebhookTool;

#[derive(Clone)]
pub struct ToolAdapterFactory {
    client: reqwest::Client,
    webhook_timeout: Duration,
    delegate: Option<Arc<dyn AgentDelegate>>,
}

impl ToolAdapterFactory {
    pub fn new(webhook_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_timeout,
            delegate: None,
        }
    }

    /// Agent tools need something that can run another agent's turn.
    pub fn with_delegate(mut self, delegate: Arc<dyn AgentDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Build one adapter. MCP tools need the client of their toolset's server.
    pub fn build(
        &self,
        spec: &ToolSpec,
        server: Option<&Arc<dyn McpClient>>,
    ) -> Result<Box<dyn Tool>, ToolError> {
        let tool: Box<dyn Tool> = match &spec.definition {
            ToolDefinition::Webhook(webhook) => Box::new(WebhookTool::new(
                &spec.name,
                spec.description.as_deref(),
                webhook.clone(),
                self.client.clone(),
                self.webhook_timeout,
            )),
            ToolDefinition::Agent { target_agent_id } => {
                let delegate = self.delegate.clone().ok_or_else(|| {
                    ToolError::InvalidDefinition(format!(
                        "agent tool '{}' cannot run without a delegate",
                        spec.name
                    ))
                })?;
                Box::new(AgentTool::new(
                    &spec.name,
                    spec.description.as_deref(),
                    target_agent_id.clone(),
                    delegate,
                ))
            }
            ToolDefinition::Mcp { title, input_schema, .. } => {
                let server = server.ok_or_else(|| {
                    ToolError::InvalidDefinition(format!(
                        "MCP tool '{}' is not part of an MCP server toolset",
                        spec.name
                    ))
                })?;
                Box::new(McpTool::new(
                    spec.name.clone(),
                    spec.description.as_deref(),
                    title.as_deref(),
                    input_schema.clone(),
                    Arc::clone(server),
                ))
            }
        };
        Ok(tool)
    }

    /// Register every tool of a toolset. MCP tools share one client per toolset.
    pub fn build_toolset(&self, toolset: &Toolset, registry: &mut ToolRegistry) -> Result<(), ToolError> {
        let server: Option<Arc<dyn McpClient>> = match &toolset.kind {
            ToolsetKind::McpServer { url, headers } => Some(Arc::new(
                StreamableHttpClient::with_client(url.clone(), headers, self.client.clone()),
            )),
            ToolsetKind::Custom => None,
        };

        for spec in &toolset.tools {
            let tool = self.build(spec, server.as_ref())?;
            if registry.get(tool.name()).is_some() {
                warn!(tool = %tool.name(), toolset = %toolset.id, "Duplicate tool name, replacing earlier tool");
            }
            registry.register(tool);
        }

        debug!(toolset = %toolset.id, tools = toolset.tools.len(), "Toolset bound");
        Ok(())
    }
}
