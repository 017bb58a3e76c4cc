//! Agent tool — hands the model's query to another agent and returns its answer.

use async_trait::async_trait;
use ragrelay_core::agent::AgentDelegate;
use ragrelay_core::error::ToolError;
use ragrelay_core::tool::{Tool, ToolResult};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::naming::tool_identifier;

pub struct AgentTool {
    name: String,
    description: String,
    target_agent_id: String,
    delegate: Arc<dyn AgentDelegate>,
}

impl AgentTool {
    pub fn new(
        display_name: &str,
        description: Option<&str>,
        target_agent_id: impl Into<String>,
        delegate: Arc<dyn AgentDelegate>,
    ) -> Self {
        Self {
            name: tool_identifier(display_name),
            description: description
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Execute {display_name}")),
            target_agent_id: target_agent_id.into(),
            delegate,
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The query that will be used to execute the agent"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' parameter".into()))?;

        debug!(tool = %self.name, target = %self.target_agent_id, "Delegating to agent");

        let result = self
            .delegate
            .delegate(&self.target_agent_id, query)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: e.to_string(),
            })?;

        if !result.success {
            let reason = result.error.unwrap_or_else(|| "agent run failed".into());
            warn!(tool = %self.name, target = %self.target_agent_id, %reason, "Delegated agent failed");
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason,
            });
        }

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: result.response,
            data: None,
        })
    }
}
