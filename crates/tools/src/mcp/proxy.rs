//! MCP tool — forwards calls to `tools/call` on the toolset's server.

use async_trait::async_trait;
use ragrelay_core::error::ToolError;
use ragrelay_core::tool::{Tool, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::McpClient;

pub struct McpTool {
    name: String,
    description: String,
    input_schema: Value,
    client: Arc<dyn McpClient>,
}

impl McpTool {
    pub fn new(
        name: impl Into<String>,
        description: Option<&str>,
        title: Option<&str>,
        input_schema: Value,
        client: Arc<dyn McpClient>,
    ) -> Self {
        let name = name.into();
        let description = description
            .filter(|d| !d.is_empty())
            .or(title)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Execute {name}"));
        Self {
            name,
            description,
            input_schema,
            client,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let result = self
            .client
            .call_tool(&self.name, arguments)
            .await
            .map_err(|source| ToolError::Remote {
                tool_name: self.name.clone(),
                source,
            })?;

        debug!(tool = %self.name, is_error = result.is_error, "MCP call finished");

        Ok(ToolResult {
            call_id: String::new(),
            success: !result.is_error,
            output: result.output_text(),
            data: result.structured_content.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{ContentPart, McpToolDefinition, ToolCallResult};
    use ragrelay_core::error::McpError;
    use serde_json::json;

    struct FixedServer {
        fail: Option<fn() -> McpError>,
    }

    #[async_trait]
    impl McpClient for FixedServer {
        async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            Ok(ToolCallResult {
                content: vec![ContentPart {
                    content_type: "text".into(),
                    text: Some(format!("{name}:{arguments}")),
                }],
                structured_content: None,
                is_error: arguments.get("explode").is_some(),
            })
        }
    }

    fn tool(fail: Option<fn() -> McpError>) -> McpTool {
        McpTool::new(
            "lookup",
            None,
            Some("Lookup Things"),
            json!({"type": "object"}),
            Arc::new(FixedServer { fail }),
        )
    }

    #[tokio::test]
    async fn forwards_remote_name_and_arguments() {
        let tool = tool(None);
        assert_eq!(tool.description(), "Lookup Things");
        let result = tool.execute(json!({"id": 7})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, r#"lookup:{"id":7}"#);
    }

    #[tokio::test]
    async fn is_error_marks_result_unsuccessful() {
        let result = tool(None).execute(json!({"explode": true})).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn transport_error_fails_the_call() {
        let err = tool(Some(|| McpError::Transport("connection reset".into())))
            .execute(json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Remote { .. }));
        assert!(!err.is_upstream_status());
    }

    #[tokio::test]
    async fn server_status_keeps_its_classification() {
        let err = tool(Some(|| McpError::Status {
            status_code: 401,
            body: "bad token".into(),
        }))
        .execute(json!({}))
        .await
        .unwrap_err();
        assert!(err.is_upstream_status());
        assert!(err.to_string().contains("401"));
    }
}
