//! JSON-RPC 2.0 and MCP message types used by the clients.

use ragrelay_core::error::McpError;
use ragrelay_core::toolset::{ToolDefinition, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::webhook::remove_nulls;

pub const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A request without an id; the server sends no response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
}

impl JsonRpcNotification {
    pub fn new(method: &str) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn into_result(self) -> Result<Value, McpError> {
        if let Some(err) = self.error {
            Err(McpError::Rpc {
                code: err.code,
                message: err.message,
            })
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "ragrelay",
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// MCP tool definition as returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Option<Value>,
    #[serde(default)]
    pub annotations: Option<ToolAnnotations>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnnotations {
    #[serde(default)]
    pub title: Option<String>,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object"})
}

impl McpToolDefinition {
    /// Top-level title, falling back to the annotation title.
    pub fn display_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or_else(|| self.annotations.as_ref().and_then(|a| a.title.as_deref()))
    }

    /// A fresh catalog entry for this tool, with null schema members stripped.
    pub fn into_spec(self) -> ToolSpec {
        let title = self.display_title().map(str::to_string);
        ToolSpec {
            id: String::new(),
            name: self.name,
            description: self.description,
            definition: ToolDefinition::Mcp {
                title,
                input_schema: remove_nulls(self.input_schema),
                output_schema: self.output_schema.filter(|s| !s.is_null()).map(remove_nulls),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpToolDefinition>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolCallParams<'a> {
    pub name: &'a str,
    pub arguments: Value,
}

/// MCP `tools/call` result.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub structured_content: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ToolCallResult {
    /// Text parts joined by newlines; structured content when there is no text.
    pub fn output_text(&self) -> String {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter(|p| p.content_type == "text")
            .filter_map(|p| p.text.as_deref())
            .collect();

        if texts.is_empty() {
            if let Some(structured) = &self.structured_content {
                return structured.to_string();
            }
        }
        texts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_definition_reads_camel_case() {
        let def: McpToolDefinition = serde_json::from_value(json!({
            "name": "search_docs",
            "description": "Search the docs",
            "inputSchema": {"type": "object", "properties": {"q": {"type": "string", "default": null}}},
            "annotations": {"title": "Search Docs"}
        }))
        .unwrap();

        assert_eq!(def.display_title(), Some("Search Docs"));
        let spec = def.into_spec();
        match spec.definition {
            ToolDefinition::Mcp { title, input_schema, output_schema } => {
                assert_eq!(title.as_deref(), Some("Search Docs"));
                assert!(input_schema["properties"]["q"].get("default").is_none());
                assert!(output_schema.is_none());
            }
            other => panic!("unexpected definition {other:?}"),
        }
    }

    #[test]
    fn rpc_error_surfaces_code() {
        let resp: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 3, "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        assert!(matches!(resp.into_result(), Err(McpError::Rpc { code: -32601, .. })));
    }

    #[test]
    fn call_result_prefers_text() {
        let result: ToolCallResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "line 1"}, {"type": "image", "data": "…"}, {"type": "text", "text": "line 2"}],
            "structuredContent": {"ignored": true}
        }))
        .unwrap();
        assert_eq!(result.output_text(), "line 1\nline 2");

        let structured: ToolCallResult =
            serde_json::from_value(json!({"content": [], "structuredContent": {"n": 1}, "isError": true})).unwrap();
        assert!(structured.is_error);
        assert_eq!(structured.output_text(), r#"{"n":1}"#);
    }
}
