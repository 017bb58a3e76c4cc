//! MCP (Model Context Protocol) client side.
//!
//! Two transports are supported: streamable HTTP (POST per message, JSON or
//! SSE response bodies) and the older HTTP+SSE transport (one long-lived event
//! stream plus a POST endpoint announced on it). Discovery tries them in that
//! order; runtime proxying uses streamable HTTP.

pub mod discovery;
pub mod http;
pub mod protocol;
pub mod proxy;
pub mod sse;

pub use discovery::{discover, materialize};
pub use http::StreamableHttpClient;
pub use protocol::{McpToolDefinition, ToolCallResult};
pub use proxy::McpTool;
pub use sse::SseClient;

use async_trait::async_trait;
use ragrelay_core::error::McpError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Per-request timeout for MCP round trips.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An initialized connection to one MCP server.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// The full tool catalog, following `nextCursor` pagination.
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError>;
}

/// Convert configured headers, skipping names or values HTTP cannot carry.
pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let Ok(header_name) = HeaderName::from_str(name) else {
            warn!(header = %name, "Invalid MCP header name, skipping");
            continue;
        };
        let Ok(header_value) = HeaderValue::from_str(value.trim()) else {
            warn!(header = %name, "Invalid MCP header value, skipping");
            continue;
        };
        map.insert(header_name, header_value);
    }
    map
}
