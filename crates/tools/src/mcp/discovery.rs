//! One-time MCP tool discovery for a toolset.

use ragrelay_core::error::McpError;
use ragrelay_core::toolset::{ToolCatalogWriter, ToolRecord, ToolSpec};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{McpClient, SseClient, StreamableHttpClient};

/// List a server's tools, over streamable HTTP first and HTTP+SSE second.
pub async fn discover(url: &str, headers: &BTreeMap<String, String>) -> Result<Vec<ToolSpec>, McpError> {
    let streamable = StreamableHttpClient::new(url, headers).list_tools().await;
    let tools = match streamable {
        Ok(tools) => tools,
        Err(http_err) => {
            warn!(url, error = %http_err, "Streamable HTTP discovery failed, trying SSE");
            let sse = match SseClient::connect(url, headers).await {
                Ok(client) => client.list_tools().await,
                Err(e) => Err(e),
            };
            sse.map_err(|sse_err| McpError::DiscoveryFailed {
                url: url.to_string(),
                reason: format!("streamable HTTP: {http_err}; SSE: {sse_err}"),
            })?
        }
    };

    info!(url, count = tools.len(), "MCP tools discovered");
    Ok(tools.into_iter().map(|t| t.into_spec()).collect())
}

/// Discover a server's tools and record each one under `toolset_id`.
pub async fn materialize(
    toolset_id: &str,
    url: &str,
    headers: &BTreeMap<String, String>,
    writer: &dyn ToolCatalogWriter,
) -> ragrelay_core::Result<Vec<ToolSpec>> {
    let specs = discover(url, headers).await?;
    for spec in &specs {
        writer.add_tool(toolset_id, ToolRecord::from(spec)).await?;
    }
    Ok(specs)
}
