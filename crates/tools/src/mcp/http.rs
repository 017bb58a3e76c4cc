//! Streamable HTTP transport.
//!
//! Every JSON-RPC message is a POST to the server URL. The server answers a
//! request either with a JSON body or with an SSE stream carrying the
//! response event. The session id handed out on `initialize` is echoed on
//! every later request. The handshake runs lazily on first use and is shared
//! by all callers of the same client.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use ragrelay_core::error::McpError;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpToolDefinition,
    ToolCallParams, ToolCallResult, initialize_params,
};
use super::{DEFAULT_TIMEOUT, McpClient, header_map};

const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

pub struct StreamableHttpClient {
    url: String,
    client: reqwest::Client,
    headers: HeaderMap,
    timeout: Duration,
    next_id: AtomicU64,
    session: OnceCell<Option<String>>,
}

impl StreamableHttpClient {
    pub fn new(url: impl Into<String>, headers: &BTreeMap<String, String>) -> Self {
        Self::with_client(url, headers, reqwest::Client::new())
    }

    pub fn with_client(
        url: impl Into<String>,
        headers: &BTreeMap<String, String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            url: url.into(),
            client,
            headers: header_map(headers),
            timeout: DEFAULT_TIMEOUT,
            next_id: AtomicU64::new(1),
            session: OnceCell::new(),
        }
    }

    async fn post<M: Serialize>(
        &self,
        message: &M,
        session: Option<&str>,
    ) -> Result<reqwest::Response, McpError> {
        let mut request = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .json(message);
        if let Some(session) = session {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status {
                status_code: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Initialize once and remember the session id (servers may omit it).
    async fn session(&self) -> Result<Option<&str>, McpError> {
        let session = self
            .session
            .get_or_try_init(|| async {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let request = JsonRpcRequest::new(id, "initialize", Some(initialize_params()));
                let response = self.post(&request, None).await?;

                let session = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                read_response(response, id).await?.into_result()?;

                let initialized = JsonRpcNotification::new("notifications/initialized");
                self.post(&initialized, session.as_deref()).await?;

                debug!(url = %self.url, session = ?session, "MCP session initialized");
                Ok::<_, McpError>(session)
            })
            .await?;
        Ok(session.as_deref())
    }

    /// Send one request and wait for its response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let call = async {
            let session = self.session().await?;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let request = JsonRpcRequest::new(id, method, params);
            let response = self.post(&request, session).await?;
            read_response(response, id).await?.into_result()
        };

        tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            McpError::Transport(format!(
                "{method} timed out after {}s",
                self.timeout.as_secs()
            ))
        })?
    }
}

/// Pull the response for `id` out of either body shape.
async fn read_response(response: reqwest::Response, id: u64) -> Result<JsonRpcResponse, McpError> {
    if response.status() == reqwest::StatusCode::ACCEPTED {
        return Err(McpError::Protocol(
            "server deferred the response to a GET stream, which is not supported".into(),
        ));
    }

    let is_sse = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));

    if !is_sse {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        return serde_json::from_slice(&bytes)
            .map_err(|e| McpError::Protocol(format!("invalid JSON-RPC response: {e}")));
    }

    let mut events = response.bytes_stream().eventsource();
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| McpError::Transport(e.to_string()))?;
        if event.data.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonRpcResponse>(&event.data) {
            Ok(resp) if resp.id == Some(id) && (resp.result.is_some() || resp.error.is_some()) => {
                return Ok(resp);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping unparseable MCP event"),
        }
    }

    Err(McpError::Protocol(format!("stream ended before response {id}")))
}

#[async_trait]
impl McpClient for StreamableHttpClient {
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = serde_json::from_value(self.request("tools/list", params).await?)
                .map_err(|e| McpError::Protocol(format!("invalid tools/list result: {e}")))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let params = serde_json::to_value(ToolCallParams { name, arguments })
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        let result = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("invalid tools/call result: {e}")))
    }
}
