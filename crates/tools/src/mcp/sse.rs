//! HTTP+SSE transport (MCP 2024-11-05).
//!
//! The client opens a GET event stream; the server's first `endpoint` event
//! names the URL that accepts JSON-RPC POSTs. Responses arrive as `message`
//! events on the original stream.

use async_trait::async_trait;
use eventsource_stream::{Event, Eventsource};
use futures::StreamExt;
use futures::stream::BoxStream;
use ragrelay_core::error::McpError;
use reqwest::header::{ACCEPT, HeaderMap};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpToolDefinition,
    ToolCallParams, ToolCallResult, initialize_params,
};
use super::{DEFAULT_TIMEOUT, McpClient, header_map};

type EventStream = BoxStream<'static, Result<Event, String>>;

pub struct SseClient {
    endpoint: String,
    client: reqwest::Client,
    headers: HeaderMap,
    timeout: Duration,
    next_id: AtomicU64,
    events: Mutex<EventStream>,
}

impl SseClient {
    /// Open the event stream, learn the POST endpoint, and run the handshake.
    pub async fn connect(url: &str, headers: &BTreeMap<String, String>) -> Result<Self, McpError> {
        Self::connect_with(url, headers, reqwest::Client::new(), DEFAULT_TIMEOUT).await
    }

    pub async fn connect_with(
        url: &str,
        headers: &BTreeMap<String, String>,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        let headers = header_map(headers);
        let base = reqwest::Url::parse(url).map_err(|e| McpError::Transport(format!("invalid URL {url}: {e}")))?;

        let response = tokio::time::timeout(
            timeout,
            client
                .get(base.clone())
                .headers(headers.clone())
                .header(ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| McpError::Transport("timed out opening event stream".into()))?
        .map_err(|e| McpError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Status {
                status_code: status.as_u16(),
                body,
            });
        }

        let mut events: EventStream = response
            .bytes_stream()
            .eventsource()
            .map(|e| e.map_err(|e| e.to_string()))
            .boxed();

        let endpoint = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                let event = event.map_err(McpError::Transport)?;
                if event.event == "endpoint" {
                    return base
                        .join(event.data.trim())
                        .map(|u| u.to_string())
                        .map_err(|e| McpError::Protocol(format!("invalid endpoint: {e}")));
                }
            }
            Err(McpError::Protocol("event stream closed before endpoint event".into()))
        })
        .await
        .map_err(|_| McpError::Transport("timed out waiting for endpoint event".into()))??;

        debug!(url, endpoint = %endpoint, "MCP SSE endpoint received");

        let client = Self {
            endpoint,
            client,
            headers,
            timeout,
            next_id: AtomicU64::new(1),
            events: Mutex::new(events),
        };

        client.request("initialize", Some(initialize_params())).await?;
        client.send(&JsonRpcNotification::new("notifications/initialized")).await?;
        Ok(client)
    }

    async fn send<M: Serialize>(&self, message: &M) -> Result<(), McpError> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(message)
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
        Ok(())
    }

    /// Requests are serialized: the stream lock is held until the response arrives.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let mut events = self.events.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.send(&JsonRpcRequest::new(id, method, params)).await?;

        let wait = async {
            while let Some(event) = events.next().await {
                let event = event.map_err(McpError::Transport)?;
                if event.event != "message" && !event.event.is_empty() {
                    continue;
                }
                match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                    Ok(resp) if resp.id == Some(id) && (resp.result.is_some() || resp.error.is_some()) => {
                        return resp.into_result();
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Skipping unparseable MCP event"),
                }
            }
            Err(McpError::Protocol(format!("event stream closed before response {id}")))
        };

        tokio::time::timeout(self.timeout, wait).await.map_err(|_| {
            McpError::Transport(format!("{method} timed out after {}s", self.timeout.as_secs()))
        })?
    }
}

#[async_trait]
impl McpClient for SseClient {
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
        serde_json::from_value(self.request("tools/call", Some(params)).await?)
            .map_err(|e| McpError::Protocol(format!("invalid tools/call result: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn stream_without_endpoint_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("event: ping\ndata: {}\n\n", "text/event-stream"))
            .mount(&server)
            .await;

        let err = SseClient::connect(&format!("{}/sse", server.uri()), &BTreeMap::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn missing_stream_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = SseClient::connect(&server.uri(), &BTreeMap::new()).await.err().unwrap();
        assert!(matches!(err, McpError::Status { status_code: 404, .. }));
    }
}
