//! Webhook tool — calls an HTTP endpoint described by a [`WebhookSpec`].
//!
//! The model fills three optional argument objects:
//! - `path_params`: substituted into `{name}` placeholders of the URL
//! - `query_params`: appended as a query string (null values skipped)
//! - `body_params`: sent as the JSON body, only when a body schema is declared
//!
//! HTTP errors and transport failures never fail the call. They come back as
//! an `{"error": ...}` payload so the model can read and react to them.

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use ragrelay_core::error::ToolError;
use ragrelay_core::tool::{Tool, ToolResult};
use ragrelay_core::toolset::{HttpMethod, WebhookSpec};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::naming::tool_identifier;

/// Unreserved characters plus `/` stay literal.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

pub struct WebhookTool {
    name: String,
    description: String,
    spec: WebhookSpec,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookTool {
    pub fn new(
        display_name: &str,
        description: Option<&str>,
        spec: WebhookSpec,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            name: tool_identifier(display_name),
            description: description
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Execute {display_name}")),
            spec,
            client,
            timeout,
        }
    }

    /// Resolve the URL template against the call's path and query arguments.
    fn build_url(&self, arguments: &Value) -> Result<String, ToolError> {
        let mut url = self.spec.url.clone();

        if let Some(path_params) = arguments.get("path_params").and_then(Value::as_object) {
            for (key, value) in path_params {
                let encoded = utf8_percent_encode(&scalar_to_string(value), COMPONENT).to_string();
                url = url.replace(&format!("{{{key}}}"), &encoded);
            }
        }

        if let Some(missing) = first_placeholder(&url) {
            return Err(ToolError::InvalidArguments(format!(
                "missing path parameter '{missing}' for {}",
                self.name
            )));
        }

        if let Some(query_params) = arguments.get("query_params").and_then(Value::as_object) {
            let query: Vec<String> = query_params
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    format!(
                        "{}={}",
                        utf8_percent_encode(k, COMPONENT),
                        utf8_percent_encode(&scalar_to_string(v), COMPONENT)
                    )
                })
                .collect();

            if !query.is_empty() {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str(&query.join("&"));
            }
        }

        Ok(url)
    }

    fn method(&self) -> reqwest::Method {
        match self.spec.http_method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Tool for WebhookTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let declared = [
            ("path_params", &self.spec.path_schema),
            ("query_params", &self.spec.query_schema),
            ("body_params", &self.spec.body_schema),
        ];
        for (key, schema) in declared {
            if let Some(schema) = schema {
                properties.insert(key.to_string(), remove_nulls(schema.clone()));
            }
        }
        json!({ "type": "object", "properties": properties })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let url = self.build_url(&arguments)?;

        let mut request = self.client.request(self.method(), &url).timeout(self.timeout);
        for (key, value) in &self.spec.headers {
            request = request.header(key, value);
        }
        if self.spec.body_schema.is_some() {
            let body = arguments
                .get("body_params")
                .filter(|b| !b.is_null())
                .cloned()
                .unwrap_or_else(|| json!({}));
            request = request.json(&body);
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Webhook request failed");
                return Ok(ToolResult::json(false, json!({ "error": format!("Request failed: {e}") })));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Webhook response body unreadable");
                return Ok(ToolResult::json(false, json!({ "error": format!("Request failed: {e}") })));
            }
        };

        debug!(
            tool = %self.name,
            method = %self.spec.http_method.as_str(),
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Webhook call finished"
        );

        if status.is_success() {
            let result = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            Ok(ToolResult::json(
                true,
                json!({ "result": result, "status_code": status.as_u16() }),
            ))
        } else {
            Ok(ToolResult::json(
                false,
                json!({
                    "error": format!("HTTP {}: {text}", status.as_u16()),
                    "status_code": status.as_u16(),
                }),
            ))
        }
    }
}

/// Strings are used verbatim; other JSON scalars use their JSON text.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The name inside the first `{identifier}` left in the URL, if any.
fn first_placeholder(url: &str) -> Option<&str> {
    let mut rest = url;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let name = &after[..close];
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Some(name);
        }
        rest = after;
    }
    None
}

/// Recursively drop null-valued object keys and array items.
pub(crate) fn remove_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, remove_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(remove_nulls)
                .collect(),
        ),
        other => other,
    }
}
