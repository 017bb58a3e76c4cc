//! Streaming events for one turn.
//!
//! `StreamEvent` is what the engine produces; `StreamMessage` is its flat
//! wire shape, one JSON object per event:
//!
//! - `searching`    context assembly started
//! - `thinking`     reasoning delta, carried in `info`
//! - `tool_call`    the model requested a tool
//! - `tool_running` the tool is executing
//! - `tool_result`  the tool finished
//! - `response`     answer text delta
//! - `keepalive`    nothing happened for a while
//! - `error`        the turn failed
//! - `end_turn`     always last, exactly once

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "StreamMessage")]
pub enum StreamEvent {
    Searching,
    Thinking { delta: String },
    ToolCall { name: String, args: String },
    ToolRunning { name: String },
    ToolResult { name: String, result: String },
    Response { delta: String },
    Keepalive,
    Error { error: String, message: String },
    EndTurn,
}

impl StreamEvent {
    /// Wire status for this event.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Thinking { .. } => "thinking",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolRunning { .. } => "tool_running",
            Self::ToolResult { .. } => "tool_result",
            Self::Response { .. } => "response",
            Self::Keepalive => "keepalive",
            Self::Error { .. } => "error",
            Self::EndTurn => "end_turn",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EndTurn)
    }
}

/// Flat event shape sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub response: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl StreamMessage {
    fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            error: None,
            response: String::new(),
            tool_name: None,
            tool_args: None,
            tool_result: None,
            info: None,
        }
    }
}

impl From<StreamEvent> for StreamMessage {
    fn from(event: StreamEvent) -> Self {
        let mut msg = StreamMessage::status(event.status());
        match event {
            StreamEvent::Searching => {
                msg.info = Some("Searching knowledge bases...".into());
            }
            StreamEvent::Thinking { delta } => msg.info = Some(delta),
            StreamEvent::ToolCall { name, args } => {
                msg.tool_name = Some(name);
                msg.tool_args = Some(args);
                msg.info = Some("Calling tool.".into());
            }
            StreamEvent::ToolRunning { name } => msg.tool_name = Some(name),
            StreamEvent::ToolResult { name, result } => {
                msg.tool_name = Some(name);
                msg.tool_result = Some(result);
                msg.info = Some("Tool finished.".into());
            }
            StreamEvent::Response { delta } => msg.response = delta,
            StreamEvent::Error { error, message } => {
                msg.error = Some(error);
                msg.response = message;
            }
            StreamEvent::Keepalive | StreamEvent::EndTurn => {}
        }
        msg
    }
}
