//! Tool and toolset definitions.
//!
//! Persistence hands us flat records with a string `type` tag. Those are
//! decoded exactly once, here, into closed enums ([`ToolDefinition`],
//! [`ToolsetKind`]) that the rest of the system matches on exhaustively.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::{DirectoryError, ToolError};

/// Persisted tool type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolType {
    Agent,
    Webhook,
    McpTool,
}

/// Persisted toolset type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolsetType {
    Custom,
    McpServer,
}

/// Side metadata carried by a type tag.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo<T: 'static> {
    pub ty: T,
    pub tag: &'static str,
    /// Whether users may pick this type when creating records.
    pub visible: bool,
}

pub const TOOL_TYPES: &[TypeInfo<ToolType>] = &[
    TypeInfo { ty: ToolType::Agent, tag: "AGENT", visible: true },
    TypeInfo { ty: ToolType::Webhook, tag: "WEBHOOK", visible: true },
    // Only ever created by MCP discovery.
    TypeInfo { ty: ToolType::McpTool, tag: "MCP_TOOL", visible: false },
];

pub const TOOLSET_TYPES: &[TypeInfo<ToolsetType>] = &[
    TypeInfo { ty: ToolsetType::McpServer, tag: "MCP_SERVER", visible: true },
    TypeInfo { ty: ToolsetType::Custom, tag: "CUSTOM", visible: true },
];

impl ToolType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        TOOL_TYPES.iter().find(|t| t.tag == tag).map(|t| t.ty)
    }

    pub fn info(self) -> &'static TypeInfo<ToolType> {
        // Every variant has a row in TOOL_TYPES.
        match self {
            ToolType::Agent => &TOOL_TYPES[0],
            ToolType::Webhook => &TOOL_TYPES[1],
            ToolType::McpTool => &TOOL_TYPES[2],
        }
    }

    pub fn tag(self) -> &'static str {
        self.info().tag
    }

    pub fn visible() -> impl Iterator<Item = &'static TypeInfo<ToolType>> {
        TOOL_TYPES.iter().filter(|t| t.visible)
    }
}

impl ToolsetType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        TOOLSET_TYPES.iter().find(|t| t.tag == tag).map(|t| t.ty)
    }

    pub fn tag(self) -> &'static str {
        match self {
            ToolsetType::McpServer => TOOLSET_TYPES[0].tag,
            ToolsetType::Custom => TOOLSET_TYPES[1].tag,
        }
    }

    pub fn visible() -> impl Iterator<Item = &'static TypeInfo<ToolsetType>> {
        TOOLSET_TYPES.iter().filter(|t| t.visible)
    }
}

/// HTTP methods a webhook may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(ToolError::InvalidDefinition(format!(
                "unsupported HTTP method '{other}'"
            ))),
        }
    }
}

/// A webhook call template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSpec {
    /// URL template with `{name}` path placeholders.
    pub url: String,
    pub http_method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub path_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub query_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub body_schema: Option<serde_json::Value>,
}

/// What a tool does when called.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDefinition {
    Webhook(WebhookSpec),
    Agent {
        target_agent_id: String,
    },
    Mcp {
        title: Option<String>,
        input_schema: serde_json::Value,
        output_schema: Option<serde_json::Value>,
    },
}

impl ToolDefinition {
    pub fn tool_type(&self) -> ToolType {
        match self {
            ToolDefinition::Webhook(_) => ToolType::Webhook,
            ToolDefinition::Agent { .. } => ToolType::Agent,
            ToolDefinition::Mcp { .. } => ToolType::McpTool,
        }
    }
}

/// A decoded tool: identity plus its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub definition: ToolDefinition,
}

/// Flat tool row, as persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_path_params_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_query_params_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_body_params_schema: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// JSON nulls are treated as "not declared".
fn declared(schema: Option<serde_json::Value>) -> Option<serde_json::Value> {
    schema.filter(|v| !v.is_null())
}

impl TryFrom<ToolRecord> for ToolSpec {
    type Error = ToolError;

    fn try_from(record: ToolRecord) -> Result<Self, Self::Error> {
        let ty = ToolType::from_tag(&record.tool_type).ok_or_else(|| {
            ToolError::InvalidDefinition(format!(
                "tool '{}' has unknown type '{}'",
                record.name, record.tool_type
            ))
        })?;

        let missing = |field: &str| {
            ToolError::InvalidDefinition(format!("{} tool '{}' is missing {field}", ty.tag(), record.name))
        };

        let definition = match ty {
            ToolType::Webhook => {
                let url = record.webhook_url.clone().ok_or_else(|| missing("webhook_url"))?;
                let http_method = record
                    .webhook_http_method
                    .as_deref()
                    .ok_or_else(|| missing("webhook_http_method"))?
                    .parse()?;
                ToolDefinition::Webhook(WebhookSpec {
                    url,
                    http_method,
                    headers: record.webhook_headers.clone().unwrap_or_default(),
                    path_schema: declared(record.webhook_path_params_schema.clone()),
                    query_schema: declared(record.webhook_query_params_schema.clone()),
                    body_schema: declared(record.webhook_body_params_schema.clone()),
                })
            }
            ToolType::Agent => ToolDefinition::Agent {
                target_agent_id: record
                    .target_agent_id
                    .clone()
                    .ok_or_else(|| missing("target_agent_id"))?,
            },
            ToolType::McpTool => ToolDefinition::Mcp {
                title: record.mcp_title.clone(),
                input_schema: declared(record.input_schema.clone())
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
                output_schema: declared(record.output_schema.clone()),
            },
        };

        Ok(ToolSpec {
            id: record.id,
            name: record.name,
            description: record.description,
            definition,
        })
    }
}

impl From<&ToolSpec> for ToolRecord {
    fn from(spec: &ToolSpec) -> Self {
        let mut record = ToolRecord {
            id: spec.id.clone(),
            tool_type: spec.definition.tool_type().tag().to_string(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            is_active: true,
            ..Default::default()
        };
        match &spec.definition {
            ToolDefinition::Webhook(w) => {
                record.webhook_url = Some(w.url.clone());
                record.webhook_http_method = Some(w.http_method.as_str().to_string());
                record.webhook_headers = (!w.headers.is_empty()).then(|| w.headers.clone());
                record.webhook_path_params_schema = w.path_schema.clone();
                record.webhook_query_params_schema = w.query_schema.clone();
                record.webhook_body_params_schema = w.body_schema.clone();
            }
            ToolDefinition::Agent { target_agent_id } => {
                record.target_agent_id = Some(target_agent_id.clone());
            }
            ToolDefinition::Mcp { title, input_schema, output_schema } => {
                record.mcp_title = title.clone();
                record.input_schema = Some(input_schema.clone());
                record.output_schema = output_schema.clone();
            }
        }
        record
    }
}

/// How a toolset's tools are reached.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolsetKind {
    Custom,
    McpServer {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

/// A named group of tools bindable to an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolset {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: ToolsetKind,
    pub tools: Vec<ToolSpec>,
}

/// Flat toolset row, as persisted, with its tool rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsetRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub toolset_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_server_headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tools: Vec<ToolRecord>,
}

impl TryFrom<ToolsetRecord> for Toolset {
    type Error = ToolError;

    /// Inactive tool rows are dropped.
    fn try_from(record: ToolsetRecord) -> Result<Self, Self::Error> {
        let ty = ToolsetType::from_tag(&record.toolset_type).ok_or_else(|| {
            ToolError::InvalidDefinition(format!(
                "toolset '{}' has unknown type '{}'",
                record.name, record.toolset_type
            ))
        })?;

        let kind = match ty {
            ToolsetType::Custom => ToolsetKind::Custom,
            ToolsetType::McpServer => ToolsetKind::McpServer {
                url: record.mcp_server_url.ok_or_else(|| {
                    ToolError::InvalidDefinition(format!(
                        "MCP_SERVER toolset '{}' is missing mcp_server_url",
                        record.name
                    ))
                })?,
                headers: record.mcp_server_headers.unwrap_or_default(),
            },
        };

        let tools = record
            .tools
            .into_iter()
            .filter(|t| t.is_active)
            .map(ToolSpec::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Toolset {
            id: record.id,
            name: record.name,
            description: record.description,
            kind,
            tools,
        })
    }
}

/// Persists tools created by MCP discovery.
#[async_trait]
pub trait ToolCatalogWriter: Send + Sync {
    async fn add_tool(&self, toolset_id: &str, record: ToolRecord) -> Result<(), DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn webhook_record() -> ToolRecord {
        ToolRecord {
            id: "t1".into(),
            tool_type: "WEBHOOK".into(),
            name: "Get Order".into(),
            webhook_url: Some("https://api.example.com/orders/{order_id}".into()),
            webhook_http_method: Some("get".into()),
            webhook_path_params_schema: Some(json!({"type": "object"})),
            webhook_body_params_schema: Some(serde_json::Value::Null),
            is_active: true,
            ..Default::default()
        }
    }

    #[test]
    fn decodes_webhook_record() {
        let spec = ToolSpec::try_from(webhook_record()).unwrap();
        let ToolDefinition::Webhook(w) = spec.definition else {
            panic!("expected webhook");
        };
        assert_eq!(w.http_method, HttpMethod::Get);
        assert!(w.path_schema.is_some());
        assert!(w.body_schema.is_none(), "null schema means undeclared");
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut record = webhook_record();
        record.tool_type = "SCRIPT".into();
        let err = ToolSpec::try_from(record).unwrap_err();
        assert!(err.to_string().contains("SCRIPT"));
    }

    #[test]
    fn agent_record_requires_target() {
        let record = ToolRecord {
            tool_type: "AGENT".into(),
            name: "helper".into(),
            is_active: true,
            ..Default::default()
        };
        assert!(matches!(
            ToolSpec::try_from(record),
            Err(ToolError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn mcp_tool_type_is_hidden() {
        assert!(!ToolType::McpTool.info().visible);
        let visible: Vec<_> = ToolType::visible().map(|t| t.tag).collect();
        assert_eq!(visible, vec!["AGENT", "WEBHOOK"]);
        assert_eq!(ToolsetType::visible().count(), 2);
    }

    #[test]
    fn toolset_drops_inactive_tools() {
        let mut inactive = webhook_record();
        inactive.is_active = false;
        let record = ToolsetRecord {
            id: "ts1".into(),
            toolset_type: "CUSTOM".into(),
            name: "orders".into(),
            tools: vec![webhook_record(), inactive],
            ..Default::default()
        };
        let toolset = Toolset::try_from(record).unwrap();
        assert_eq!(toolset.kind, ToolsetKind::Custom);
        assert_eq!(toolset.tools.len(), 1);
    }

    #[test]
    fn mcp_server_toolset_requires_url() {
        let record = ToolsetRecord {
            id: "ts2".into(),
            toolset_type: "MCP_SERVER".into(),
            name: "remote".into(),
            ..Default::default()
        };
        assert!(Toolset::try_from(record).is_err());
    }

    #[test]
    fn mcp_spec_encodes_back_to_record() {
        let spec = ToolSpec {
            id: String::new(),
            name: "search_docs".into(),
            description: Some("Search documentation".into()),
            definition: ToolDefinition::Mcp {
                title: Some("Search Docs".into()),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            },
        };
        let record = ToolRecord::from(&spec);
        assert_eq!(record.tool_type, "MCP_TOOL");
        assert_eq!(record.mcp_title.as_deref(), Some("Search Docs"));
        assert_eq!(ToolSpec::try_from(record).unwrap(), spec);
    }
}
