//! Error types for the RagRelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all RagRelay operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Vector store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- MCP errors ---
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    // --- Agent / toolset / file lookups ---
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether an upstream service answered with a non-success status.
    ///
    /// These usually mean a model identifier, API key, or other external
    /// reference configured on the agent is wrong, and are reported to the
    /// user differently from generic failures.
    pub fn is_upstream_status(&self) -> bool {
        match self {
            Error::Provider(e) => e.is_upstream_status(),
            Error::Tool(e) => e.is_upstream_status(),
            Error::Mcp(e) => e.is_upstream_status(),
            _ => false,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    pub fn is_upstream_status(&self) -> bool {
        matches!(
            self,
            ProviderError::ApiError { .. }
                | ProviderError::RateLimited { .. }
                | ProviderError::AuthenticationFailed(_)
                | ProviderError::ModelNotFound(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector store request failed: {0}")]
    Transport(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid point payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid tool definition: {0}")]
    InvalidDefinition(String),

    #[error("Remote tool failed: {tool_name}: {source}")]
    Remote {
        tool_name: String,
        #[source]
        source: McpError,
    },
}

impl ToolError {
    pub fn is_upstream_status(&self) -> bool {
        match self {
            ToolError::Remote { source, .. } => source.is_upstream_status(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum McpError {
    #[error("MCP transport failed: {0}")]
    Transport(String),

    #[error("MCP server answered HTTP {status_code}: {body}")]
    Status { status_code: u16, body: String },

    #[error("MCP protocol violation: {0}")]
    Protocol(String),

    #[error("MCP server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("MCP discovery failed for {url}: {reason}")]
    DiscoveryFailed { url: String, reason: String },
}

impl McpError {
    pub fn is_upstream_status(&self) -> bool {
        matches!(self, McpError::Status { .. })
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Toolset not found: {0}")]
    ToolsetNotFound(String),

    #[error("File lookup failed: {0}")]
    FileLookup(String),

    #[error("Catalog write failed: {0}")]
    Write(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 404,
            message: "model does not exist".into(),
        });
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("model does not exist"));
    }

    #[test]
    fn upstream_status_classification() {
        assert!(Error::from(ProviderError::RateLimited { retry_after_secs: 5 }).is_upstream_status());
        assert!(Error::from(ProviderError::ModelNotFound("gpt-x".into())).is_upstream_status());
        assert!(!Error::from(ProviderError::Network("refused".into())).is_upstream_status());
        assert!(!Error::from(StoreError::Transport("down".into())).is_upstream_status());

        let not_found = || McpError::Status { status_code: 404, body: "no such path".into() };
        assert!(Error::from(not_found()).is_upstream_status());
        assert!(Error::from(ToolError::Remote { tool_name: "lookup".into(), source: not_found() }).is_upstream_status());
        let reset = ToolError::Remote { tool_name: "lookup".into(), source: McpError::Transport("reset".into()) };
        assert!(!Error::from(reset).is_upstream_status());
    }

    #[test]
    fn mcp_discovery_error_names_url() {
        let err = Error::Mcp(McpError::DiscoveryFailed {
            url: "http://mcp.local".into(),
            reason: "both transports failed".into(),
        });
        assert!(err.to_string().contains("http://mcp.local"));
    }
}
