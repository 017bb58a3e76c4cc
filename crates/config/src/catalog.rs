//! The static agent/toolset catalog file.
//!
//! Real deployments keep agents, toolsets, and file metadata in their own
//! persistence layer. The catalog is a TOML stand-in used by the CLI:
//!
//! ```toml
//! [[agents]]
//! id = "support"
//! model = "gpt-4o-mini"
//! prompt = "You answer questions about our product."
//! toolsets = ["orders"]
//!
//! [[agents.knowledge_bases]]
//! id = "kb-manuals"
//!
//! [[toolsets]]
//! id = "orders"
//! type = "CUSTOM"
//! name = "Orders"
//!
//! [[toolsets.tools]]
//! type = "WEBHOOK"
//! name = "Get Order"
//! webhook_url = "https://api.example.com/orders/{order_id}"
//! webhook_http_method = "GET"
//!
//! [files.f-001]
//! name = "manual.pdf"
//! ```

use crate::ConfigError;
use ragrelay_core::agent::AgentConfig;
use ragrelay_core::knowledge::FileMetadata;
use ragrelay_core::toolset::ToolsetRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub agents: Vec<CatalogAgent>,

    #[serde(default)]
    pub toolsets: Vec<ToolsetRecord>,

    /// File metadata keyed by file identifier.
    #[serde(default)]
    pub files: BTreeMap<String, FileMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogAgent {
    #[serde(flatten)]
    pub config: AgentConfig,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Catalog {
    /// Load a catalog. A missing file yields an empty catalog.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No catalog found at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason,
        };
        let content = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }
}
