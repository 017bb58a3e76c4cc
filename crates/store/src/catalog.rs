//! Catalog-backed collaborators.
//!
//! [`StaticCatalog`] serves agents, toolsets, and file metadata out of a
//! [`Catalog`] held in memory, and records tools added by MCP discovery so the
//! caller can write the catalog back to disk.

use async_trait::async_trait;
use ragrelay_config::Catalog;
use ragrelay_core::agent::{AgentConfig, AgentDirectory};
use ragrelay_core::error::DirectoryError;
use ragrelay_core::knowledge::{FileMetadata, FileStore};
use ragrelay_core::toolset::{ToolCatalogWriter, ToolRecord, Toolset};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Default)]
pub struct StaticCatalog {
    inner: Arc<RwLock<Catalog>>,
}

impl StaticCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(catalog)),
        }
    }

    /// A copy of the current catalog, including discovered tools.
    pub async fn snapshot(&self) -> Catalog {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl AgentDirectory for StaticCatalog {
    async fn load_agent_config(&self, agent_id: &str) -> Result<AgentConfig, DirectoryError> {
        let catalog = self.inner.read().await;
        catalog
            .agents
            .iter()
            .find(|a| a.config.id == agent_id && a.is_active)
            .map(|a| a.config.clone())
            .ok_or_else(|| DirectoryError::AgentNotFound(agent_id.to_string()))
    }

    async fn load_toolset(&self, toolset_id: &str) -> Result<Toolset, DirectoryError> {
        let record = {
            let catalog = self.inner.read().await;
            catalog
                .toolsets
                .iter()
                .find(|t| t.id == toolset_id)
                .cloned()
                .ok_or_else(|| DirectoryError::ToolsetNotFound(toolset_id.to_string()))?
        };

        Toolset::try_from(record).map_err(|e| {
            DirectoryError::ToolsetNotFound(format!("{toolset_id} could not be decoded: {e}"))
        })
    }
}

#[async_trait]
impl FileStore for StaticCatalog {
    async fn load_files_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, FileMetadata>, DirectoryError> {
        let catalog = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| catalog.files.get(id).map(|f| (id.clone(), f.clone())))
            .collect())
    }
}

#[async_trait]
impl ToolCatalogWriter for StaticCatalog {
    async fn add_tool(&self, toolset_id: &str, mut record: ToolRecord) -> Result<(), DirectoryError> {
        let mut catalog = self.inner.write().await;
        let toolset = catalog
            .toolsets
            .iter_mut()
            .find(|t| t.id == toolset_id)
            .ok_or_else(|| DirectoryError::ToolsetNotFound(toolset_id.to_string()))?;

        if record.id.is_empty() {
            record.id = uuid::Uuid::new_v4().to_string();
        }
        debug!(toolset = toolset_id, tool = %record.name, "Adding tool to catalog");
        toolset.tools.push(record);
        Ok(())
    }
}
