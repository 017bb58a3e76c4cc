//! Wiring shared by the turn-running commands.

use ragrelay_agent::{ContextAssembler, TurnOrchestrator};
use ragrelay_config::{AppConfig, Catalog};
use ragrelay_store::{QdrantStore, StaticCatalog};
use std::sync::Arc;
use tracing::debug;

pub struct Runtime {
    pub config: AppConfig,
    pub orchestrator: Arc<TurnOrchestrator>,
}

impl Runtime {
    /// Load config and catalog, then build providers, stores, and the orchestrator.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        let catalog = StaticCatalog::new(Catalog::load_from(&config.catalog_path)?);

        let router = ragrelay_providers::build_from_config(&config);
        debug!(providers = ?router.list(), default = %config.default_provider, "Providers ready");

        let assembler = Arc::new(ContextAssembler::new(
            router.clone(),
            Arc::new(QdrantStore::from_config(&config.vector_store)),
            Arc::new(catalog.clone()),
            config.retrieval.clone(),
        ));
        let orchestrator = TurnOrchestrator::new(
            router,
            assembler,
            Arc::new(catalog),
            config.webhook.timeout(),
            config.execution.clone(),
        );

        Ok(Self { config, orchestrator })
    }
}

/// Fail early with setup instructions when no key is configured.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let has_key = config.api_key.is_some() || config.providers.values().any(|p| p.api_key.is_some());
    if has_key {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    OPENAI_API_KEY   = 'sk-...'");
    eprintln!("    RAGRELAY_API_KEY = 'sk-...'");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
