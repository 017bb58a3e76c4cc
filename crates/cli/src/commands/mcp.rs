//! `ragrelay mcp discover`: list, and optionally save, a server's tools.

use ragrelay_config::{AppConfig, Catalog};
use ragrelay_store::StaticCatalog;
use std::collections::BTreeMap;

pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected Name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub async fn discover(
    url: Option<String>,
    toolset_id: Option<String>,
    extra_headers: Vec<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = Catalog::load_from(&config.catalog_path)?;

    let mut headers = BTreeMap::new();
    let mut server_url = url;
    if let Some(id) = &toolset_id {
        let toolset = catalog
            .toolsets
            .iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| format!("Toolset '{id}' not found in {}", config.catalog_path.display()))?;
        headers.extend(toolset.mcp_server_headers.clone().unwrap_or_default());
        server_url = server_url.or_else(|| toolset.mcp_server_url.clone());
    }
    headers.extend(extra_headers);
    let server_url = server_url.ok_or("A server URL or an MCP_SERVER toolset is required")?;

    let specs = match &toolset_id {
        Some(id) => {
            let store = StaticCatalog::new(catalog);
            let specs = ragrelay_tools::materialize(id, &server_url, &headers, &store).await?;
            store.snapshot().await.save_to(&config.catalog_path)?;
            println!("  Saved {} tools to toolset '{id}'", specs.len());
            specs
        }
        None => ragrelay_tools::discover(&server_url, &headers).await?,
    };

    println!();
    for spec in &specs {
        println!("  {:<32} {}", spec.name, spec.description.as_deref().unwrap_or(""));
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parsing() {
        assert_eq!(
            parse_header("Authorization=Bearer abc").unwrap(),
            ("Authorization".to_string(), "Bearer abc".to_string())
        );
        assert_eq!(parse_header("X-Token=a=b").unwrap().1, "a=b");
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header("=value").is_err());
    }
}
