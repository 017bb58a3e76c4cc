//! RagRelay CLI, the main entry point.
//!
//! Commands:
//! - `ask`           One blocking turn against an agent
//! - `chat`          Interactive streaming chat with a persisted history file
//! - `mcp discover`  List an MCP server's tools, optionally saving them to a toolset
//! - `config`        Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ragrelay",
    about = "RagRelay: retrieval-augmented, tool-calling agent turns",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask an agent a single question
    Ask {
        /// Agent identifier from the catalog
        #[arg(short, long)]
        agent: String,

        /// The question
        question: String,
    },

    /// Chat with an agent, streaming its answers
    Chat {
        /// Agent identifier from the catalog
        #[arg(short, long)]
        agent: String,

        /// JSON file holding the conversation history
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Model Context Protocol utilities
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },

    /// Print the effective configuration (secrets redacted)
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
enum McpCommands {
    /// Discover a server's tools
    Discover {
        /// Server URL; defaults to the toolset's server URL
        url: Option<String>,

        /// Save discovered tools into this MCP_SERVER toolset of the catalog
        #[arg(short, long)]
        toolset: Option<String>,

        /// Extra request header, `Name=value`
        #[arg(short = 'H', long = "header", value_parser = commands::mcp::parse_header)]
        headers: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ask { agent, question } => commands::ask::run(&agent, &question).await?,
        Commands::Chat { agent, history } => commands::chat::run(&agent, history).await?,
        Commands::Mcp {
            command: McpCommands::Discover { url, toolset, headers },
        } => commands::mcp::discover(url, toolset, headers).await?,
        Commands::Config { path } => {
            if path {
                commands::config_cmd::path()
            } else {
                commands::config_cmd::show()?
            }
        }
    }

    Ok(())
}
