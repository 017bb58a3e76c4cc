//! `ragrelay ask`: one blocking turn.

use super::runtime::{Runtime, require_api_key};

pub async fn run(agent_id: &str, question: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    require_api_key(&runtime.config)?;

    eprint!("  Thinking...");
    let result = runtime.orchestrator.answer(agent_id, question, Vec::new()).await;
    eprint!("\r              \r");

    let result = result?;
    println!("{}", result.response);
    eprintln!(
        "  [{} in / {} out tokens{}]",
        result.input_tokens,
        result.output_tokens,
        if result.success { "" } else { ", failed" }
    );
    if let Some(error) = &result.error {
        tracing::debug!(error = %error, "Turn error detail");
    }
    Ok(())
}
