//! `ragrelay chat`: interactive streaming chat.
//!
//! Each successful turn is written to the history file by a completion hook,
//! so the next turn (or the next session) continues the conversation.

use async_trait::async_trait;
use futures::StreamExt;
use ragrelay_agent::{CompletionHook, StreamEvent};
use ragrelay_config::AppConfig;
use ragrelay_core::agent::ExecutionResult;
use ragrelay_core::error::{Error, Result as CoreResult};
use ragrelay_core::message::Message;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::runtime::{Runtime, require_api_key};

/// On-disk conversation history.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    agent_id: String,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    messages: Vec<Message>,
}

/// How long the prompt waits for the previous turn's history to land.
const HOOK_WAIT: Duration = Duration::from_secs(5);

/// Writes the full turn history to disk and keeps the in-session copy current.
///
/// `saved` counts completed turns; the chat loop waits on it before reading
/// the next line.
struct HistoryHook {
    path: PathBuf,
    agent_id: String,
    current: Arc<Mutex<Vec<Message>>>,
    saved: watch::Sender<u64>,
}

#[async_trait]
impl CompletionHook for HistoryHook {
    async fn on_complete(&self, result: ExecutionResult) -> CoreResult<()> {
        let file = HistoryFile {
            agent_id: self.agent_id.clone(),
            updated_at: Some(chrono::Utc::now()),
            messages: result.messages,
        };
        let json = serde_json::to_string_pretty(&file);

        if let Ok(mut current) = self.current.lock() {
            *current = file.messages;
        }
        self.saved.send_modify(|turns| *turns += 1);

        tokio::fs::write(&self.path, json?)
            .await
            .map_err(|e| Error::Internal(format!("writing {}: {e}", self.path.display())))
    }
}

fn load_history(path: &Path, agent_id: &str) -> Vec<Message> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str::<HistoryFile>(&content) {
        Ok(file) if file.agent_id == agent_id => file.messages,
        Ok(file) => {
            warn!(file_agent = %file.agent_id, agent = agent_id, "History belongs to another agent, starting fresh");
            Vec::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable history, starting fresh");
            Vec::new()
        }
    }
}

pub async fn run(agent_id: &str, history_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    require_api_key(&runtime.config)?;

    let history_path =
        history_path.unwrap_or_else(|| AppConfig::config_dir().join(format!("history-{agent_id}.json")));
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let current = Arc::new(Mutex::new(load_history(&history_path, agent_id)));
    let (saved, mut saved_turns) = watch::channel(0u64);
    let hook: Arc<dyn CompletionHook> = Arc::new(HistoryHook {
        path: history_path.clone(),
        agent_id: agent_id.to_string(),
        current: current.clone(),
        saved,
    });

    println!();
    println!("  Agent:    {agent_id}");
    println!("  History:  {}", history_path.display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C stops the current answer; 'exit' quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        let history = current.lock().map(|h| h.clone()).unwrap_or_default();
        let expected = *saved_turns.borrow() + 1;
        let mut failed = false;
        let cancel = CancellationToken::new();
        let mut events = runtime
            .orchestrator
            .answer_streaming(agent_id, question, history, Some(hook.clone()), cancel.clone())
            .await;

        print!("\n  Assistant > ");
        std::io::stdout().flush()?;
        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => {
                        failed |= matches!(event, StreamEvent::Error { .. });
                        render(&event)?;
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    eprintln!("\n  [cancelled]");
                    cancel.cancel();
                }
            }
        }
        if !failed {
            let landed = saved_turns.wait_for(|turns| *turns >= expected);
            if tokio::time::timeout(HOOK_WAIT, landed).await.is_err() {
                warn!("History was not saved in time, the next turn may miss it");
            }
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn render(event: &StreamEvent) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    match event {
        StreamEvent::Response { delta } => {
            write!(out, "{delta}")?;
            out.flush()?;
        }
        StreamEvent::Searching => eprint!("[searching] "),
        StreamEvent::Thinking { .. } | StreamEvent::Keepalive => {}
        StreamEvent::ToolCall { name, args } => eprint!("\n  [tool {name} {args}] "),
        StreamEvent::ToolRunning { .. } => {}
        StreamEvent::ToolResult { name, .. } => eprint!("[{name} done]\n  "),
        StreamEvent::Error { message, .. } => eprintln!("\n  [Error] {message}"),
        StreamEvent::EndTurn => writeln!(out)?,
    }
    Ok(())
}
