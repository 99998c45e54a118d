use crate::client::ClientConfig;
use crate::constants::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::types::{BetwiseError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Conversational sports betting advisor", long_about = None)]
pub struct Args {
    #[arg(long, env = "BETWISE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Request a single JSON body instead of an SSE stream.
    #[arg(long, default_value_t = false)]
    pub no_stream: bool,
    /// Let the model use hosted web search.
    #[arg(long, default_value_t = false)]
    pub web_search: bool,
    #[arg(long, default_value_t = 120)]
    pub request_timeout_secs: u64,
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
    #[arg(long, default_value_t = false)]
    pub log_json: bool,
}

impl Args {
    pub fn client_config(&self, api_key: String) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            api_key,
            model: self.model.clone(),
            stream: !self.no_stream,
            web_search: self.web_search,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            max_retries: self.max_retries,
        }
    }
}

/// Reads the API key from the environment (after `.env` has been loaded).
pub fn api_key_from_env() -> Result<String> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(k) if !k.trim().is_empty() => Ok(k.trim().to_string()),
        _ => Err(BetwiseError::Validation(
            "OPENAI_API_KEY environment variable is missing or empty".to_string(),
        )
        .into()),
    }
}

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    /// Expand or collapse bet card `n` (1-based) on the last reply.
    ToggleBet(usize),
    ToggleSources,
    Reset,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let mut parts = line.split_whitespace();
    let command = match parts.next() {
        Some("/quit") | Some("/exit") => Command::Quit,
        Some("/reset") => Command::Reset,
        Some("/help") => Command::Help,
        Some("/sources") => Command::ToggleSources,
        Some("/bet") => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n > 0 => Command::ToggleBet(n),
            _ => Command::Help,
        },
        _ => Command::Message(line.to_string()),
    };
    Some(command)
}

pub const HELP_TEXT: &str =
    "Commands: /bet N (toggle bet card N), /sources (toggle sources), /reset, /help, /quit";
