use std::{
    fs,
    io::{self, Read as _},
    path::PathBuf,
};

use anyhow::Context as _;
use apertus_format::{
    chat::{Message, ToolDescription},
    load_apertus_encoding, ApertusEncodingName, RenderConversationConfig,
};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Render a chat conversation into an Apertus prompt.
#[derive(Parser, Debug)]
#[command(name = "apertus-render", version, about)]
struct Args {
    /// JSON file holding `{"messages": [...], "tools": [...]}`. Reads stdin when omitted.
    input: Option<PathBuf>,

    #[arg(long, default_value = "Apertus")]
    encoding: ApertusEncodingName,

    /// Announce deliberation as enabled.
    #[arg(long)]
    enable_thinking: bool,

    /// Open an assistant turn after the conversation.
    #[arg(long)]
    add_generation_prompt: bool,

    /// Date for the default system message.
    #[arg(long)]
    current_date: Option<String>,

    /// Override the beginning-of-sequence token.
    #[arg(long)]
    bos_token: Option<String>,
}

#[derive(Deserialize)]
struct RenderRequest {
    messages: Vec<Message>,
    #[serde(default)]
    tools: Option<Vec<ToolDescription>>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("apertus_format=warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let raw = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read request from stdin")?;
            buf
        }
    };
    let request: RenderRequest =
        serde_json::from_str(&raw).context("invalid render request JSON")?;

    let mut encoding = load_apertus_encoding(args.encoding)?;
    if let Some(bos_token) = args.bos_token {
        encoding = encoding.with_bos_token(bos_token);
    }

    let mut config = RenderConversationConfig::default()
        .with_enable_thinking(args.enable_thinking)
        .with_add_generation_prompt(args.add_generation_prompt);
    if let Some(current_date) = args.current_date {
        config = config.with_current_date(current_date);
    }

    tracing::info!(
        messages = request.messages.len(),
        encoding = %encoding,
        "rendering request"
    );
    let prompt =
        encoding.render_conversation(&request.messages, request.tools.as_deref(), Some(&config));
    print!("{prompt}");
    Ok(())
}
