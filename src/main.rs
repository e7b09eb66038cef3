//! Console chat against the AnyRouter messages API.

use anyhow::Context;
use anyrouter_chat::config::{ConfigLoader, Settings};
use anyrouter_chat::repl::Session;
use anyrouter_chat::ChatClient;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "anyrouter-chat", version, about = "Chat with Claude through AnyRouter")]
struct Args {
    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum tokens per response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Start with streaming responses enabled
    #[arg(long)]
    stream: bool,

    /// Settings file to use instead of the default locations
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Settings {
        Settings {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::from_path(path)?,
        None => ConfigLoader::new()?,
    };
    let mut settings = loader.into_settings();
    settings.merge(args.overrides());

    let api_key = match settings.api_key_from_env() {
        Some(key) => key,
        None => prompt_api_key(settings.api_key_env())?,
    };
    if api_key.is_empty() {
        println!("API key is required to proceed.");
        std::process::exit(1);
    }

    println!("Initializing Claude AI chat...");
    let config = settings.into_client_config(api_key)?;
    tracing::debug!(?config, "Resolved configuration");
    let client = ChatClient::new(config)?;

    let mut session = Session::new(&client).with_streaming(args.stream);
    let mut stdout = std::io::stdout();
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = session.run(stdin, &mut stdout) => {
            result.context("conversation loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Chat interrupted. Goodbye!");
            // The stdin reader thread may still be blocked on a read.
            std::process::exit(0);
        }
    }

    Ok(())
}

/// Ask for the key on the console when the environment has none
fn prompt_api_key(env_name: &str) -> anyhow::Result<String> {
    println!("AnyRouter API key required (set {} to skip this prompt)", env_name);
    print!("Enter your API key: ");
    std::io::stdout().flush()?;

    let mut key = String::new();
    std::io::stdin()
        .read_line(&mut key)
        .context("failed to read API key")?;

    Ok(key.trim().to_string())
}
