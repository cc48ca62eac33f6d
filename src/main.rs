use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portablemind::{Config, OpenAiClient, Session};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portablemind")]
#[command(version)]
#[command(about = "Streaming chat with an OpenAI-compatible model", long_about = None)]
struct Cli {
    /// Read configuration from this file instead of ~/.portablemind/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured model
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and stream the answer to stdout
    Ask { prompt: Vec<String> },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    Ok(config)
}

fn init_logging(config: &Config, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_level.as_deref().unwrap_or("portablemind=info"))
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // The TUI owns the terminal, so interactive runs log to a file.
    if interactive {
        let path = Config::home_dir()?.join("portablemind.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        let _ = builder.with_ansi(false).with_writer(Mutex::new(file)).try_init();
    } else {
        let _ = builder.with_writer(std::io::stderr).try_init();
    }
    Ok(())
}

async fn ask(session: &mut Session, prompt: String) -> Result<()> {
    session.submit(prompt)?;

    // Print fragments as they land; the sink only ever grows.
    let mut printed = 0;
    let mut out = std::io::stdout();
    let result = loop {
        if let Some(live) = session.live_buffer() {
            if live.len() > printed {
                out.write_all(live[printed..].as_bytes())?;
                out.flush()?;
                printed = live.len();
            }
        }
        if let Some(result) = session.poll_response() {
            break result;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    };

    let reply = result?;
    out.write_all(reply.content.get(printed..).unwrap_or_default().as_bytes())?;
    writeln!(out)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config, cli.command.is_none())?;

    if !config.has_api_key() {
        eprintln!(
            "❌ No API key configured. Set api_key in the config file or export {}.",
            config.api_key_env
        );
        std::process::exit(1);
    }

    let client = OpenAiClient::new(&config).context("Failed to create HTTP client")?;
    tracing::info!(model = %client.model(), "starting");
    let mut session = Session::new(Arc::new(client));

    match cli.command {
        None => portablemind::ui::run(session).await,
        Some(Commands::Ask { prompt }) => ask(&mut session, prompt.join(" ")).await,
    }
}
