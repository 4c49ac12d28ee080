//! Command-line entry point. Talks to the Whisper backend through the same
//! client the HTTP gateway embeds.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`GatewayConfig`] (file, then `WHISPER_*` environment overrides).
//! 3. Build one [`WhisperClient`] from the backend section.
//! 4. Run the requested command and print the JSON response.
//! 5. Close the connection and log the call metrics.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use whisper_gateway::config::GatewayConfig;
use whisper_gateway::rpc::{Task, WhisperClient};

#[derive(Parser, Debug)]
#[command(name = "whisper-gateway", about = "Client for the Whisper transcription backend")]
struct Cli {
    /// Read settings from this TOML file instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the models the backend offers and has loaded.
    Models,

    /// Transcribe an audio file.
    Transcribe {
        /// Audio file to transcribe.
        file: PathBuf,

        /// Whisper model (defaults to the configured one).
        #[arg(long)]
        model: Option<String>,

        /// Spoken language; omit for auto-detection.
        #[arg(long)]
        language: Option<String>,

        /// `transcribe` or `translate`.
        #[arg(long)]
        task: Option<Task>,

        /// Send the file contents instead of its path (for backends that do
        /// not share our filesystem).
        #[arg(long)]
        inline: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<GatewayConfig> {
    match path {
        Some(path) => {
            let mut config = GatewayConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => GatewayConfig::load(),
    }
}

async fn run(cli: Cli, config: GatewayConfig, client: &WhisperClient) -> Result<()> {
    let output = match cli.command {
        Command::Models => {
            let models = client.list_models().await.context("listing models failed")?;
            serde_json::to_string_pretty(&models)?
        }
        Command::Transcribe {
            file,
            model,
            language,
            task,
            inline,
        } => {
            let model = model.unwrap_or(config.defaults.model);
            let task = task.unwrap_or(config.defaults.task);
            let language = language.as_deref();

            let result = if inline {
                let data = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("failed to read {}", file.display()))?;
                client.transcribe_bytes(&data, &model, language, task).await
            } else {
                client.transcribe_path(&file, &model, language, task).await
            };
            let result = result.context("transcription failed")?;

            serde_json::to_string_pretty(&result)?
        }
    };

    println!("{output}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).context("failed to load configuration")?;
    log::info!("using transcription backend at {}", config.backend.addr());

    let client = WhisperClient::from_config(&config.backend);
    let outcome = run(cli, config, &client).await;

    client.close().await;
    log::info!("{}", client.metrics());
    outcome
}
