//! QUILL CLI
//!
//! Replays recorded model output through a conversation and inspects tool
//! payloads offline.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, bail};
use quill_core::Message;
use quill_runtime::{Conversation, ScriptedSource, SessionConfig, Split};
use quill_tool::{ToolRegistry, decode, is_valid_json, sanitize_with_report};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "quill_cli=info,quill_runtime=info,quill_tool=info,quill_protocol=info";

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "QUILL - streaming tool-call protocol for local assistants", long_about = None)]
struct Cli {
    /// Log filter, overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded transcript as one assistant turn
    Replay {
        /// Recorded model output
        #[arg(short, long)]
        file: PathBuf,
        /// Session config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How to cut the transcript into fragments
        #[arg(long, default_value = "lines")]
        split: Split,
        /// Delay between fragments
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
        /// User message that opens the turn
        #[arg(long, default_value = "(replay)")]
        prompt: String,
        /// Print the turn outcome as JSON instead of the history
        #[arg(long)]
        json: bool,
    },
    /// Print a payload after sanitizing
    Sanitize {
        /// Payload file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Sanitize, validate and decode a payload
    Validate {
        /// Payload file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List builtin tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_json)?;

    match cli.command {
        Commands::Replay {
            file,
            config,
            split,
            delay_ms,
            prompt,
            json,
        } => replay(&file, config.as_deref(), split, delay_ms, &prompt, json).await,
        Commands::Sanitize { file } => {
            let (clean, report) = sanitize_with_report(&read(&file)?);
            tracing::info!(removed = report.removed, replaced = report.replaced, "sanitized");
            print!("{}", clean);
            Ok(())
        }
        Commands::Validate { file } => {
            let invocations = validate(&read(&file)?)?;
            println!("{}", serde_json::to_string_pretty(&invocations)?);
            Ok(())
        }
        Commands::Tools => {
            for descriptor in ToolRegistry::with_builtins().descriptors() {
                println!(
                    "{} [{:?}] {} {}",
                    descriptor.name,
                    descriptor.response_format,
                    descriptor.description,
                    descriptor.parameter_hint
                );
            }
            Ok(())
        }
    }
}

fn init_tracing(level: Option<&str>, json: bool) -> Result<()> {
    let filter = match level {
        Some(directives) => EnvFilter::try_new(directives)
            .wrap_err_with(|| format!("invalid log filter: {}", directives))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("cannot read {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => Ok(SessionConfig::from_path(path)?),
        None => Ok(SessionConfig::default()),
    }
}

fn validate(payload: &str) -> Result<Vec<quill_tool::ToolInvocation>> {
    let (clean, _) = sanitize_with_report(payload);
    if !is_valid_json(&clean) {
        bail!("payload is not valid JSON");
    }
    match decode(&clean) {
        Some(invocations) => Ok(invocations),
        None => bail!("payload holds no invocation with a name and parameters"),
    }
}

async fn replay(
    file: &Path,
    config: Option<&Path>,
    split: Split,
    delay_ms: u64,
    prompt: &str,
    json: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let source =
        ScriptedSource::from_text(&read(file)?, split).with_delay(Duration::from_millis(delay_ms));
    tracing::info!(fragments = source.len(), "replaying transcript");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut conversation = Conversation::new(Arc::new(ToolRegistry::with_builtins()), config);
    let outcome = conversation.run_turn(prompt, &source, cancel).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_history(conversation.messages());
        println!("-- {}", outcome.final_phase());
    }
    Ok(())
}

fn print_history(messages: &[Message]) {
    for message in messages {
        println!("[{}] {}", message.role, message.text);
    }
}
