//! huggingplace: command-line client for HuggingPlace
//!
//! Sends log entries and trace records to HuggingPlace and checks
//! connectivity. Settings come from `.huggingplace/config.toml`,
//! `HUGGINGPLACE_*` environment variables, and flags, in increasing order of
//! precedence.

mod config;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use huggingplace::{HuggingPlace, HuggingPlaceConfig, StepLog};
use huggingplace_trace::{Fields, ROOT_PARENT_SPAN_ID, SpanStatus, TraceRecord, generate_id};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::{FileConfig, Overrides};

/// Log LLM interactions and execution traces to HuggingPlace
#[derive(Parser)]
#[command(name = "huggingplace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file or .huggingplace directory (default: search for .huggingplace/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to daily-rotated files in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// API key (or use HUGGINGPLACE_API_KEY env var)
    #[arg(long, global = true, env = "HUGGINGPLACE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Organization ID (or use HUGGINGPLACE_ORG_ID env var)
    #[arg(long, global = true, env = "HUGGINGPLACE_ORG_ID")]
    org_id: Option<String>,

    /// Mode: prod or dev
    #[arg(long, global = true, env = "HUGGINGPLACE_MODE")]
    mode: Option<String>,

    /// API base URL
    #[arg(long, global = true, env = "HUGGINGPLACE_BASE_URL")]
    base_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true, env = "HUGGINGPLACE_TIMEOUT")]
    timeout: Option<u64>,

    /// Suppress informational output from the client
    #[arg(
        long,
        global = true,
        env = "HUGGINGPLACE_SILENT",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    silent: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log an interaction from a JSON object (use - to read stdin)
    Log {
        /// JSON payload, or - for stdin
        data: String,
    },

    /// Log a single processing step from a JSON object (use - to read stdin)
    Step {
        /// JSON payload, or - for stdin
        data: String,
    },

    /// Send one or more trace records (use - to read stdin)
    Trace {
        /// JSON object or array of objects, or - for stdin
        data: String,
    },

    /// Check that the API accepts requests with the current credentials
    Test,

    /// Print the effective configuration without the API key
    Config,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            org_id: self.org_id.clone(),
            base_url: self.base_url.clone(),
            mode: self.mode.clone(),
            timeout_ms: self.timeout,
            silent: self.silent,
        }
    }
}

/// Initialize logging to stderr.
fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// Initialize logging to rotating files in `log_dir` with daily rotation.
fn init_file_logging(log_dir: &Path, verbose: bool) {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        init_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "huggingplace.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the background writer.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(verbose))
        .init();
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Read the argument itself, or stdin when it is `-`.
fn read_input(data: &str) -> Result<Value> {
    let raw = if data == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        data.to_string()
    };
    serde_json::from_str(&raw).context("Input is not valid JSON")
}

/// A trace record as accepted on the command line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceInput {
    operation: String,
    #[serde(default)]
    trace_id: Option<String>,
    #[serde(default)]
    parent_span_id: Option<String>,
    #[serde(default)]
    status: SpanStatus,
    #[serde(default)]
    attributes: Fields,
    #[serde(default)]
    logs: Fields,
    #[serde(default)]
    metadata: Fields,
}

impl TraceInput {
    fn into_record(self) -> TraceRecord {
        let mut record = TraceRecord::new(
            self.trace_id.unwrap_or_else(generate_id),
            self.parent_span_id
                .unwrap_or_else(|| ROOT_PARENT_SPAN_ID.to_string()),
            self.operation,
        )
        .with_attributes(self.attributes)
        .with_logs(self.logs)
        .with_metadata(self.metadata);
        record.finish(self.status);
        record
    }
}

fn parse_trace_inputs(value: Value) -> Result<Vec<TraceRecord>> {
    let inputs: Vec<TraceInput> = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(inputs.into_iter().map(TraceInput::into_record).collect())
}

async fn run_trace(config: &HuggingPlaceConfig, value: Value) -> Result<()> {
    let records = parse_trace_inputs(value).context("Invalid trace record")?;
    let client = HuggingPlace::new(config.clone())?;
    let sender = client.trace_sender()?;

    for record in records {
        sender.submit(record)?;
    }
    let stats = sender.shutdown().await;
    info!(
        submitted = stats.submitted,
        delivered = stats.delivered,
        dropped = stats.dropped,
        attempts = stats.attempts,
        "Trace delivery finished"
    );

    if stats.dropped > 0 {
        anyhow::bail!("{} trace record(s) were dropped", stats.dropped);
    }
    println!("Delivered {} trace record(s)", stats.delivered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.log_dir {
        Some(ref dir) => init_file_logging(dir, cli.verbose),
        None => init_logging(cli.verbose),
    }

    let file_config = FileConfig::load(cli.config.as_deref())?;
    for error in file_config.validate() {
        tracing::warn!("Config: {}", error);
    }
    let config = file_config.resolve(&cli.overrides())?;

    match cli.command {
        Commands::Log { ref data } => {
            let client = HuggingPlace::new(config)?;
            let receipt = client.log_json(read_input(data)?).await?;
            println!("{}", receipt.message);
        }
        Commands::Step { ref data } => {
            let step: StepLog = serde_json::from_value(read_input(data)?)
                .context("Invalid step payload")?;
            let client = HuggingPlace::new(config)?;
            let receipt = client.log_step(step).await?;
            println!("{}", receipt.message);
        }
        Commands::Trace { ref data } => {
            run_trace(&config, read_input(data)?).await?;
        }
        Commands::Test => {
            let client = HuggingPlace::new(config)?;
            if client.test_connection().await {
                println!("Connection to HuggingPlace OK");
            } else {
                anyhow::bail!("Connection to HuggingPlace failed");
            }
        }
        Commands::Config => {
            let public = HuggingPlace::new(config)?.get_config();
            println!("{}", serde_json::to_string_pretty(&public)?);
        }
    }

    Ok(())
}
