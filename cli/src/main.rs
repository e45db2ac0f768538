use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use seqlog_kernel::config::LogConfig;
use seqlog_kernel::invariants::InvariantEngine;
use seqlog_kernel::log::{Record, SequencedLog, Timestamp};
use seqlog_kernel::notify::{ErrorNotifier, TracingNotifier};
use seqlog_kernel::replay::{replay_log, ReplaySummary};

/// Sequenced append-only event log
#[derive(Parser, Debug)]
#[command(name = "seqlog")]
#[command(about = "Append timestamped, classified records to a sequenced CSV log", long_about = None)]
struct Cli {
    /// Path to log config JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the log (overrides config)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Log file name (overrides config)
    #[arg(long, global = true)]
    file: Option<String>,

    /// Diagnostic level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append one record and print it
    Append {
        #[arg(long)]
        classification: String,

        #[arg(long)]
        location: String,

        #[arg(long)]
        content: String,

        /// Defaults to a fresh random UUID
        #[arg(long)]
        uuid: Option<String>,

        /// RFC 3339; defaults to now
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Check that sequence ids run 1..N without gaps
    ///
    /// Every row must parse, including an RFC 3339 timestamp. Rows written
    /// by other tools with free-form timestamps (e.g. `2024-03-01 10:00:00`)
    /// are reported as corrupt even though `append` still accepts the file.
    Verify,

    /// Print the last sequence id (0 for an empty log)
    Last,
}

#[derive(Debug, Serialize)]
struct VerifyOutput {
    path: String,
    #[serde(flatten)]
    summary: ReplaySummary,
}

fn resolve_config(cli: &Cli) -> Result<LogConfig> {
    let mut config = match &cli.config {
        Some(path) => LogConfig::load(path)?,
        None => LogConfig::default_config(),
    };
    if let Some(dir) = &cli.dir {
        config.directory = dir.clone();
    }
    if let Some(file) = &cli.file {
        config.filename = file.clone();
    }
    Ok(config)
}

fn append(
    log: &SequencedLog,
    classification: String,
    location: String,
    content: String,
    uuid: Option<String>,
    timestamp: Option<String>,
) -> Result<Record> {
    let timestamp = match timestamp {
        Some(raw) => Timestamp::parse(&raw)?,
        None => Timestamp::now(),
    };
    let uuid = uuid.unwrap_or_else(|| Uuid::new_v4().to_string());

    log.append(classification, location, content, uuid, timestamp)
        .with_context(|| format!("append to {}", log.path().display()))
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let log = config.open_log()?;

    match cli.command {
        Command::Append {
            classification,
            location,
            content,
            uuid,
            timestamp,
        } => {
            let record = append(&log, classification, location, content, uuid, timestamp)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Verify => {
            let summary = replay_log(&log, &InvariantEngine::standard())?;
            let output = VerifyOutput {
                path: log.path().display().to_string(),
                summary,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Last => {
            println!("{}", log.last_sequence()?.unwrap_or(0));
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let title = match &cli.command {
        Command::Append { .. } => "Append failed",
        Command::Verify => "Verification failed",
        Command::Last => "Read failed",
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            TracingNotifier.notify(&*err, title);
            ExitCode::FAILURE
        }
    }
}
