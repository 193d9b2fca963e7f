//! rdp-audit: read-only reporting over the RDP session database.
//!
//! ## Subcommands
//!
//! - `list`: session records, newest first
//! - `show`: a single record by id

mod report;

use chrono::Utc;
use clap::{Parser, Subcommand};
use rdp_audit_core::{
    load_config, ConfigError, SessionFilter, SessionId, SqliteSessionStore, StoreError,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rdp-audit")]
#[command(about = "Inspect recorded RDP sessions")]
#[command(version)]
struct Cli {
    /// Config file used to locate the database (defaults to ~/.rdp-audit/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Session database, overriding the config file
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List session records, newest first
    List {
        /// Only sessions without an end time
        #[arg(long)]
        open: bool,

        /// Maximum number of records
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one session record
    Show {
        /// Session id
        #[arg(value_name = "ID")]
        id: i64,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Session {0} not found")]
    NotFound(SessionId),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "rdp-audit failed");
            eprintln!("rdp-audit: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let db_path = match cli.db {
        Some(path) => path,
        None => load_config(cli.config)?.db_path()?,
    };
    let store = SqliteSessionStore::open_read_only(db_path)?;
    let now = Utc::now();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::List { open, limit, json } => {
            let filter = SessionFilter {
                open_only: open,
                limit,
            };
            let records = store.list_sessions(&filter)?;
            if json {
                let rows: Vec<_> = records
                    .iter()
                    .map(|record| report::SessionRow::new(record, now))
                    .collect();
                serde_json::to_writer_pretty(&mut out, &rows)?;
                writeln!(out)?;
            } else {
                write!(out, "{}", report::render_table(&records, now))?;
            }
        }
        Commands::Show { id, json } => {
            let id = SessionId(id);
            let record = store.get_session(id)?.ok_or(CliError::NotFound(id))?;
            if json {
                serde_json::to_writer_pretty(&mut out, &report::SessionRow::new(&record, now))?;
                writeln!(out)?;
            } else {
                write!(out, "{}", report::render_detail(&record, now))?;
            }
        }
    }
    Ok(())
}
