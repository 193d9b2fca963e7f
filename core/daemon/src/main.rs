//! RDP audit daemon entrypoint.
//!
//! Samples the TCP connection table once per tick, debounces the RDP port's
//! activity into sessions, and writes one record per session to SQLite.
//! Runs in the foreground until Ctrl-C, SIGINT or SIGTERM.

use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info, warn};

use rdp_audit_core::{
    load_config, AuditConfig, CommandConnectionProvider, SqliteSessionStore, Ticker,
};

mod logging;
mod signals;

#[derive(Parser)]
#[command(name = "rdp-audit-daemon")]
#[command(about = "Records RDP sessions on this host")]
#[command(version)]
struct Args {
    /// Config file (defaults to ~/.rdp-audit/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Session database, overriding the config file
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_result = load_config(args.config.clone());
    let mut config = match &config_result {
        Ok(config) => config.clone(),
        Err(_) => AuditConfig::default(),
    };
    if let Some(db) = args.db {
        config.store.db_path = Some(db);
    }

    let _logging_guard = logging::init(&config.logging);
    if let Err(err) = config_result {
        error!(error = %err, "Failed to load config");
        return ExitCode::FAILURE;
    }

    let db_path = match config.db_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve session database path");
            return ExitCode::FAILURE;
        }
    };

    let store = match SqliteSessionStore::open(db_path.clone()) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, path = %db_path.display(), "Failed to open session database");
            return ExitCode::FAILURE;
        }
    };

    let provider = CommandConnectionProvider::from_settings(&config.provider);
    info!(
        db = %db_path.display(),
        provider = %provider.command_line(),
        port = config.monitor.rdp_port,
        tick_interval_ms = config.monitor.tick_interval_ms,
        miss_threshold = config.monitor.miss_threshold,
        "RDP audit started"
    );

    let mut ticker = Ticker::new(provider, store, &config.monitor);

    if args.once {
        let report = ticker.tick(Utc::now());
        info!(
            active = report.sample_active,
            phase = report.phase.as_str(),
            outcome = ?report.outcome,
            "Single tick complete"
        );
    } else {
        let shutdown = match signals::install() {
            Ok(flag) => flag,
            Err(err) => {
                warn!(error = %err, "Failed to install shutdown handler; stop the process to exit");
                Arc::new(AtomicBool::new(false))
            }
        };
        let ticks = ticker.run(config.tick_interval(), &shutdown);
        info!(ticks, "Shutdown requested");
    }

    info!("RDP audit stopped");
    ExitCode::SUCCESS
}
