//! Mockdock server binary.
//!
//! Usage:
//!   mockdock [--data-dir DIR] [--in-memory] [--combined] [--import FILE]

use anyhow::Context;
use clap::Parser;
use mockdock::backends::{InMemoryRuleStore, SqliteRuleStore};
use mockdock::config::{ServerConfig, SettingsStore};
use mockdock::export::{import, read_snapshot, JsonFileExport};
use mockdock::rules::{ExportingStore, RuleStore};
use mockdock::{server, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mockdock - HTTP mock server with persistent rules
#[derive(Parser, Debug)]
#[command(name = "mockdock")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the config, database and export files
    #[arg(long, env = "APP_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Config file (default: <data-dir>/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database (default: <data-dir>/mocks.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Snapshot export file (default: <data-dir>/mocks.json)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Keep rules in memory instead of SQLite
    #[arg(long)]
    in_memory: bool,

    /// Load rules from a snapshot file at startup
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// Serve admin and mock routes from the admin listener only
    #[arg(long)]
    combined: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn open_store(args: &Args) -> anyhow::Result<Arc<dyn RuleStore>> {
    if args.in_memory {
        info!("Using in-memory rule store");
        return Ok(Arc::new(InMemoryRuleStore::new()));
    }
    let path = args
        .database
        .clone()
        .unwrap_or_else(|| args.data_dir.join("mocks.db"));
    let store = SqliteRuleStore::open(&path)
        .with_context(|| format!("Failed to open rule database {}", path.display()))?;
    info!("Using rule database {}", path.display());
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("Failed to create data dir {}", args.data_dir.display()))?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join("config.json"));
    let config = ServerConfig::load(&config_path);

    let export_path = args
        .export
        .clone()
        .unwrap_or_else(|| args.data_dir.join("mocks.json"));
    let (sink, writer) = JsonFileExport::spawn(export_path);
    let store: Arc<dyn RuleStore> =
        Arc::new(ExportingStore::new(open_store(&args)?, Arc::new(sink)));

    if let Some(path) = &args.import {
        let drafts = read_snapshot(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let total = drafts.len();
        let imported = tokio::task::spawn_blocking({
            let store = Arc::clone(&store);
            move || import(store.as_ref(), drafts)
        })
        .await?;
        info!("Imported {} of {} rules from {}", imported, total, path.display());
    }

    let state = AppState::new(store, SettingsStore::new(config_path, config.clone()));

    tokio::select! {
        result = server::run(&config, state, args.combined) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    // Let the last queued snapshot reach disk
    let _ = tokio::time::timeout(Duration::from_secs(2), writer).await;
    Ok(())
}
