// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cosmo Store Node
//!
//! Entry point for the `cosmo-node` binary. Parses CLI arguments, initializes
//! logging and metrics, restores the ledger from disk, and serves the HTTP
//! API.
//!
//! The binary supports four subcommands:
//!
//! - `run`: open the ledger and serve the API
//! - `init`: write a store configuration into the data directory
//! - `replay`: apply a JSON script of operations in memory
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use cosmo_contracts::operation::parse_script;
use cosmo_contracts::{EventRecord, ProductStore, StoreConfig, StoreSnapshot};
use cosmo_protocol::storage::LedgerDb;
use cosmo_protocol::Principal;

use cli::{Commands, CosmoNodeCli};
use metrics::StoreMetrics;

/// File name of the store configuration inside the data directory.
const CONFIG_FILE: &str = "store.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CosmoNodeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format.into());

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Replay(args) => replay(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens the ledger and serves the API and metrics endpoints until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting cosmo-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Ledger ---
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join(CONFIG_FILE));
    let store = open_store(&db, &config_path)?;

    // --- Metrics ---
    let store_metrics = Arc::new(StoreMetrics::new().context("failed to register metrics")?);
    store_metrics.observe_store(&store);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            cosmo_protocol::config::PROTOCOL_VERSION,
        ),
        store: Arc::new(Mutex::new(store)),
        db: db.clone(),
        metrics: Arc::clone(&store_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&store_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    db.flush().context("failed to flush database")?;
    tracing::info!("cosmo-node stopped");
    Ok(())
}

/// Restores the store from the database, or deploys a new one from the
/// configuration file when the database is empty.
fn open_store(db: &LedgerDb, config_path: &Path) -> Result<ProductStore> {
    if let Some(snapshot) = db
        .load_snapshot::<StoreSnapshot>()
        .context("failed to read ledger snapshot")?
    {
        let records: Vec<EventRecord> = db
            .events_from(0, usize::MAX)
            .context("failed to read event log")?;
        let store = ProductStore::from_snapshot(snapshot, records)
            .context("persisted ledger is inconsistent")?;
        tracing::info!(
            events = store.events().len(),
            escrow = store.escrow_total(),
            supply = store.token_supply(),
            "ledger restored"
        );
        return Ok(store);
    }

    if !config_path.exists() {
        bail!(
            "no ledger and no configuration at {}; run `cosmo-node init` first",
            config_path.display()
        );
    }
    let config = load_config(config_path)?;
    let store = ProductStore::new(config).context("invalid store configuration")?;
    api::persist(db, &store).context("failed to persist genesis")?;
    tracing::info!(owner = %store.config().owner, "new ledger deployed");
    Ok(store)
}

fn load_config(path: &Path) -> Result<StoreConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    StoreConfig::from_json_str(&raw)
        .with_context(|| format!("invalid config {}", path.display()))
}

/// Writes a store configuration into a (possibly new) data directory.
fn init_node(args: cli::InitArgs) -> Result<()> {
    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), legacy = args.legacy, "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(CONFIG_FILE);
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }

    let owner = Principal::new(args.owner.as_str()).context("invalid owner principal")?;
    let config = if args.legacy {
        StoreConfig::legacy_trace(owner)
    } else {
        StoreConfig::new(owner)
    };
    let json = config.to_json_pretty()?;
    std::fs::write(&config_path, json)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Owner          : {}", config.owner);
    println!("  Reward rate    : {}", config.reward_rate);

    Ok(())
}

/// Applies a script to a fresh in-memory store, printing one JSON line per
/// operation to stdout.
fn replay(args: cli::ReplayArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => StoreConfig::new(Principal::new("deployer")?),
    };
    let raw = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {}", args.script.display()))?;
    let ops = parse_script(&raw)
        .with_context(|| format!("invalid script {}", args.script.display()))?;

    let mut store = ProductStore::new(config).context("invalid store configuration")?;
    let mut failures = 0usize;

    for (index, op) in ops.iter().enumerate() {
        let line = match store.execute(op) {
            Ok(receipt) => serde_json::json!({
                "index": index,
                "op": op.name(),
                "ok": receipt,
            }),
            Err(e) => {
                failures += 1;
                if args.fail_fast {
                    bail!("operation {index} ({}) failed: {e}", op.name());
                }
                serde_json::json!({
                    "index": index,
                    "op": op.name(),
                    "err": { "error": e.kind(), "code": e.code(), "message": e.to_string() },
                })
            }
        };
        println!("{line}");
    }

    store
        .check_invariants()
        .context("ledger invariants violated after replay")?;
    let writes = ops.iter().filter(|op| !op.is_read_only()).count();
    tracing::info!(
        operations = ops.len(),
        writes,
        failures,
        events = store.events().len(),
        escrow = store.escrow_total(),
        supply = store.token_supply(),
        "replay finished"
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("cosmo-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", cosmo_protocol::config::PROTOCOL_VERSION);
    println!(
        "snapshot   v{}",
        cosmo_protocol::config::SNAPSHOT_FORMAT_VERSION
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the node keeps running until the other signal arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn open_store_deploys_then_restores() {
        let dir = tempfile::tempdir().unwrap();
        let config_path: PathBuf = dir.path().join(CONFIG_FILE);
        let owner = Principal::new("deployer").unwrap();
        let config = StoreConfig::new(owner.clone()).with_genesis_wallet(owner.clone(), 1_000);
        std::fs::write(&config_path, config.to_json_pretty().unwrap()).unwrap();

        let db_path = dir.path().join("db");
        {
            let db = LedgerDb::open(&db_path).unwrap();
            let mut store = open_store(&db, &config_path).unwrap();
            store.add_product(&owner, "Candy", 10, 50).unwrap();
            api::persist(&db, &store).unwrap();
            store.buy_product(&owner, "Candy", 4).unwrap();
            api::persist(&db, &store).unwrap();
        }

        // The config is only consulted when the database is empty.
        std::fs::remove_file(&config_path).unwrap();
        let db = LedgerDb::open(&db_path).unwrap();
        let store = open_store(&db, &config_path).unwrap();
        assert_eq!(store.escrow_total(), 200);
        assert_eq!(store.get_product("Candy").unwrap().stock, 6);
        assert_eq!(store.wallet_balance(&owner), 800);
        assert!(store.events().verify().is_ok());
    }

    #[test]
    fn restart_succeeds_after_a_skipped_persist() {
        let dir = tempfile::tempdir().unwrap();
        let config_path: PathBuf = dir.path().join(CONFIG_FILE);
        let owner = Principal::new("deployer").unwrap();
        let config = StoreConfig::new(owner.clone()).with_genesis_wallet(owner.clone(), 1_000);
        std::fs::write(&config_path, config.to_json_pretty().unwrap()).unwrap();

        let db_path = dir.path().join("db");
        let expected = {
            let db = LedgerDb::open(&db_path).unwrap();
            let mut store = open_store(&db, &config_path).unwrap();
            // This commit never reaches the database on its own.
            store.add_product(&owner, "Candy", 10, 50).unwrap();
            store.buy_product(&owner, "Candy", 2).unwrap();
            api::persist(&db, &store).unwrap();
            db.flush().unwrap();
            store.state().clone()
        };

        let db = LedgerDb::open(&db_path).unwrap();
        let store = open_store(&db, &config_path).unwrap();
        assert_eq!(store.state(), &expected);
        assert_eq!(store.escrow_total(), 100);
        assert!(store.events().verify().is_ok());
    }

    #[test]
    fn open_store_without_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open_temporary().unwrap();
        assert!(open_store(&db, &dir.path().join(CONFIG_FILE)).is_err());
    }
}
