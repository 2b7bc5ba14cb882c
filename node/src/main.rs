// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Titan Pay Node
//!
//! Entry point for the `titan-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the hosted deployment and
//! serves the JSON-RPC/WebSocket API.
//!
//! - `init`    create a data directory with an owner key and manifest
//! - `run`     serve the deployment described by a data directory
//! - `version` print build version information

mod api;
mod cli;
mod host;
mod logging;
mod metrics;
mod store;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use titan_contracts::{Deployment, DeploymentManifest, PayCoreConfig};
use titan_protocol::crypto::TitanKeypair;

use cli::{Commands, TitanNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

const MANIFEST_FILE: &str = "deployment.json";
const OWNER_KEY_FILE: &str = "owner.key";
const DB_DIR: &str = "db";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TitanNodeCli::parse();

    match cli.command {
        Commands::Init(args) => init_node(args),
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Serves the API and metrics until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, LogFormat::from_str_lossy(&args.log_format));

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting titan-node"
    );

    let manifest = read_manifest(&args.data_dir)?;

    // --- Persistent storage ---
    let db_path = args.data_dir.join(DB_DIR);
    let store = store::StateStore::open(&db_path)
        .with_context(|| format!("failed to open state store at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "state store opened");

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Host ---
    let host = host::Host::open(&manifest, store, Arc::clone(&node_metrics))
        .context("failed to load deployment")?;
    let summary = host.summary();
    tracing::info!(
        owner = %summary.owner,
        approval = %summary.addresses.approval,
        pay_core = %summary.addresses.pay_core,
        titan = %summary.addresses.titan,
        "deployment ready"
    );

    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            titan_protocol::config::PROTOCOL_VERSION,
        ),
        started_at: chrono::Utc::now(),
        host: Arc::new(host),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
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
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("titan-node stopped");
    Ok(())
}

/// Generates the owner key and writes the deployment manifest.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("titan_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    let manifest_path = data_dir.join(MANIFEST_FILE);
    if manifest_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            manifest_path.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let keypair = TitanKeypair::generate();
    let owner = keypair.address();

    let mut manifest = DeploymentManifest::new(owner);
    manifest.token_name = args.name;
    manifest.token_symbol = args.symbol;
    manifest.pay_core = PayCoreConfig {
        fee_ratio: args.fee_ratio,
        fee_receiver: args.fee_receiver,
        payment_policy: args.policy,
    };
    // Reject bad parameters before anything is written.
    let deployment = Deployment::from_manifest(&manifest).context("invalid deployment parameters")?;

    let key_path = data_dir.join(OWNER_KEY_FILE);
    write_owner_key(&key_path, &hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write owner key to {}", key_path.display()))?;

    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(&manifest_path, json)
        .with_context(|| format!("failed to write manifest to {}", manifest_path.display()))?;

    let addresses = deployment.addresses();
    tracing::info!(%owner, key_path = %key_path.display(), "deployment initialized");

    println!("Deployment initialized.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Owner          : {}", owner);
    println!("  Owner key      : {}", key_path.display());
    println!("  Approval       : {}", addresses.approval);
    println!("  PayCore        : {}", addresses.pay_core);
    println!("  Titan          : {}", addresses.titan);
    println!("  Fee ratio      : {} bps", args.fee_ratio);

    Ok(())
}

/// Writes the secret key to a fresh file that is owner-only (0600 on Unix)
/// from the moment it exists. A previous key file is removed first.
fn write_owner_key(path: &Path, contents: &str) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

fn read_manifest(data_dir: &Path) -> Result<DeploymentManifest> {
    let path = data_dir.join(MANIFEST_FILE);
    let text = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "failed to read {}; run `titan-node init` first",
            path.display()
        )
    })?;
    serde_json::from_str(&text).with_context(|| format!("malformed manifest {}", path.display()))
}

fn print_version() {
    println!("titan-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", titan_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
