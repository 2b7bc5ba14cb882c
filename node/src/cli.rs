//! # CLI Interface
//!
//! Command-line arguments for `titan-node`, defined with `clap` derive.
//! Subcommands: `init`, `run` and `version`. Every flag can also be set
//! through a `TITAN_*` environment variable.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use titan_contracts::PaymentPolicy;
use titan_protocol::config::{
    DEFAULT_FEE_RATIO_BPS, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT, DEFAULT_TOKEN_NAME,
    DEFAULT_TOKEN_SYMBOL,
};
use titan_protocol::Address;

/// Titan Pay node.
///
/// Hosts one Titan Pay deployment (Approval, PayCore and the Titan token),
/// serves the JSON-RPC and WebSocket APIs, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "titan-node",
    about = "Titan Pay deployment host",
    version,
    propagate_version = true
)]
pub struct TitanNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a data directory: owner key plus deployment manifest.
    Init(InitArgs),
    /// Serve an initialized deployment.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Data directory to initialize. Created if missing.
    #[arg(long, short = 'd', env = "TITAN_DATA_DIR", default_value = ".titan")]
    pub data_dir: PathBuf,

    /// Token name.
    #[arg(long, default_value = DEFAULT_TOKEN_NAME)]
    pub name: String,

    /// Token symbol.
    #[arg(long, default_value = DEFAULT_TOKEN_SYMBOL)]
    pub symbol: String,

    /// Initial fee ratio in basis points (1/10000).
    #[arg(long, env = "TITAN_FEE_RATIO", default_value_t = DEFAULT_FEE_RATIO_BPS)]
    pub fee_ratio: u64,

    /// Initial fee receiver. Defaults to the owner.
    #[arg(long)]
    pub fee_receiver: Option<Address>,

    /// Who may call payTitan: `open` or `owner-only`.
    #[arg(long, env = "TITAN_PAYMENT_POLICY", default_value = "open")]
    pub policy: PaymentPolicy,

    /// Overwrite an existing manifest and key.
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Data directory created by `init`.
    #[arg(long, short = 'd', env = "TITAN_DATA_DIR", default_value = ".titan")]
    pub data_dir: PathBuf,

    /// Port for the JSON-RPC / WebSocket API.
    #[arg(long, env = "TITAN_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TITAN_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "TITAN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(
        long,
        env = "TITAN_LOG",
        default_value = "titan_node=info,titan_contracts=info,titan_protocol=info,tower_http=debug"
    )]
    pub log_level: String,
}
