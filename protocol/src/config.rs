//! # Protocol Configuration & Constants
//!
//! Every magic number in Titan Pay lives here. If you find yourself typing
//! `10_000` anywhere else, import [`FEE_DENOMINATOR`] instead.
//!
//! Changing the fee constants after a deployment has gone live changes what
//! every outstanding quote means, so treat this file as append-only once a
//! network is running.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version string reported by the node's `/status` endpoint.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Fee ratios are expressed in parts per ten thousand. `10_000` is 100%.
pub const FEE_DENOMINATOR: u64 = 10_000;

/// Highest fee ratio a ledger will accept. A 100% fee is allowed: the whole
/// amount goes to the fee receiver and the recipient gets nothing.
pub const MAX_FEE_RATIO_BPS: u64 = FEE_DENOMINATOR;

/// Fee ratio a fresh ledger starts with: 30 / 10_000 = 0.3%.
pub const DEFAULT_FEE_RATIO_BPS: u64 = 30;

// ---------------------------------------------------------------------------
// Token Parameters
// ---------------------------------------------------------------------------

/// Display name of the reference value medium.
pub const DEFAULT_TOKEN_NAME: &str = "Titan";

/// Ticker of the reference value medium.
pub const DEFAULT_TOKEN_SYMBOL: &str = "tt";

/// Decimal places of the reference value medium. Purely presentational:
/// every amount in the protocol is an integer count of the smallest unit.
pub const TOKEN_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Account identities are 20 bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// BLAKE3 derive-key context for key-derived addresses.
pub const ADDRESS_DOMAIN: &str = "titan-pay 2026 account address v1";

/// BLAKE3 derive-key context for contract addresses assigned at deployment.
pub const CONTRACT_ADDRESS_DOMAIN: &str = "titan-pay 2026 contract address v1";

/// BLAKE3 derive-key context for the digest a caller signs.
pub const CALL_DOMAIN: &str = "titan-pay 2026 signed call v1";

// ---------------------------------------------------------------------------
// Network Parameters
// ---------------------------------------------------------------------------

/// Default JSON-RPC / WebSocket port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Largest JSON-RPC request body the node will read, in bytes.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;
