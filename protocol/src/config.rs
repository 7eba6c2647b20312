//! # Protocol Configuration & Constants
//!
//! Every magic number in the Cosmo store lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong.
//!
//! Per-deployment knobs (owner, reward rate override, pricing policy) live in
//! `cosmo_contracts::config::StoreConfig`. This module only holds the values
//! that every deployment agrees on.

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// The ledger format version. Bump when the persisted snapshot layout changes.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version tag written next to every persisted snapshot. Snapshots with a
/// different tag are refused on load rather than misinterpreted.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Economics
// ---------------------------------------------------------------------------

/// Reward tokens minted per unit of settlement currency received.
///
/// Burning `REWARD_RATE` tokens releases exactly one currency unit from the
/// escrow, which is what keeps supply and escrow in lockstep.
pub const REWARD_RATE: u64 = 100;

/// Reward rate observed in the legacy product-store deployment
/// (10 currency units minted 10 000 tokens).
pub const LEGACY_REWARD_RATE: u64 = 1_000;

// ---------------------------------------------------------------------------
// Result Codes
// ---------------------------------------------------------------------------

/// Success code returned by every state-changing operation, `(ok u200)`.
pub const STATUS_OK: u64 = 200;

/// Caller is not allowed to perform the operation.
pub const ERR_UNAUTHORIZED: u64 = 401;

/// Referenced product does not exist.
pub const ERR_NOT_FOUND: u64 = 404;

/// Malformed or out-of-range argument.
pub const ERR_INVALID_ARGUMENT: u64 = 400;

/// Purchase quantity exceeds available stock.
pub const ERR_INSUFFICIENT_STOCK: u64 = 409;

/// Buyer's settlement wallet cannot cover the purchase.
pub const ERR_INSUFFICIENT_FUNDS: u64 = 402;

/// Holder does not have enough reward tokens.
pub const ERR_INSUFFICIENT_BALANCE: u64 = 410;

/// Escrow does not hold enough currency to pay out.
pub const ERR_INSUFFICIENT_ESCROW: u64 = 422;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Maximum length of a product key (`string-ascii 32` on the legacy contract).
pub const MAX_PRODUCT_KEY_LEN: usize = 32;

/// Maximum length of a principal, contract principals included.
pub const MAX_PRINCIPAL_LEN: usize = 128;

/// Contract name under which the store is deployed.
pub const DEFAULT_STORE_CONTRACT: &str = "product-store";

/// Contract name under which the reward token is deployed.
pub const DEFAULT_TOKEN_CONTRACT: &str = "cosmo-ft";

/// Fungible token name inside the token contract.
pub const DEFAULT_TOKEN_NAME: &str = "cosmo-ft";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default port for the HTTP API.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Upper bound on events returned by a single `/events` page.
pub const MAX_EVENTS_PER_PAGE: usize = 1_000;
