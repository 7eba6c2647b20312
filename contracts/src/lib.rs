//! # Cosmo Store Contracts
//!
//! Ledger logic for the Cosmo product store. Three component contracts are
//! composed by one orchestrator:
//!
//! - **Product Catalog**: owner-curated listing of products with stock and
//!   unit price.
//! - **Reward Token**: fungible loyalty token with an owner and an allowlist
//!   of contracts permitted to mint.
//! - **Settlement Escrow**: currency paid for purchases, held as backing for
//!   outstanding reward tokens.
//! - **Product Store**: the public entry point. Buying mints rewards,
//!   redeeming burns them and pays currency back.
//!
//! ## Design Principles
//!
//! 1. All amount arithmetic is checked. An overflow aborts the operation.
//! 2. Operations are all-or-nothing: an error leaves state and event log
//!    exactly as they were.
//! 3. Reward supply is always backed: `supply == escrow * reward_rate`.
//! 4. Every public type is serializable (serde) for snapshots and the HTTP
//!    surface.

pub mod config;
pub mod error;
pub mod events;
pub mod operation;
pub mod product_catalog;
pub mod product_store;
pub mod reward_token;
pub mod settlement_escrow;

pub use config::{ConfigError, PricingPolicy, RestockPolicy, StoreConfig};
pub use error::{ErrorKind, StoreError};
pub use events::{EventLog, EventRecord, LedgerEvent, LogIntegrityError};
pub use operation::Operation;
pub use product_catalog::{parse_uint, Product, ProductKey};
pub use product_store::{
    InvariantViolation, LedgerState, ProductStore, Receipt, RestoreError, StoreSnapshot,
};
