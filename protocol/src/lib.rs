// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cosmo Protocol: Shared Primitives
//!
//! The pieces every other crate in the workspace agrees on:
//!
//! - **config**: protocol constants shared by the ledger and the node.
//! - **identity**: [`Principal`](identity::Principal), the identity of
//!   wallets and contracts.
//! - **storage**: sled-backed persistence for the audit log and ledger
//!   snapshots.
//!
//! The accounting rules themselves live in `cosmo-contracts`.

pub mod config;
pub mod identity;
pub mod storage;

pub use identity::{IdentityError, Principal};
