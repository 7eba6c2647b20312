//! # Storage Module
//!
//! Persistence for the store ledger. The ledger itself is an in-memory state
//! machine; what survives a restart is:
//!
//! ```text
//! events    : the append-only audit log, one record per sequence number
//! metadata  : the latest snapshot of the full ledger state
//! ```
//!
//! Both are written in a single sled transaction per committed operation, so
//! a crash never leaves a snapshot that disagrees with the log.
//!
//! Bincode is used on disk. JSON is for APIs and debugging; bincode is for
//! storage.

pub mod db;

pub use db::{DbError, DbResult, LedgerDb};
