//! # Event Log
//!
//! Every committed state change leaves one or more [`LedgerEvent`]s behind.
//! They are the externally observable trace of the ledger: auditors and test
//! suites assert on their exact field values, so amounts and principals are
//! recorded verbatim and never rounded or aggregated.
//!
//! The [`EventLog`] is append-only. Each [`EventRecord`] carries a sequence
//! number and a BLAKE3 digest chained to its predecessor:
//!
//! ```text
//! digest[n] = BLAKE3(digest[n-1] || seq_be || bincode(event))
//! ```
//!
//! Rewriting or dropping a record breaks every digest after it, which
//! [`EventLog::verify`] detects.

use cosmo_protocol::Principal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digest that precedes the first record.
pub const GENESIS_DIGEST: [u8; 32] = [0u8; 32];

/// A single observable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Reward tokens created for `recipient`.
    FtMint {
        asset: String,
        recipient: Principal,
        amount: u64,
    },
    /// Reward tokens destroyed from `sender`.
    FtBurn {
        asset: String,
        sender: Principal,
        amount: u64,
    },
    /// Reward tokens moved between holders.
    FtTransfer {
        asset: String,
        sender: Principal,
        recipient: Principal,
        amount: u64,
    },
    /// Settlement currency moved between a wallet and the store escrow.
    CurrencyTransfer {
        sender: Principal,
        recipient: Principal,
        amount: u64,
    },
    /// Settlement currency credited to a wallet from outside the ledger
    /// (genesis allocation or operator funding).
    CurrencyMint { recipient: Principal, amount: u64 },
    /// A product was listed or its listing updated.
    ProductListed {
        key: String,
        stock: u64,
        unit_price: u64,
    },
    /// A product listing was removed.
    ProductDelisted { key: String },
    /// A contract principal was allowed to mint reward tokens.
    ValidCallerAdded { contract: Principal },
    /// A contract principal lost its mint permission.
    ValidCallerRemoved { contract: Principal },
    /// Summary of a completed purchase.
    Purchase {
        buyer: Principal,
        key: String,
        quantity: u64,
        cost: u64,
        tokens_minted: u64,
    },
    /// Summary of a completed redemption.
    Redemption {
        holder: Principal,
        tokens_burned: u64,
        currency_paid: u64,
    },
}

impl LedgerEvent {
    /// Short, stable name used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::FtMint { .. } => "ft_mint",
            LedgerEvent::FtBurn { .. } => "ft_burn",
            LedgerEvent::FtTransfer { .. } => "ft_transfer",
            LedgerEvent::CurrencyTransfer { .. } => "currency_transfer",
            LedgerEvent::CurrencyMint { .. } => "currency_mint",
            LedgerEvent::ProductListed { .. } => "product_listed",
            LedgerEvent::ProductDelisted { .. } => "product_delisted",
            LedgerEvent::ValidCallerAdded { .. } => "valid_caller_added",
            LedgerEvent::ValidCallerRemoved { .. } => "valid_caller_removed",
            LedgerEvent::Purchase { .. } => "purchase",
            LedgerEvent::Redemption { .. } => "redemption",
        }
    }
}

/// An event as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0.
    pub seq: u64,
    pub event: LedgerEvent,
    /// Hex digest of the previous record (all zeros for the first).
    pub prev_digest: String,
    /// Hex digest of this record.
    pub digest: String,
}

/// Errors detected when checking log integrity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogIntegrityError {
    #[error("record {found} is out of sequence (expected {expected})")]
    OutOfSequence { expected: u64, found: u64 },

    #[error("record {seq} does not chain to its predecessor")]
    BrokenChain { seq: u64 },

    #[error("record {seq} digest mismatch")]
    DigestMismatch { seq: u64 },

    #[error("record {seq} has a malformed digest")]
    MalformedDigest { seq: u64 },
}

/// Append-only, hash-chained log of [`EventRecord`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from persisted records, verifying the chain.
    pub fn from_records(records: Vec<EventRecord>) -> Result<Self, LogIntegrityError> {
        let log = Self { records };
        log.verify()?;
        Ok(log)
    }

    /// Appends `events` in order and returns the new records.
    pub fn append_all(&mut self, events: Vec<LedgerEvent>) -> Vec<EventRecord> {
        let start = self.records.len();
        for event in events {
            let seq = self.records.len() as u64;
            let prev = self.head_digest();
            let digest = chain_digest(&prev, seq, &event);
            tracing::debug!(seq, kind = event.kind(), "event appended");
            self.records.push(EventRecord {
                seq,
                event,
                prev_digest: hex::encode(prev),
                digest: hex::encode(digest),
            });
        }
        self.records[start..].to_vec()
    }

    /// Digest of the last record, or [`GENESIS_DIGEST`] for an empty log.
    pub fn head_digest(&self) -> [u8; 32] {
        self.records
            .last()
            .and_then(|r| decode_digest(&r.digest))
            .unwrap_or(GENESIS_DIGEST)
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `seq >= from`.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Walks the whole log and recomputes every digest.
    pub fn verify(&self) -> Result<(), LogIntegrityError> {
        let mut prev = GENESIS_DIGEST;
        for (expected, record) in self.records.iter().enumerate() {
            let expected = expected as u64;
            if record.seq != expected {
                return Err(LogIntegrityError::OutOfSequence {
                    expected,
                    found: record.seq,
                });
            }
            let claimed_prev = decode_digest(&record.prev_digest)
                .ok_or(LogIntegrityError::MalformedDigest { seq: record.seq })?;
            if claimed_prev != prev {
                return Err(LogIntegrityError::BrokenChain { seq: record.seq });
            }
            let digest = chain_digest(&prev, record.seq, &record.event);
            if hex::encode(digest) != record.digest {
                return Err(LogIntegrityError::DigestMismatch { seq: record.seq });
            }
            prev = digest;
        }
        Ok(())
    }
}

fn chain_digest(prev: &[u8; 32], seq: u64, event: &LedgerEvent) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev);
    hasher.update(&seq.to_be_bytes());
    // Events are plain data; bincode cannot fail on them.
    let body = bincode::serialize(event).unwrap_or_default();
    hasher.update(&body);
    *hasher.finalize().as_bytes()
}

fn decode_digest(raw: &str) -> Option<[u8; 32]> {
    hex::decode(raw).ok()?.try_into().ok()
}
