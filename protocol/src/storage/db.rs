//! # LedgerDb: Persistent Storage Engine
//!
//! Built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                  | Value                              |
//! |------------|----------------------|------------------------------------|
//! | `events`   | `seq` (8B BE)        | `bincode(record)`                  |
//! | `metadata` | `"snapshot"`         | `bincode((format_version, state))` |
//!
//! Sequence numbers are stored big-endian so that sled's lexicographic
//! ordering matches numeric ordering and range scans from a sequence number
//! work naturally.
//!
//! The store is generic over the record and snapshot types: it only needs
//! them to round-trip through serde.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::path::Path;

use crate::config::SNAPSHOT_FORMAT_VERSION;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("snapshot format version {found} is not supported (expected {expected})")]
    SnapshotVersion { found: u16, expected: u16 },

    #[error("storage transaction aborted")]
    Aborted,
}

pub type DbResult<T> = Result<T, DbError>;

/// Well-known key in the `metadata` tree for the latest state snapshot.
const META_SNAPSHOT: &[u8] = b"snapshot";

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent storage for the event log and ledger snapshots.
///
/// Cheap to clone; sled handles are reference counted and safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    /// Event records indexed by sequence number (big-endian u64 keys).
    events: Tree,
    /// Snapshot and other singleton values.
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let events = db.open_tree("events")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            events,
            metadata,
        })
    }

    // -- Writes -------------------------------------------------------------

    /// Appends `records` to the event log and replaces the snapshot in one
    /// transaction, then flushes.
    ///
    /// `records` pairs each record with its sequence number. Existing keys are
    /// overwritten, so replaying the same commit is harmless.
    pub fn commit<R, S>(&self, records: &[(u64, R)], snapshot: &S) -> DbResult<()>
    where
        R: Serialize,
        S: Serialize,
    {
        let mut encoded = Vec::with_capacity(records.len());
        for (seq, record) in records {
            encoded.push((seq.to_be_bytes(), encode(record)?));
        }
        let snapshot_bytes = encode(&(SNAPSHOT_FORMAT_VERSION, snapshot))?;

        (&self.events, &self.metadata)
            .transaction(|(events, metadata)| {
                for (key, bytes) in &encoded {
                    events.insert(&key[..], bytes.as_slice())?;
                }
                metadata.insert(META_SNAPSHOT, snapshot_bytes.as_slice())?;
                Ok(())
            })
            .map_err(|e: TransactionError<()>| match e {
                TransactionError::Abort(()) => DbError::Aborted,
                TransactionError::Storage(e) => DbError::Sled(e),
            })?;

        self.db.flush()?;
        tracing::debug!(records = records.len(), "ledger commit persisted");
        Ok(())
    }

    // -- Reads --------------------------------------------------------------

    /// Loads the latest snapshot, if one was ever written.
    pub fn load_snapshot<S: DeserializeOwned>(&self) -> DbResult<Option<S>> {
        let Some(bytes) = self.metadata.get(META_SNAPSHOT)? else {
            return Ok(None);
        };
        let (version, snapshot): (u16, S) = decode(&bytes)?;
        if version != SNAPSHOT_FORMAT_VERSION {
            return Err(DbError::SnapshotVersion {
                found: version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }

    /// Returns up to `limit` records with sequence number `>= from`, in order.
    pub fn events_from<R: DeserializeOwned>(&self, from: u64, limit: usize) -> DbResult<Vec<R>> {
        let mut out = Vec::new();
        for entry in self.events.range(from.to_be_bytes()..).take(limit) {
            let (_, bytes) = entry?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Sequence number of the last persisted record, if any.
    pub fn last_sequence(&self) -> DbResult<Option<u64>> {
        match self.events.last()? {
            Some((key, _)) => {
                let raw: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| DbError::Serialization("event key is not 8 bytes".into()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Number of persisted event records.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Flushes all dirty buffers to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}
