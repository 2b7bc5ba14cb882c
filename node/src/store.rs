//! # State Store
//!
//! Durable state for one hosted deployment, built on sled.
//!
//! ## Layout
//!
//! Everything lives in a single `state` tree so that one `Batch` covers a
//! whole commit:
//!
//! | Key                    | Value                                   |
//! |------------------------|-----------------------------------------|
//! | `snapshot`             | JSON of the [`Deployment`]              |
//! | `snapshot_checksum`    | SHA-256 of the `snapshot` bytes (32B)   |
//! | `nonce/` + address     | last accepted nonce, u64 big-endian     |
//!
//! ## Atomicity
//!
//! [`StateStore::commit`] writes the new snapshot, its checksum and the
//! caller's nonce in one batch and flushes before returning. A crash leaves
//! either the previous commit or the new one, never a mix.
//!
//! A failed flush is reported as [`StoreError::Flush`]. The batch is already
//! applied at that point: reads see it and it may still reach disk, so the
//! caller must treat the commit as done but not durable.

use sled::{Batch, Db, Tree};
use std::collections::BTreeMap;
use std::path::Path;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::Arc;

use titan_contracts::Deployment;
use titan_protocol::config::ADDRESS_LENGTH;
use titan_protocol::crypto::sha256;
use titan_protocol::Address;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// The batch was applied but could not be flushed to disk.
    #[error("commit applied but flush failed: {0}")]
    Flush(sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The stored snapshot does not match its checksum.
    #[error("snapshot is corrupt: checksum mismatch (stored {stored}, computed {computed})")]
    Corrupt { stored: String, computed: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const KEY_SNAPSHOT: &[u8] = b"snapshot";
const KEY_CHECKSUM: &[u8] = b"snapshot_checksum";
const NONCE_PREFIX: &[u8] = b"nonce/";

fn nonce_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(NONCE_PREFIX.len() + ADDRESS_LENGTH);
    key.extend_from_slice(NONCE_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Snapshot and nonce persistence for the host.
///
/// Cloning is cheap; clones share the same sled database.
#[derive(Debug, Clone)]
pub struct StateStore {
    db: Db,
    state: Tree,
    #[cfg(test)]
    fail_flush: Arc<AtomicBool>,
}

impl StateStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that is deleted when dropped. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let state = db.open_tree("state")?;
        Ok(Self {
            db,
            state,
            #[cfg(test)]
            fail_flush: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The last committed deployment, if any.
    pub fn load_deployment(&self) -> StoreResult<Option<Deployment>> {
        let Some(bytes) = self.state.get(KEY_SNAPSHOT)? else {
            return Ok(None);
        };

        let computed = sha256(&bytes);
        let stored = self.state.get(KEY_CHECKSUM)?.map(|v| v.to_vec());
        if stored.as_deref() != Some(&computed[..]) {
            return Err(StoreError::Corrupt {
                stored: stored.map(hex::encode).unwrap_or_else(|| "none".into()),
                computed: hex::encode(computed),
            });
        }

        let deployment = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(deployment))
    }

    /// Every caller's last accepted nonce.
    pub fn load_nonces(&self) -> StoreResult<BTreeMap<Address, u64>> {
        let mut nonces = BTreeMap::new();
        for entry in self.state.scan_prefix(NONCE_PREFIX) {
            let (key, value) = entry?;
            let address = <[u8; ADDRESS_LENGTH]>::try_from(&key[NONCE_PREFIX.len()..])
                .map_err(|_| StoreError::Serialization("malformed nonce key".into()))?;
            let nonce = <[u8; 8]>::try_from(value.as_ref())
                .map_err(|_| StoreError::Serialization("malformed nonce value".into()))?;
            nonces.insert(Address::new(address), u64::from_be_bytes(nonce));
        }
        Ok(nonces)
    }

    /// Writes a deployment snapshot without touching any nonce. Used when a
    /// fresh deployment is created.
    pub fn save_deployment(&self, deployment: &Deployment) -> StoreResult<()> {
        let mut batch = Batch::default();
        Self::stage_snapshot(&mut batch, deployment)?;
        self.apply(batch)
    }

    /// Atomically records a successful call: the resulting deployment and
    /// the caller's new nonce.
    pub fn commit(&self, deployment: &Deployment, caller: &Address, nonce: u64) -> StoreResult<()> {
        let mut batch = Batch::default();
        Self::stage_snapshot(&mut batch, deployment)?;
        batch.insert(nonce_key(caller), nonce.to_be_bytes().to_vec());
        self.apply(batch)
    }

    /// Bytes currently on disk for the snapshot. Diagnostic only.
    pub fn snapshot_size(&self) -> StoreResult<usize> {
        Ok(self.state.get(KEY_SNAPSHOT)?.map(|v| v.len()).unwrap_or(0))
    }

    fn stage_snapshot(batch: &mut Batch, deployment: &Deployment) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(deployment).map_err(|e| StoreError::Serialization(e.to_string()))?;
        batch.insert(KEY_CHECKSUM, sha256(&bytes).to_vec());
        batch.insert(KEY_SNAPSHOT, bytes);
        Ok(())
    }

    fn apply(&self, batch: Batch) -> StoreResult<()> {
        self.state.apply_batch(batch)?;
        self.flush()
    }

    #[cfg(not(test))]
    fn flush(&self) -> StoreResult<()> {
        self.db.flush().map_err(StoreError::Flush)?;
        Ok(())
    }

    #[cfg(test)]
    fn flush(&self) -> StoreResult<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            let io = std::io::Error::new(std::io::ErrorKind::Other, "flush disabled");
            return Err(StoreError::Flush(sled::Error::Io(io)));
        }
        self.db.flush().map_err(StoreError::Flush)?;
        Ok(())
    }

    /// Makes every later flush on this store and its clones fail.
    #[cfg(test)]
    pub fn fail_flushes(&self) {
        self.fail_flush.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn corrupt_snapshot(&self) {
        self.state.insert(KEY_SNAPSHOT, b"{}".as_slice()).unwrap();
    }
}
