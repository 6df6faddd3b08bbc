//! Persistent ledger of recoverable downloads.
//!
//! The ledger maps a session-scope identifier to the [`ArchivedRecord`]s of
//! that scope, keyed by task identifier. Each scope is stored as a single
//! JSON blob in a [`KeyValueStore`], under `trawl.ledger.<scope>`.
//!
//! Every [`Ledger::save`] and [`Ledger::delete`] is a full
//! read-modify-write cycle. Those cycles are serialized by a writer lock so
//! concurrent updates cannot lose each other; across processes the last
//! writer wins.
//!
//! Reads fail closed: a missing, unreadable or corrupt blob is treated as an
//! empty ledger and never reported to the caller.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use trawl::ledger::{ArchivedRecord, Ledger, MemoryStore};
//!
//! # fn main() -> trawl::Result<()> {
//! let ledger = Ledger::new(Arc::new(MemoryStore::new()));
//! ledger.save("default", &ArchivedRecord::new("7", "default", Some("a.zip".into()), None))?;
//! assert!(ledger.load("default").contains_key("7"));
//!
//! ledger.delete("default", "7")?;
//! assert!(ledger.load("default").is_empty());
//! # Ok(())
//! # }
//! ```

pub mod record;
pub mod store;
pub mod writer;

pub use record::ArchivedRecord;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use writer::{LedgerWriter, ScopedLedger};

use crate::error::{Error, Result};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Records of one scope, keyed by task identifier.
pub type LedgerEntries = HashMap<String, ArchivedRecord>;

/// Prefix of the store keys holding ledger blobs.
pub const LEDGER_KEY_PREFIX: &str = "trawl.ledger.";

/// Keyed, read-modify-write access to the persisted records.
pub struct Ledger {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl Ledger {
    /// Creates a ledger on top of `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Store key of the blob holding `scope`.
    pub fn key_for(scope: &str) -> String {
        format!("{}{}", LEDGER_KEY_PREFIX, scope)
    }

    /// Loads every record of `scope`, or nothing if the blob is missing or corrupt.
    pub fn load(&self, scope: &str) -> LedgerEntries {
        let key = Ledger::key_for(scope);
        let bytes = match self.store.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return LedgerEntries::new(),
            Err(e) => {
                warn!("Cannot read ledger {}: {}", key, e);
                return LedgerEntries::new();
            }
        };

        match serde_json::from_slice::<LedgerEntries>(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring corrupt ledger {}: {}", key, e);
                LedgerEntries::new()
            }
        }
    }

    /// Inserts or replaces `record` under its task identifier.
    pub fn save(&self, scope: &str, record: &ArchivedRecord) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = self.load(scope);
        entries.insert(record.task_id.clone(), record.clone());
        debug!("Saving ledger record {} in scope {}", record.task_id, scope);
        self.write(scope, &entries)
    }

    /// Removes the record of `task_id`, if any.
    pub fn delete(&self, scope: &str, task_id: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = self.load(scope);
        if entries.remove(task_id).is_none() {
            return Ok(());
        }
        debug!("Deleting ledger record {} in scope {}", task_id, scope);
        self.write(scope, &entries)
    }

    /// Removes every record of `scope` whose task id is not in `keep`.
    ///
    /// Returns the number of records removed.
    pub fn retain(&self, scope: &str, keep: &[String]) -> Result<usize> {
        let _guard = self.lock()?;
        let mut entries = self.load(scope);
        let before = entries.len();
        entries.retain(|task_id, _| keep.contains(task_id));
        let removed = before - entries.len();
        if removed > 0 {
            self.write(scope, &entries)?;
        }
        Ok(removed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Internal("ledger lock poisoned".into()))
    }

    fn write(&self, scope: &str, entries: &LedgerEntries) -> Result<()> {
        let key = Ledger::key_for(scope);
        if entries.is_empty() {
            return self.store.remove(&key);
        }
        let bytes = serde_json::to_vec(entries)?;
        self.store.set(&key, &bytes)
    }
}
