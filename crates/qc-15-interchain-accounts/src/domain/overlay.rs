//! # Cache Store
//!
//! Write overlay over a parent [`KvStore`]. Reads fall through to the parent
//! unless the overlay holds a pending write or delete for the key. Nothing
//! reaches the parent until [`CacheStore::write`] is called; dropping the
//! overlay discards every pending change.

use super::errors::IcaError;
use crate::ports::KvStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Isolated overlay over a parent store.
pub struct CacheStore<'a> {
    parent: &'a dyn KvStore,
    /// Pending writes. `None` marks a delete.
    pending: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl<'a> CacheStore<'a> {
    /// Branch off `parent`.
    pub fn new(parent: &'a dyn KvStore) -> Self {
        Self {
            parent,
            pending: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys touched so far.
    pub fn pending_len(&self) -> usize {
        self.pending.read().len()
    }

    /// Flush every pending change into the parent, in key order.
    pub fn write(self) -> Result<(), IcaError> {
        let Self { parent, pending } = self;
        for (key, value) in pending.into_inner() {
            match value {
                Some(value) => parent.set(&key, &value)?,
                None => parent.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Drop every pending change.
    pub fn discard(self) {
        drop(self);
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IcaError> {
        if let Some(entry) = self.pending.read().get(key) {
            return Ok(entry.clone());
        }
        self.parent.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), IcaError> {
        self.pending
            .write()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), IcaError> {
        self.pending.write().insert(key.to_vec(), None);
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, IcaError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.prefix_scan(prefix)?.into_iter().collect();

        let pending = self.pending.read();
        for (key, value) in pending.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }
}
