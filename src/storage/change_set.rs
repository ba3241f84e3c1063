//! Copy-on-write storage overlays.
//!
//! A [`ChangeSet`] buffers writes in memory while the base storage stays
//! untouched. Transaction execution forks a change set, which is either
//! merged atomically into the block's accumulated changes on success or
//! dropped wholesale on fault.

use std::collections::BTreeMap;

/// A buffered set of storage writes.
///
/// `Some(value)` entries are insertions/overwrites, `None` entries are
/// deletions. Reads that miss the overlay fall through to whatever the owner
/// layers underneath.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a key in the overlay.
    ///
    /// Returns `None` if the overlay has no opinion, `Some(None)` if the key
    /// was deleted, and `Some(Some(value))` if it was written.
    pub fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.writes.get(key).cloned()
    }

    pub fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.writes.insert(key.to_vec(), Some(value));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    /// Merges `other` on top of this change set; later writes win.
    pub fn merge(&mut self, other: ChangeSet) {
        for (key, value) in other.writes {
            self.writes.insert(key, value);
        }
    }

    /// Number of buffered writes (including deletions).
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consumes the change set and returns all buffered writes in key order.
    pub fn into_writes(self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.writes.into_iter().collect()
    }
}
