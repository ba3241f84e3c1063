//! Key-value storage abstractions: base stores, overlays, and collections.

pub mod change_set;
pub mod collections;

pub use change_set::ChangeSet;
pub use collections::{StorageList, StorageMap};

use std::collections::BTreeMap;

/// Key-value storage interface used by contracts and the runtime.
///
/// Contracts never touch a chain's storage directly; during execution every
/// access goes through the runtime's change-set overlay, which implements
/// this trait.
pub trait StorageContext {
    /// Retrieves a value by key, returning `None` if the key does not exist.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    /// Stores a key-value pair, overwriting any existing value.
    fn put(&mut self, key: &[u8], value: Vec<u8>);
    /// Removes a key from storage.
    fn delete(&mut self, key: &[u8]);

    /// Returns true if the key is present.
    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }
}

/// In-memory storage backing one chain's state.
///
/// Ordered so that iteration (used for prefix scans and invariant checks) is
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Applies a change set atomically: inserts overwrite, `None` deletes.
    pub fn commit(&mut self, changes: ChangeSet) {
        for (key, value) in changes.into_writes() {
            match value {
                Some(value) => {
                    self.data.insert(key, value);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
    }

    /// Iterates over all entries whose key starts with `prefix`.
    pub fn iter_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.data
            .range(prefix.to_vec()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}

impl StorageContext for MemoryStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.data.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.data.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let mut storage = MemoryStorage::new();
        storage.put(b"key", b"value".to_vec());
        assert_eq!(storage.get(b"key"), Some(b"value".to_vec()));
        assert!(storage.has(b"key"));

        storage.delete(b"key");
        assert_eq!(storage.get(b"key"), None);
        assert!(!storage.has(b"key"));
    }

    #[test]
    fn commit_applies_writes_and_deletes() {
        let mut storage = MemoryStorage::new();
        storage.put(b"a", vec![1]);
        storage.put(b"b", vec![2]);

        let mut changes = ChangeSet::new();
        changes.put(b"a", vec![9]);
        changes.delete(b"b");
        changes.put(b"c", vec![3]);
        storage.commit(changes);

        assert_eq!(storage.get(b"a"), Some(vec![9]));
        assert_eq!(storage.get(b"b"), None);
        assert_eq!(storage.get(b"c"), Some(vec![3]));
    }

    #[test]
    fn iter_prefix_scans_only_matching_keys() {
        let mut storage = MemoryStorage::new();
        storage.put(b"balances.KCAL.a", vec![1]);
        storage.put(b"balances.KCAL.b", vec![2]);
        storage.put(b"balances.SOUL.a", vec![3]);

        let hits: Vec<_> = storage.iter_prefix(b"balances.KCAL.").collect();
        assert_eq!(hits.len(), 2);
    }
}
