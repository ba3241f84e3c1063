//! Structured collections layered over key-value storage.
//!
//! [`StorageMap`] stores values under hashed element keys; [`StorageList`]
//! maintains an integer-indexed sequence with a count cell. Both are plain
//! key-prefix descriptors: cheap to construct, no state of their own.

use crate::crypto::sha256;
use crate::storage::StorageContext;
use crate::types::encoding::{Decode, Encode};

/// Builds the cell key for a map entry: `prefix ++ '.' ++ sha256(key)`.
///
/// Hashing keeps element keys fixed-width regardless of what callers use as
/// the logical key (addresses, symbols, arbitrary integers).
fn map_cell_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let digest = sha256(key);
    let mut cell = Vec::with_capacity(prefix.len() + 1 + digest.len());
    cell.extend_from_slice(prefix);
    cell.push(b'.');
    cell.extend_from_slice(&digest);
    cell
}

/// A map from opaque keys to encodable values under a storage prefix.
#[derive(Debug, Clone)]
pub struct StorageMap {
    prefix: Vec<u8>,
}

impl StorageMap {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn get<V: Decode, S: StorageContext + ?Sized>(&self, store: &S, key: &[u8]) -> Option<V> {
        let bytes = store.get(&map_cell_key(&self.prefix, key))?;
        V::from_bytes(&bytes).ok()
    }

    pub fn put<V: Encode, S: StorageContext + ?Sized>(&self, store: &mut S, key: &[u8], value: &V) {
        store.put(&map_cell_key(&self.prefix, key), value.to_bytes());
    }

    pub fn remove<S: StorageContext + ?Sized>(&self, store: &mut S, key: &[u8]) {
        store.delete(&map_cell_key(&self.prefix, key));
    }

    pub fn contains<S: StorageContext + ?Sized>(&self, store: &S, key: &[u8]) -> bool {
        store.has(&map_cell_key(&self.prefix, key))
    }
}

/// An integer-indexed sequence of encodable values under a storage prefix.
#[derive(Debug, Clone)]
pub struct StorageList {
    prefix: Vec<u8>,
}

impl StorageList {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn count_key(&self) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(b".count");
        key
    }

    fn item_key(&self, index: u64) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(b".item.");
        key.extend_from_slice(&index.to_le_bytes());
        key
    }

    pub fn count<S: StorageContext + ?Sized>(&self, store: &S) -> u64 {
        store
            .get(&self.count_key())
            .and_then(|bytes| u64::from_bytes(&bytes).ok())
            .unwrap_or(0)
    }

    fn set_count<S: StorageContext + ?Sized>(&self, store: &mut S, count: u64) {
        if count == 0 {
            store.delete(&self.count_key());
        } else {
            store.put(&self.count_key(), count.to_bytes());
        }
    }

    /// Appends a value to the end of the list.
    pub fn add<V: Encode, S: StorageContext + ?Sized>(&self, store: &mut S, value: &V) {
        let count = self.count(store);
        store.put(&self.item_key(count), value.to_bytes());
        self.set_count(store, count + 1);
    }

    /// Returns the value at `index`, or `None` when out of bounds.
    pub fn get<V: Decode, S: StorageContext + ?Sized>(&self, store: &S, index: u64) -> Option<V> {
        if index >= self.count(store) {
            return None;
        }
        let bytes = store.get(&self.item_key(index))?;
        V::from_bytes(&bytes).ok()
    }

    /// Overwrites the value at `index`; out-of-bounds writes are ignored.
    pub fn replace<V: Encode, S: StorageContext + ?Sized>(
        &self,
        store: &mut S,
        index: u64,
        value: &V,
    ) {
        if index < self.count(store) {
            store.put(&self.item_key(index), value.to_bytes());
        }
    }

    /// Removes the value at `index`, shifting subsequent items down one slot
    /// so the list keeps its order.
    pub fn remove_at<S: StorageContext + ?Sized>(&self, store: &mut S, index: u64) {
        let count = self.count(store);
        if index >= count {
            return;
        }
        for i in index..count - 1 {
            if let Some(next) = store.get(&self.item_key(i + 1)) {
                store.put(&self.item_key(i), next);
            }
        }
        store.delete(&self.item_key(count - 1));
        self.set_count(store, count - 1);
    }

    /// Deletes every item and the count cell.
    pub fn clear<S: StorageContext + ?Sized>(&self, store: &mut S) {
        let count = self.count(store);
        for i in 0..count {
            store.delete(&self.item_key(i));
        }
        self.set_count(store, 0);
    }

    /// Reads the full list into memory.
    pub fn all<V: Decode, S: StorageContext + ?Sized>(&self, store: &S) -> Vec<V> {
        let count = self.count(store);
        let mut items = Vec::with_capacity(count as usize);
        for i in 0..count {
            if let Some(item) = self.get(store, i) {
                items.push(item);
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn map_put_get_remove() {
        let mut store = MemoryStorage::new();
        let map = StorageMap::new(&b"test.map"[..]);

        map.put(&mut store, b"key", &42u64);
        assert_eq!(map.get::<u64, _>(&store, b"key"), Some(42));
        assert!(map.contains(&store, b"key"));
        assert!(!map.contains(&store, b"other"));

        map.remove(&mut store, b"key");
        assert_eq!(map.get::<u64, _>(&store, b"key"), None);
    }

    #[test]
    fn maps_with_different_prefixes_are_disjoint() {
        let mut store = MemoryStorage::new();
        let a = StorageMap::new(&b"a"[..]);
        let b = StorageMap::new(&b"b"[..]);

        a.put(&mut store, b"key", &1u64);
        assert_eq!(b.get::<u64, _>(&store, b"key"), None);
    }

    #[test]
    fn list_add_and_get() {
        let mut store = MemoryStorage::new();
        let list = StorageList::new(&b"test.list"[..]);

        assert_eq!(list.count(&store), 0);
        list.add(&mut store, &10u64);
        list.add(&mut store, &20u64);
        list.add(&mut store, &30u64);

        assert_eq!(list.count(&store), 3);
        assert_eq!(list.get::<u64, _>(&store, 0), Some(10));
        assert_eq!(list.get::<u64, _>(&store, 2), Some(30));
        assert_eq!(list.get::<u64, _>(&store, 3), None);
    }

    #[test]
    fn list_replace() {
        let mut store = MemoryStorage::new();
        let list = StorageList::new(&b"test.list"[..]);

        list.add(&mut store, &1u64);
        list.replace(&mut store, 0, &9u64);
        assert_eq!(list.get::<u64, _>(&store, 0), Some(9));

        // Out of bounds is a no-op.
        list.replace(&mut store, 5, &7u64);
        assert_eq!(list.count(&store), 1);
    }

    #[test]
    fn list_remove_at_preserves_order() {
        let mut store = MemoryStorage::new();
        let list = StorageList::new(&b"test.list"[..]);

        for value in [1u64, 2, 3, 4] {
            list.add(&mut store, &value);
        }
        list.remove_at(&mut store, 1);

        assert_eq!(list.all::<u64, _>(&store), vec![1, 3, 4]);
    }

    #[test]
    fn list_clear() {
        let mut store = MemoryStorage::new();
        let list = StorageList::new(&b"test.list"[..]);

        list.add(&mut store, &1u64);
        list.add(&mut store, &2u64);
        list.clear(&mut store);

        assert_eq!(list.count(&store), 0);
        assert!(list.all::<u64, _>(&store).is_empty());
    }
}
