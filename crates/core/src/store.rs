//! Storage trait definition
//!
//! Abstract interface every key-value backend implements

use std::sync::Arc;

use crate::error::Result;

/// Minimal key-value store
///
/// All operations take `&self`: a store is meant to be shared between
/// threads behind an `Arc`. `close` and `purge` act on the shared instance,
/// so every holder sees the store as terminated afterwards and any further
/// operation fails with a `Halted` "store closed" error.
pub trait Store<V>: Send + Sync {
    /// Insert or overwrite the value for `key`.
    fn set(&self, key: &str, value: V) -> Result<()>;

    /// Current value for `key`, or `NotFound`.
    fn get(&self, key: &str) -> Result<V>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key; the store stays usable.
    fn clear(&self) -> Result<()>;

    /// Present keys, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// Release the backing resource. Persisted data survives.
    fn close(&self) -> Result<()>;

    /// Delete all persisted data and release the backing resource.
    fn purge(&self) -> Result<()>;

    fn contains(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Key-value store with raw bytes as values
pub trait ByteStore: Store<Vec<u8>> {}

impl<T: Store<Vec<u8>> + ?Sized> ByteStore for T {}

/// Shared store reference
pub type SharedStore<V> = Arc<dyn Store<V>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, KvError, Op, OpContext};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Bare-bones store to exercise the provided methods
    #[derive(Default)]
    struct MapStore {
        map: Mutex<HashMap<String, Vec<u8>>>,
        broken: bool,
    }

    impl Store<Vec<u8>> for MapStore {
        fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
            self.map.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        fn get(&self, key: &str) -> Result<Vec<u8>> {
            let ctx = OpContext::new("test", Op::Get).with_key(key);
            if self.broken {
                return Err(KvError::poisoned(ctx));
            }
            self.map
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| KvError::not_found(ctx))
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.map.lock().unwrap().remove(key);
            Ok(())
        }

        fn clear(&self) -> Result<()> {
            self.map.lock().unwrap().clear();
            Ok(())
        }

        fn keys(&self) -> Result<Vec<String>> {
            let mut keys: Vec<String> = self.map.lock().unwrap().keys().cloned().collect();
            keys.sort();
            Ok(keys)
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }

        fn purge(&self) -> Result<()> {
            self.clear()
        }
    }

    #[test]
    fn test_contains() {
        let store = MapStore::default();
        assert!(!store.contains("a").unwrap());
        store.set("a", b"1".to_vec()).unwrap();
        assert!(store.contains("a").unwrap());
    }

    #[test]
    fn test_contains_propagates_other_errors() {
        let store = MapStore {
            broken: true,
            ..Default::default()
        };
        let err = store.contains("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Halted);
    }

    #[test]
    fn test_shared_byte_store() {
        fn takes_bytes<S: ByteStore + ?Sized>(store: &S) -> Vec<String> {
            store.keys().unwrap()
        }

        let shared: SharedStore<Vec<u8>> = Arc::new(MapStore::default());
        shared.set("b", vec![2]).unwrap();
        shared.set("a", vec![1]).unwrap();
        assert_eq!(takes_bytes(shared.as_ref()), vec!["a", "b"]);
    }
}
