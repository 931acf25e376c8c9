//! KV Storage Layer
//!
//! Interchangeable key-value backends behind the kv-core Store contract

pub mod folder;
pub mod json;
pub mod memory;

pub use folder::FolderStore;
pub use json::{json_file_name, open_json_store, JsonFileStore};
pub use memory::{create_memory_store, MemoryStore};

pub use kv_core::{ByteStore, KvError, Result, SharedStore, Store, StoreBackend, StoreConfig};

use std::sync::Arc;

/// Open the configured backend as a shared byte store
pub fn open_store(backend: &StoreBackend) -> Result<SharedStore<Vec<u8>>> {
    let store: SharedStore<Vec<u8>> = match backend {
        StoreBackend::Memory => create_memory_store(),
        StoreBackend::Folder { dir } => Arc::new(FolderStore::open(dir.clone())?),
        StoreBackend::JsonFile { dir, name, options } => {
            open_json_store(dir, name, options.clone())?
        }
    };
    tracing::debug!("Opened {} store", backend.name());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_each_backend() {
        let temp_dir = TempDir::new().unwrap();
        let backends = [
            StoreBackend::memory(),
            StoreBackend::folder(temp_dir.path().join("folder")),
            StoreBackend::json_file(temp_dir.path(), "kv"),
        ];

        for backend in &backends {
            let store = open_store(backend).unwrap();
            store.set("k", b"v".to_vec()).unwrap();
            assert_eq!(store.get("k").unwrap(), b"v", "backend {}", backend.name());
        }

        assert!(temp_dir.path().join("folder").join("k").is_file());
        assert!(temp_dir.path().join("kv.json").is_file());
    }
}
