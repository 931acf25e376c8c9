//! Folder storage implementation
//!
//! Each key is a regular file named after the key inside one directory,
//! holding the raw value bytes. There is no in-process locking: every
//! operation is a single filesystem call and concurrent writes to the same
//! key race at the OS level.

use kv_core::{KvError, Op, OpContext, Result, Store};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

const BACKEND: &str = "folder";

/// Directory-backed byte store
#[derive(Debug)]
pub struct FolderStore {
    dir: PathBuf,
    closed: AtomicBool,
    /// Set only after the directory tree was actually removed
    purged: AtomicBool,
}

impl FolderStore {
    /// Open a store rooted at `dir`, creating the directory if missing
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| KvError::io(OpContext::new(BACKEND, Op::Open), e))?;

        info!("Folder store opened at: {:?}", dir);

        Ok(Self {
            dir,
            closed: AtomicBool::new(false),
            purged: AtomicBool::new(false),
        })
    }

    /// Get the store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    fn entry_path(&self, ctx: &OpContext, key: &str) -> Result<PathBuf> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KvError::closed(ctx.clone()));
        }
        validate_key(key).map_err(|e| KvError::halted(ctx.clone(), e))?;
        Ok(self.dir.join(key))
    }

    fn ensure_open(&self, ctx: &OpContext) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KvError::closed(ctx.clone()));
        }
        Ok(())
    }
}

/// Keys become file names, so they must name exactly one entry in the directory
fn validate_key(key: &str) -> io::Result<()> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0');
    if invalid {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid key {:?}", key),
        ));
    }
    Ok(())
}

/// Remove a directory tree, treating an already missing one as removed
fn remove_tree(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl Store<Vec<u8>> for FolderStore {
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Set).with_key(key);
        let path = self.entry_path(&ctx, key)?;
        fs::write(&path, &value).map_err(|e| KvError::io(ctx, e))?;
        debug!(key, bytes = value.len(), "folder set");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let ctx = OpContext::new(BACKEND, Op::Get).with_key(key);
        let path = self.entry_path(&ctx, key)?;
        fs::read(&path).map_err(|e| KvError::io_lookup(ctx, e))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Delete).with_key(key);
        let path = self.entry_path(&ctx, key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "folder del");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KvError::io(ctx, e)),
        }
    }

    fn clear(&self) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Clear);
        self.ensure_open(&ctx)?;
        remove_tree(&self.dir).map_err(|e| KvError::io(ctx.clone(), e))?;
        fs::create_dir_all(&self.dir).map_err(|e| KvError::io(ctx, e))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let ctx = OpContext::new(BACKEND, Op::Keys);
        self.ensure_open(&ctx)?;

        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| KvError::io(ctx.clone(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| KvError::io(ctx.clone(), e))?;
            let file_type = entry.file_type().map_err(|e| KvError::io(ctx.clone(), e))?;
            if !file_type.is_file() {
                continue;
            }
            // Non UTF-8 names were not written by this store
            if let Ok(name) = entry.file_name().into_string() {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Folder store closed: {:?}", self.dir);
        }
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        if self.purged.load(Ordering::Acquire) {
            return Ok(());
        }
        // A closed store still owns its directory on disk
        self.closed.store(true, Ordering::Release);
        remove_tree(&self.dir).map_err(|e| KvError::io(OpContext::new(BACKEND, Op::Purge), e))?;
        self.purged.store(true, Ordering::Release);
        info!("Folder store purged: {:?}", self.dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_core::ErrorKind;
    use tempfile::TempDir;

    fn open_store(temp_dir: &TempDir) -> FolderStore {
        FolderStore::open(temp_dir.path().join("kvtest")).unwrap()
    }

    #[test]
    fn test_open_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("a").join("b");
        let store = FolderStore::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[test]
    fn test_value_stored_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        store.set("user:1", b"alice".to_vec()).unwrap();
        let path = store.dir().join("user:1");
        assert_eq!(fs::read(&path).unwrap(), b"alice");

        store.delete("user:1").unwrap();
        assert_eq!(store.get("user:1").unwrap_err().kind(), ErrorKind::NotFound);
        assert!(!path.exists());
    }

    #[test]
    fn test_overwrite_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        store.set("k", b"a long first value".to_vec()).unwrap();
        store.set("k", b"short".to_vec()).unwrap();
        assert_eq!(store.get("k").unwrap(), b"short");
    }

    #[test]
    fn test_delete_absent_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.delete("never-set").unwrap();
    }

    #[test]
    fn test_clear_recreates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.set("a", vec![1]).unwrap();
        store.set("b", vec![2]).unwrap();

        store.clear().unwrap();
        assert!(store.dir().is_dir());
        assert!(store.keys().unwrap().is_empty());

        store.set("c", vec![3]).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["c"]);
    }

    #[test]
    fn test_keys_skip_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.set("b", vec![]).unwrap();
        store.set("a", vec![]).unwrap();
        fs::create_dir(store.dir().join("nested")).unwrap();

        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        for key in ["", ".", "..", "../outside", "a/b"] {
            let err = store.set(key, b"x".to_vec()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Halted, "key {:?}", key);
        }
        assert!(!temp_dir.path().join("outside").exists());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.set("a", b"X".to_vec()).unwrap();
        store.close().unwrap();
        assert!(store.get("a").unwrap_err().is_closed());

        let reopened = open_store(&temp_dir);
        assert_eq!(reopened.get("a").unwrap(), b"X");
    }

    #[test]
    fn test_purge_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.set("a", b"X".to_vec()).unwrap();

        store.purge().unwrap();
        assert!(!store.dir().exists());
        assert!(store.set("a", vec![]).unwrap_err().is_closed());
        store.purge().unwrap();
    }

    #[test]
    fn test_purge_after_close_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        store.set("a", b"X".to_vec()).unwrap();

        store.close().unwrap();
        assert!(store.dir().join("a").exists());

        store.purge().unwrap();
        assert!(!store.dir().exists());
    }

    #[test]
    fn test_open_under_regular_file_is_halted() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = FolderStore::open(blocker.join("kvtest")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Halted);
        assert_eq!(err.context().op, Op::Open);
    }

    #[test]
    fn test_failed_set_is_halted() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);
        fs::create_dir(store.dir().join("taken")).unwrap();

        let err = store.set("taken", b"x".to_vec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Halted);
        assert_eq!(err.context().key.as_deref(), Some("taken"));
    }
}
