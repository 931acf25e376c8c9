//! JSON file storage implementation
//!
//! Keeps the whole map in memory and mirrors it to a single JSON object on
//! disk. The in-memory map is the source of truth for the lifetime of the
//! store; the file is read once at open and rewritten in full on every
//! mutation, while the exclusive lock is held.
//!
//! Opening two stores on the same file is unsupported.

use kv_core::{
    CorruptPolicy, HaltCause, JsonFileOptions, KvError, Op, OpContext, Result, SharedStore, Store,
    WriteStrategy,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

const BACKEND: &str = "jsonf";
const SUFFIX: &str = ".json";

#[derive(Debug)]
struct State<V> {
    /// `None` once the store is closed or purged
    file: Option<File>,
    entries: BTreeMap<String, V>,
    /// Set only after the file was actually removed
    purged: bool,
}

/// JSON file backed store
#[derive(Debug)]
pub struct JsonFileStore<V> {
    path: PathBuf,
    options: JsonFileOptions,
    state: RwLock<State<V>>,
}

/// Normalize a store name to carry the `.json` suffix
pub fn json_file_name(name: &str) -> String {
    if name.ends_with(SUFFIX) {
        name.to_string()
    } else {
        format!("{}{}", name, SUFFIX)
    }
}

impl<V> JsonFileStore<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Open `<dir>/<name>.json` with default options
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::open_with(dir, name, JsonFileOptions::default())
    }

    /// Open `<dir>/<name>.json`, creating the directory and file if missing.
    ///
    /// An empty file starts an empty store. A file that does not decode as a
    /// JSON object of `V` values is handled per `options.on_corrupt`.
    pub fn open_with(dir: impl AsRef<Path>, name: &str, options: JsonFileOptions) -> Result<Self> {
        let dir = dir.as_ref();
        let ctx = || OpContext::new(BACKEND, Op::Open);

        fs::create_dir_all(dir).map_err(|e| KvError::io(ctx(), e))?;

        let path = dir.join(json_file_name(name));
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| KvError::io(ctx(), e))?;

        let mut content = Vec::new();
        let entries = match file.read_to_end(&mut content) {
            Ok(0) => None,
            Ok(_) => match serde_json::from_slice::<BTreeMap<String, V>>(&content) {
                Ok(entries) => Some(entries),
                Err(e) => match options.on_corrupt {
                    CorruptPolicy::Reset => {
                        warn!("Resetting undecodable JSON store {:?}: {}", path, e);
                        None
                    }
                    CorruptPolicy::Fail => {
                        return Err(KvError::halted(ctx(), HaltCause::Decode(e)));
                    }
                },
            },
            Err(e) => {
                warn!("Failed to read JSON store {:?}, starting empty: {}", path, e);
                None
            }
        };

        let store = match entries {
            Some(entries) => Self::from_parts(path, options, file, entries),
            None => {
                let mut store = Self::from_parts(path, options, file, BTreeMap::new());
                let state = store
                    .state
                    .get_mut()
                    .map_err(|_| KvError::poisoned(ctx()))?;
                store_entries(&store.path, &store.options, state, ctx())?;
                store
            }
        };

        info!("JSON file store opened at: {:?}", store.path);

        Ok(store)
    }
}

impl<V> JsonFileStore<V> {
    fn from_parts(
        path: PathBuf,
        options: JsonFileOptions,
        file: File,
        entries: BTreeMap<String, V>,
    ) -> Self {
        Self {
            path,
            options,
            state: RwLock::new(State {
                file: Some(file),
                entries,
                purged: false,
            }),
        }
    }

    /// Get the JSON file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &JsonFileOptions {
        &self.options
    }

    fn read(&self, ctx: &OpContext) -> Result<RwLockReadGuard<'_, State<V>>> {
        let state = self
            .state
            .read()
            .map_err(|_| KvError::poisoned(ctx.clone()))?;
        if state.file.is_none() {
            return Err(KvError::closed(ctx.clone()));
        }
        Ok(state)
    }

    fn write(&self, ctx: &OpContext) -> Result<RwLockWriteGuard<'_, State<V>>> {
        let state = self
            .state
            .write()
            .map_err(|_| KvError::poisoned(ctx.clone()))?;
        if state.file.is_none() {
            return Err(KvError::closed(ctx.clone()));
        }
        Ok(state)
    }
}

/// Serialize the whole map and make it the entire file content.
///
/// The caller holds the exclusive lock. On failure the in-memory map keeps
/// the mutation and the file may be stale until the next successful write.
fn store_entries<V: Serialize>(
    path: &Path,
    options: &JsonFileOptions,
    state: &mut State<V>,
    ctx: OpContext,
) -> Result<()> {
    let content = if options.pretty {
        serde_json::to_vec_pretty(&state.entries)
    } else {
        serde_json::to_vec(&state.entries)
    }
    .map_err(|e| KvError::halted(ctx.clone(), HaltCause::Encode(e)))?;

    match options.write {
        WriteStrategy::Truncate => {
            let file = state
                .file
                .as_mut()
                .ok_or_else(|| KvError::closed(ctx.clone()))?;
            rewrite(file, &content).map_err(|e| KvError::halted(ctx, e))
        }
        WriteStrategy::AtomicRename => {
            let file = replace(path, &content).map_err(|e| KvError::halted(ctx, e))?;
            state.file = Some(file);
            Ok(())
        }
    }
}

/// Rewind, truncate and write, so no stale bytes survive a shorter payload
fn rewrite(file: &mut File, content: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.set_len(0)?;
    file.write_all(content)?;
    file.flush()
}

/// Write a sibling temp file and rename it over `path`; returns the new handle
fn replace(path: &Path, content: &[u8]) -> io::Result<File> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)
}

impl<V> Store<V> for JsonFileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn set(&self, key: &str, value: V) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Set).with_key(key);
        let mut state = self.write(&ctx)?;
        state.entries.insert(key.to_string(), value);
        debug!(key, "jsonf set");
        store_entries(&self.path, &self.options, &mut state, ctx)
    }

    fn get(&self, key: &str) -> Result<V> {
        let ctx = OpContext::new(BACKEND, Op::Get).with_key(key);
        let state = self.read(&ctx)?;
        state
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| KvError::not_found(ctx))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Delete).with_key(key);
        let mut state = self.write(&ctx)?;
        state.entries.remove(key);
        debug!(key, "jsonf del");
        store_entries(&self.path, &self.options, &mut state, ctx)
    }

    fn clear(&self) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Clear);
        let mut state = self.write(&ctx)?;
        state.entries.clear();
        debug!("jsonf clr");
        store_entries(&self.path, &self.options, &mut state, ctx)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let ctx = OpContext::new(BACKEND, Op::Keys);
        let state = self.read(&ctx)?;
        Ok(state.entries.keys().cloned().collect())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(file) = state.file.take() else {
            return Ok(());
        };
        state.entries.clear();

        info!("JSON file store closed: {:?}", self.path);

        file.sync_all()
            .map_err(|e| KvError::halted(OpContext::new(BACKEND, Op::Close), e))
    }

    fn purge(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.purged {
            return Ok(());
        }
        state.entries.clear();
        // Closed stores still own their file on disk
        drop(state.file.take());

        match fs::remove_file(&self.path) {
            Ok(()) => info!("JSON file store purged: {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("JSON store file already gone: {:?}", self.path)
            }
            Err(e) => return Err(KvError::halted(OpContext::new(BACKEND, Op::Purge), e)),
        }
        state.purged = true;
        Ok(())
    }
}

/// Open a shared JSON file store
pub fn open_json_store<V>(
    dir: impl AsRef<Path>,
    name: &str,
    options: JsonFileOptions,
) -> Result<SharedStore<V>>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    Ok(Arc::new(JsonFileStore::open_with(dir, name, options)?))
}
