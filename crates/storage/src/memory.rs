//! In-memory storage implementation
//!
//! Map guarded by a reader/writer lock. Nothing outlives the process.

use kv_core::{KvError, Op, OpContext, Result, SharedStore, Store};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

const BACKEND: &str = "rwmap";

#[derive(Debug)]
struct State<V> {
    entries: HashMap<String, V>,
    closed: bool,
}

/// In-memory storage implementation
#[derive(Debug)]
pub struct MemoryStore<V> {
    state: RwLock<State<V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                entries: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn read(&self, ctx: &OpContext) -> Result<RwLockReadGuard<'_, State<V>>> {
        let state = self
            .state
            .read()
            .map_err(|_| KvError::poisoned(ctx.clone()))?;
        if state.closed {
            return Err(KvError::closed(ctx.clone()));
        }
        Ok(state)
    }

    fn write(&self, ctx: &OpContext) -> Result<RwLockWriteGuard<'_, State<V>>> {
        let state = self
            .state
            .write()
            .map_err(|_| KvError::poisoned(ctx.clone()))?;
        if state.closed {
            return Err(KvError::closed(ctx.clone()));
        }
        Ok(state)
    }

    /// Empty the shared map and mark it closed, so every `Arc` holder sees it
    fn terminate(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
        state.closed = true;
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Store<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn set(&self, key: &str, value: V) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Set).with_key(key);
        let mut state = self.write(&ctx)?;
        state.entries.insert(key.to_string(), value);
        debug!(key, "rwmap set");
        Ok(())
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
        debug!(key, "rwmap del");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let ctx = OpContext::new(BACKEND, Op::Clear);
        let mut state = self.write(&ctx)?;
        state.entries.clear();
        debug!("rwmap clr");
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let ctx = OpContext::new(BACKEND, Op::Keys);
        let state = self.read(&ctx)?;
        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn close(&self) -> Result<()> {
        self.terminate();
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        self.terminate();
        Ok(())
    }
}

/// Create a new shared in-memory store
pub fn create_memory_store<V>() -> SharedStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    Arc::new(MemoryStore::new())
}
