use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tb_core::StoreError;

use crate::{KeyValueStore, scoped_key};

#[derive(Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, Value>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `set` calls served so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, owner_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .entries
            .get(&scoped_key(owner_id, key))
            .map(|entry| entry.value().clone()))
    }

    async fn set(&self, owner_id: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(scoped_key(owner_id, key), value);
        Ok(())
    }
}
