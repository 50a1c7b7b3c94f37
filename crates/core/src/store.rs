//! Ordered key-value stores backing module state
//!
//! Two stores exist per state machine:
//! - persistent store: request states, params, remote data
//! - memory store: derived caches rebuilt from persistent data, lost on restart
//!
//! Values are JSON encoded. Keys are raw bytes; iteration order is lexicographic,
//! so every read is deterministic.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use crate::{CoreError, CoreResult, WiringError, WiringResult};

/// Backing kind of a KV store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Persistent,
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Persistent => write!(f, "persistent"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KvStore {
    kind: StoreKind,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvStore {
    pub fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_raw(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn set_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    /// Read and decode a value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> CoreResult<Option<T>> {
        match self.entries.get(key) {
            Some(bz) => Ok(Some(serde_json::from_slice(bz)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a value
    pub fn set<T: Serialize>(&mut self, key: impl Into<Vec<u8>>, value: &T) -> CoreResult<()> {
        let bz = serde_json::to_vec(value)?;
        self.entries.insert(key.into(), bz);
        Ok(())
    }

    /// Iterate all entries whose key starts with `prefix`, in key order
    pub fn prefix_iter<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.entries
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Decode every value under `prefix`
    pub fn prefix_values<T: DeserializeOwned>(&self, prefix: &[u8]) -> CoreResult<Vec<T>> {
        self.prefix_iter(prefix)
            .map(|(_, v)| serde_json::from_slice(v).map_err(CoreError::from))
            .collect()
    }

    /// Remove every entry under `prefix`, returning how many were removed
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let keys: Vec<Vec<u8>> = self.prefix_iter(prefix).map(|(k, _)| k.to_vec()).collect();
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Concatenate key segments
pub fn key(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

/// Persistent and memory stores of one state machine
#[derive(Debug, Clone)]
pub struct MultiStore {
    persistent: KvStore,
    memory: KvStore,
}

impl MultiStore {
    pub fn new() -> Self {
        Self {
            persistent: KvStore::new(StoreKind::Persistent),
            memory: KvStore::new(StoreKind::Memory),
        }
    }

    /// Assemble from existing stores, checking each has the expected kind
    pub fn from_parts(persistent: KvStore, memory: KvStore) -> WiringResult<Self> {
        for (store, expected) in [(&persistent, StoreKind::Persistent), (&memory, StoreKind::Memory)] {
            if store.kind() != expected {
                return Err(WiringError::InvalidStoreKind {
                    got: store.kind().to_string(),
                    expected: expected.to_string(),
                });
            }
        }
        Ok(Self { persistent, memory })
    }

    pub fn persistent(&self) -> &KvStore {
        &self.persistent
    }

    pub fn persistent_mut(&mut self) -> &mut KvStore {
        &mut self.persistent
    }

    pub fn memory(&self) -> &KvStore {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut KvStore {
        &mut self.memory
    }

    /// Drop the memory store, as happens on process restart
    pub fn reset_memory(&mut self) {
        self.memory = KvStore::new(StoreKind::Memory);
    }
}

impl Default for MultiStore {
    fn default() -> Self {
        Self::new()
    }
}
