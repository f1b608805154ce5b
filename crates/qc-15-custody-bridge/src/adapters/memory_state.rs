//! In-memory ordered key/value store.
//!
//! Backs both the replicated chain state in tests and the validator-local job
//! store.

use crate::domain::StoreError;
use crate::ports::ChainState;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::{Bound, ControlFlow};

/// `BTreeMap`-backed implementation of `ChainState`.
#[derive(Default)]
pub struct InMemoryChainState {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryChainState {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ChainState for InMemoryChainState {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_vec(), value);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.entries.read().contains_key(key))
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.write().remove(key))
    }

    fn iterate_range(
        &self,
        start: &[u8],
        end: &[u8],
        ascending: bool,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        if start >= end {
            return Ok(());
        }
        // Snapshot so `visit` may call back into the store.
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .read()
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut step = |(k, v): &(Vec<u8>, Vec<u8>)| visit(k.as_slice(), v.as_slice());
        if ascending {
            let _ = snapshot.iter().try_for_each(&mut step);
        } else {
            let _ = snapshot.iter().rev().try_for_each(&mut step);
        }
        Ok(())
    }
}
