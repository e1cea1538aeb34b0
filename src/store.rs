// SPDX-License-Identifier: Apache-2.0

//! The persistent key/value store contract (external collaborator) and an
//! in-memory implementation used by tests and hosts without flash-backed
//! storage.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::error::StoreError;

/// Not transactional. An empty string return from `get` means "absent",
/// matching the original firmware's `Preferences` wrapper.
pub trait Store {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn destroy(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> alloc::vec::Vec<String>;
}

/// A `BTreeMap`-backed store. Good enough for hosts that run this crate
/// under `std`, and for every unit test in this crate.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(String::from(key), String::from(value));
        Ok(())
    }

    fn destroy(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn keys(&self) -> alloc::vec::Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
