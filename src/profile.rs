// SPDX-License-Identifier: Apache-2.0

//! Named wireless credential records over the key/value store, with one
//! "active" profile that persists across restarts.
//!
//! Every profile is stored under its own `wifi_key`; a side index under
//! [`WIFI_KEYS`] lists every key that currently has a profile, and
//! [`WIFI_ACTIVE_KEY`] names whichever one is selected. A profile is only
//! discoverable through `read_all`/`select_active` once it's in that
//! index, so `create` maintains it on every successful write.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::store::Store;

const WIFI_KEYS: &str = "wifi_keys";
const WIFI_ACTIVE_KEY: &str = "wifi_active_key";

/// A bundle of wireless credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiProfile {
    pub wifi_key: String,
    pub ssid: String,
    pub password: String,
    pub client_ip: String,
    pub client_port: u16,
}

/// CRUD over wireless profiles, backed by any [`Store`].
pub struct ProfileStore<S: Store> {
    store: S,
    active: Option<WifiProfile>,
}

impl<S: Store> ProfileStore<S> {
    /// Opens the store, seeding `seed` as the first profile if its key
    /// isn't present yet.
    pub fn new(mut store: S, seed: WifiProfile) -> Self {
        if store.get(&seed.wifi_key).is_none() {
            let _ = write_profile(&mut store, &seed);
            let _ = register_key(&mut store, &seed.wifi_key);
        }
        Self { store, active: None }
    }

    /// Hands back the underlying store, e.g. to reopen a fresh
    /// `ProfileStore` against the same backing contents after a restart.
    pub fn into_store(self) -> S {
        self.store
    }

    fn keys(&self) -> Vec<String> {
        self.store
            .get(WIFI_KEYS)
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default()
    }

    pub fn create(&mut self, profile: WifiProfile) -> Result<(), DomainError> {
        if profile.wifi_key.is_empty() {
            return Err(DomainError::new("wifi_key must not be empty"));
        }
        if self.keys().contains(&profile.wifi_key) {
            return Err(DomainError::new("a profile with this wifi_key already exists"));
        }
        write_profile(&mut self.store, &profile)
            .map_err(|_| DomainError::new("could not write the wifi profile"))?;
        register_key(&mut self.store, &profile.wifi_key)
            .map_err(|_| DomainError::new("could not register the wifi_key"))?;
        Ok(())
    }

    pub fn read(&self, key: &str) -> Result<WifiProfile, DomainError> {
        read_profile(&self.store, key).ok_or_else(|| DomainError::new("no profile with this wifi_key"))
    }

    pub fn read_all(&self) -> Vec<WifiProfile> {
        self.keys()
            .into_iter()
            .filter_map(|key| read_profile(&self.store, &key))
            .collect()
    }

    pub fn select_active(&mut self, key: &str) -> Result<(), DomainError> {
        if key.is_empty() || !self.keys().contains(&key.to_string()) {
            return Err(DomainError::new("wifi key does not exist or profile could not be selected"));
        }
        let profile = self
            .read(key)
            .map_err(|_| DomainError::new("wifi key does not exist or profile could not be selected"))?;
        self.store
            .set(WIFI_ACTIVE_KEY, key)
            .map_err(|_| DomainError::new("could not persist the active wifi key"))?;
        self.active = Some(profile);
        Ok(())
    }

    pub fn read_active(&self) -> Result<WifiProfile, DomainError> {
        if let Some(active) = &self.active {
            return Ok(active.clone());
        }
        let key = self
            .store
            .get(WIFI_ACTIVE_KEY)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DomainError::new("no active wifi profile selected"))?;
        self.read(&key)
    }

    pub fn destroy(&mut self, key: &str) -> Result<(), DomainError> {
        if key.is_empty() {
            return Err(DomainError::new("wifi_key must not be empty"));
        }
        self.store
            .destroy(key)
            .map_err(|_| DomainError::new("wifi key does not exist or profile could not be destroyed"))?;

        let remaining: Vec<String> = self.keys().into_iter().filter(|k| k != key).collect();
        let buffer = serde_json::to_string(&remaining)
            .map_err(|_| DomainError::new("could not serialize the wifi_keys index"))?;
        self.store
            .set(WIFI_KEYS, &buffer)
            .map_err(|_| DomainError::new("could not persist the wifi_keys index"))?;

        if self.active.as_ref().is_some_and(|p| p.wifi_key == key) {
            self.active = None;
        }
        Ok(())
    }
}

fn write_profile<S: Store>(store: &mut S, profile: &WifiProfile) -> Result<(), crate::error::StoreError> {
    let buffer = serde_json::to_string(profile).map_err(|_| crate::error::StoreError::WriteFailed)?;
    store.set(&profile.wifi_key, &buffer)
}

fn read_profile<S: Store>(store: &S, key: &str) -> Option<WifiProfile> {
    let raw = store.get(key)?;
    serde_json::from_str(&raw).ok()
}

fn register_key<S: Store>(store: &mut S, key: &str) -> Result<(), crate::error::StoreError> {
    let mut keys = store
        .get(WIFI_KEYS)
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .unwrap_or_default();
    if !keys.iter().any(|k| k == key) {
        keys.push(key.to_string());
    }
    let buffer = serde_json::to_string(&keys).map_err(|_| crate::error::StoreError::WriteFailed)?;
    store.set(WIFI_KEYS, &buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seed() -> WifiProfile {
        WifiProfile {
            wifi_key: String::from("wifi_primary"),
            ssid: String::from("build-ssid"),
            password: String::from("build-password"),
            client_ip: String::from("192.168.1.50"),
            client_port: 9000,
        }
    }

    #[test]
    fn boot_seeds_the_primary_profile() {
        let profiles = ProfileStore::new(MemoryStore::new(), seed());
        let read = profiles.read("wifi_primary").unwrap();
        assert_eq!(read.ssid, "build-ssid");
        assert_eq!(profiles.read_all().len(), 1);
    }

    #[test]
    fn create_rejects_duplicate_keys() {
        let mut profiles = ProfileStore::new(MemoryStore::new(), seed());
        let dup = WifiProfile {
            wifi_key: String::from("wifi_primary"),
            ..seed()
        };
        assert!(profiles.create(dup).is_err());
    }

    #[test]
    fn select_and_read_active_round_trips() {
        let mut profiles = ProfileStore::new(MemoryStore::new(), seed());
        let guest = WifiProfile {
            wifi_key: String::from("guest"),
            ssid: String::from("guest-net"),
            password: String::from("hunter2"),
            client_ip: String::from("10.0.0.5"),
            client_port: 9001,
        };
        profiles.create(guest.clone()).unwrap();
        profiles.select_active("guest").unwrap();
        assert_eq!(profiles.read_active().unwrap(), guest);
    }

    #[test]
    fn destroy_removes_profile_and_key_index() {
        let mut profiles = ProfileStore::new(MemoryStore::new(), seed());
        profiles.destroy("wifi_primary").unwrap();
        assert!(profiles.read_all().is_empty());
        assert!(profiles.read("wifi_primary").is_err());
    }

    #[test]
    fn selecting_an_unknown_key_fails() {
        let mut profiles = ProfileStore::new(MemoryStore::new(), seed());
        assert!(profiles.select_active("does-not-exist").is_err());
    }

    #[test]
    fn created_and_selected_profile_survives_a_simulated_restart() {
        let guest = WifiProfile {
            wifi_key: String::from("guest"),
            ssid: String::from("guest-net"),
            password: String::from("hunter2"),
            client_ip: String::from("10.0.0.5"),
            client_port: 9001,
        };

        let mut profiles = ProfileStore::new(MemoryStore::new(), seed());
        profiles.create(guest.clone()).unwrap();
        profiles.select_active("guest").unwrap();
        let backing = profiles.into_store();

        // a fresh ProfileStore opened against the same backing contents,
        // as if the node had just rebooted
        let restarted = ProfileStore::new(backing, seed());
        assert_eq!(restarted.read_active().unwrap(), guest);
        assert_eq!(restarted.read_all().len(), 2);
        assert!(restarted.read_all().iter().any(|p| p.wifi_key == "guest"));
    }
}
