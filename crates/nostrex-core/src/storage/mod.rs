//! Durable storage for nostrex
//!
//! A [`DurableNamespace`] is a dumb string-keyed byte store scoped to one
//! application instance (the moral equivalent of browser local storage). The
//! [`EncryptedStore`] sits on top of it and is the only thing allowed to write
//! to it: values are encrypted before they reach a namespace and decrypted
//! after they leave it.

mod encrypted;
mod file;
mod secret;

pub use encrypted::{EncryptedStore, Vacancy};
pub use file::FileNamespace;
pub use secret::{StoreCipher, StoreSecret, DEVICE_KEY_FILE};

use dashmap::DashMap;

use crate::errors::{StoreError, StoreResult};

// ----------------------------------------------------------------------------
// Namespace Trait
// ----------------------------------------------------------------------------

/// String-keyed byte store that persists across restarts
pub trait DurableNamespace: Send + Sync {
    /// Read the bytes stored under `key`
    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the bytes stored under `key`
    fn store(&self, key: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// List all keys
    fn list_keys(&self) -> StoreResult<Vec<String>>;

    /// Check if the namespace is usable
    fn is_available(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Memory Namespace
// ----------------------------------------------------------------------------

/// In-memory namespace for tests and ephemeral sessions
#[derive(Debug)]
pub struct MemoryNamespace {
    data: DashMap<String, Vec<u8>>,
    available: bool,
}

impl MemoryNamespace {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            available: true,
        }
    }

    /// A namespace that rejects every operation
    pub fn unavailable() -> Self {
        Self {
            data: DashMap::new(),
            available: false,
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::NotAvailable("memory namespace disabled".to_string()))
        }
    }
}

impl Default for MemoryNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableNamespace for MemoryNamespace {
    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.data.get(key).map(|entry| entry.value().clone()))
    }

    fn store(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        self.check()?;
        self.data.insert(key.to_string(), data);
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.check()?;
        self.data.remove(key);
        Ok(())
    }

    fn list_keys(&self) -> StoreResult<Vec<String>> {
        self.check()?;
        let mut keys: Vec<String> = self.data.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
