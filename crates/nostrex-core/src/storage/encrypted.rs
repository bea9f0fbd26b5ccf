//! Encrypted key/value store
//!
//! Values are serialized to JSON, sealed with the process store secret and
//! written to a [`DurableNamespace`] in a single call. Reads never fail: a
//! missing, undecryptable or malformed record all read as the caller's
//! default. Write debouncing is left to callers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{DurableNamespace, StoreCipher, StoreSecret};
use crate::errors::StoreResult;

// ----------------------------------------------------------------------------
// Vacancy
// ----------------------------------------------------------------------------

/// Values that can stand for "nothing stored"
///
/// [`EncryptedStore::update`] removes the key instead of writing a vacant value.
pub trait Vacancy {
    fn is_vacant(&self) -> bool;
}

impl Vacancy for String {
    fn is_vacant(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Vacancy for Vec<T> {
    fn is_vacant(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Vacancy for Option<T> {
    fn is_vacant(&self) -> bool {
        self.is_none()
    }
}

// ----------------------------------------------------------------------------
// Encrypted Store
// ----------------------------------------------------------------------------

/// Typed, encrypted view over a durable namespace
#[derive(Clone)]
pub struct EncryptedStore {
    namespace: Arc<dyn DurableNamespace>,
    cipher: StoreCipher,
}

impl core::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("available", &self.namespace.is_available())
            .finish()
    }
}

impl EncryptedStore {
    pub fn new(namespace: Arc<dyn DurableNamespace>, secret: &StoreSecret) -> Self {
        Self {
            namespace,
            cipher: StoreCipher::new(secret),
        }
    }

    /// Read `key`, falling back to `default` on absence or any failure
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!("Falling back to default for '{}': {}", key, e);
                default
            }
        }
    }

    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.get(key, T::default())
    }

    /// Read `key`, reporting why a present record could not be used
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let Some(sealed) = self.namespace.retrieve(key)? else {
            return Ok(None);
        };
        let plaintext = self.cipher.open(&sealed)?;
        let value = serde_json::from_slice(&plaintext)?;
        Ok(Some(value))
    }

    /// Serialize, encrypt and persist `value` under `key`
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let plaintext = serde_json::to_vec(value)?;
        let sealed = self.cipher.seal(&plaintext)?;
        self.namespace.store(key, sealed)?;
        debug!("Stored encrypted value for '{}'", key);
        Ok(())
    }

    /// Like [`set`](Self::set), but a vacant value removes the key
    pub fn update<T: Serialize + Vacancy>(&self, key: &str, value: &T) -> StoreResult<()> {
        if value.is_vacant() {
            return self.remove(key);
        }
        self.set(key, value)
    }

    pub fn remove(&self, key: &str) -> StoreResult<()> {
        self.namespace.delete(key)?;
        debug!("Removed '{}'", key);
        Ok(())
    }

    /// Whether a record exists under `key`, readable or not
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.namespace.retrieve(key), Ok(Some(_)))
    }

    /// Keys with a stored record, sorted
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        self.namespace.list_keys()
    }

    pub fn is_available(&self) -> bool {
        self.namespace.is_available()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryNamespace;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        relays: Vec<String>,
    }

    fn store_with(namespace: Arc<MemoryNamespace>) -> EncryptedStore {
        EncryptedStore::new(namespace, &StoreSecret::from_passphrase("test").unwrap())
    }

    #[test]
    fn test_set_then_get() {
        let store = store_with(Arc::new(MemoryNamespace::new()));
        let prefs = Prefs {
            theme: "dark".into(),
            relays: vec!["wss://nos.lol".into()],
        };

        store.set("prefs", &prefs).unwrap();
        assert_eq!(store.get_or_default::<Prefs>("prefs"), prefs);
        assert!(store.contains("prefs"));
    }

    #[test]
    fn test_absent_key_returns_default() {
        let store = store_with(Arc::new(MemoryNamespace::new()));
        assert_eq!(store.get("missing", 42u32), 42);
    }

    #[test]
    fn test_plaintext_never_reaches_namespace() {
        let namespace = Arc::new(MemoryNamespace::new());
        let store = store_with(namespace.clone());
        store.set("secret", &"super-private-value").unwrap();

        let sealed = namespace.retrieve("secret").unwrap().unwrap();
        assert!(!sealed
            .windows("super-private".len())
            .any(|w| w == b"super-private"));
    }

    #[test]
    fn test_tampered_record_reads_as_default() {
        let namespace = Arc::new(MemoryNamespace::new());
        let store = store_with(namespace.clone());
        store.set("prefs", &Prefs::default()).unwrap();

        let mut sealed = namespace.retrieve("prefs").unwrap().unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        namespace.store("prefs", sealed).unwrap();

        let fallback = Prefs {
            theme: "fallback".into(),
            relays: vec![],
        };
        assert_eq!(store.get("prefs", fallback.clone()), fallback);
    }

    #[test]
    fn test_wrong_type_reads_as_default() {
        let store = store_with(Arc::new(MemoryNamespace::new()));
        store.set("n", &"not a number").unwrap();
        assert_eq!(store.get("n", 7u64), 7);
        assert!(store.read::<u64>("n").is_err());
    }

    #[test]
    fn test_update_removes_vacant_values() {
        let store = store_with(Arc::new(MemoryNamespace::new()));
        store.update("name", &"alice".to_string()).unwrap();
        assert_eq!(store.get_or_default::<String>("name"), "alice");

        store.update("name", &String::new()).unwrap();
        assert!(!store.contains("name"));

        store.update("maybe", &Some(3u8)).unwrap();
        store.update("maybe", &None::<u8>).unwrap();
        assert!(!store.contains("maybe"));
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_keys_lists_stored_records() {
        let store = store_with(Arc::new(MemoryNamespace::new()));
        store.set("settings", &Prefs::default()).unwrap();
        store.set("identity", &"abc").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["identity", "settings"]);
        assert!(store_with(Arc::new(MemoryNamespace::unavailable())).keys().is_err());
    }

    #[test]
    fn test_unavailable_namespace_never_errors_on_read() {
        let store = store_with(Arc::new(MemoryNamespace::unavailable()));
        assert_eq!(store.get("anything", 1i32), 1);
        assert!(store.set("anything", &2i32).is_err());
        assert!(!store.is_available());
    }
}
