//! Store secret resolution and the at-rest cipher
//!
//! The secret is process-wide configuration, resolved once at startup and
//! never rotated. Sources, in order: an environment passphrase, then a random
//! device key kept next to the namespace. There is no built-in fallback
//! passphrase.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use aes_gcm::{AeadInPlace, Aes256Gcm, KeyInit};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::errors::{StoreError, StoreResult};

/// File name of the generated device key inside the data directory
pub const DEVICE_KEY_FILE: &str = "store.key";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

// ----------------------------------------------------------------------------
// Store Secret
// ----------------------------------------------------------------------------

/// 256-bit key material for the encrypted store
#[derive(Clone)]
pub struct StoreSecret([u8; KEY_LEN]);

impl core::fmt::Debug for StoreSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("StoreSecret(..)")
    }
}

impl StoreSecret {
    /// Derive a key from a passphrase
    pub fn from_passphrase(passphrase: &str) -> StoreResult<Self> {
        if passphrase.is_empty() {
            return Err(StoreError::InvalidSecret("passphrase is empty".to_string()));
        }
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);
        Ok(Self(key))
    }

    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self(key)
    }

    /// Fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Read the passphrase from `env_var`, falling back to the device key in `data_dir`
    pub fn resolve(env_var: &str, data_dir: &Path) -> StoreResult<Self> {
        match std::env::var(env_var) {
            Ok(passphrase) if !passphrase.is_empty() => {
                info!("Using store secret from {}", env_var);
                Self::from_passphrase(&passphrase)
            }
            _ => Self::load_or_create_device_key(&data_dir.join(DEVICE_KEY_FILE)),
        }
    }

    /// Load the device key at `path`, generating and saving one if missing
    pub fn load_or_create_device_key(path: &Path) -> StoreResult<Self> {
        match fs::read(path) {
            Ok(bytes) if bytes.len() == KEY_LEN => {
                let mut key = [0u8; KEY_LEN];
                key.copy_from_slice(&bytes);
                return Ok(Self(key));
            }
            Ok(bytes) => {
                return Err(StoreError::InvalidSecret(format!(
                    "device key at {} has {} bytes, expected {}",
                    path.display(),
                    bytes.len(),
                    KEY_LEN
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }

        // Every value written under a previous key becomes unreadable
        warn!(
            "No store secret configured, generating device key at {}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let secret = Self::generate();
        fs::write(path, secret.0)?;
        Ok(secret)
    }
}

// ----------------------------------------------------------------------------
// Cipher
// ----------------------------------------------------------------------------

/// AES-256-GCM sealing for stored records
///
/// Layout: nonce (12 bytes) + tag (16 bytes) + ciphertext.
#[derive(Clone)]
pub struct StoreCipher {
    cipher: Aes256Gcm,
}

impl StoreCipher {
    pub fn new(secret: &StoreSecret) -> Self {
        Self {
            cipher: Aes256Gcm::new((&secret.0).into()),
        }
    }

    /// Encrypt a plaintext record
    pub fn seal(&self, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let mut ciphertext = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached((&nonce_bytes).into(), b"", &mut ciphertext)
            .map_err(|_| StoreError::EncryptionFailed)?;

        let mut result = Vec::with_capacity(NONCE_LEN + TAG_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&tag[..]);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt a sealed record
    pub fn open(&self, sealed: &[u8]) -> StoreResult<Vec<u8>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(StoreError::DecryptionFailed(format!(
                "record too short ({} bytes)",
                sealed.len()
            )));
        }

        let (nonce, rest) = sealed.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        let mut plaintext = ciphertext.to_vec();

        self.cipher
            .decrypt_in_place_detached(nonce.into(), b"", &mut plaintext, tag.into())
            .map_err(|_| StoreError::DecryptionFailed("authentication failed".to_string()))?;

        Ok(plaintext)
    }
}

impl core::fmt::Debug for StoreCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("StoreCipher(aes-256-gcm)")
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let cipher = StoreCipher::new(&StoreSecret::generate());
        let sealed = cipher.seal(b"{\"rawKey\":\"abc\"}").unwrap();

        assert_eq!(sealed.len(), NONCE_LEN + TAG_LEN + 16);
        assert!(!sealed.windows(6).any(|w| w == b"rawKey"));
        assert_eq!(cipher.open(&sealed).unwrap(), b"{\"rawKey\":\"abc\"}");
    }

    #[test]
    fn test_wrong_secret_fails_to_open() {
        let sealed = StoreCipher::new(&StoreSecret::from_passphrase("one").unwrap())
            .seal(b"value")
            .unwrap();
        let other = StoreCipher::new(&StoreSecret::from_passphrase("two").unwrap());
        assert!(matches!(
            other.open(&sealed),
            Err(StoreError::DecryptionFailed(_))
        ));
        assert!(other.open(&sealed[..10]).is_err());
    }

    #[test]
    fn test_passphrase_derivation_is_stable() {
        let a = StoreSecret::from_passphrase("hunter2").unwrap();
        let b = StoreSecret::from_passphrase("hunter2").unwrap();
        assert_eq!(a.0, b.0);
        assert!(StoreSecret::from_passphrase("").is_err());
    }

    #[test]
    fn test_device_key_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEVICE_KEY_FILE);

        let first = StoreSecret::load_or_create_device_key(&path).unwrap();
        let second = StoreSecret::load_or_create_device_key(&path).unwrap();
        assert_eq!(first.0, second.0);

        fs::write(&path, [0u8; 5]).unwrap();
        assert!(StoreSecret::load_or_create_device_key(&path).is_err());
    }
}
