//! File-backed durable namespace
//!
//! One file per key inside the application data directory. File names are
//! the hex encoding of the key so arbitrary key strings are safe on every
//! platform. Every write goes to its own temporary file in the same directory
//! and is renamed into place, so a crash never leaves a half-written record
//! behind and concurrent writers to one key resolve to a single complete
//! record.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::DurableNamespace;
use crate::errors::{StoreError, StoreResult};

const RECORD_EXTENSION: &str = "rec";

/// Durable namespace rooted at a directory
#[derive(Debug, Clone)]
pub struct FileNamespace {
    root: PathBuf,
}

impl FileNamespace {
    /// Open (creating if needed) a namespace directory
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!("Opened file namespace at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", hex::encode(key.as_bytes()), RECORD_EXTENSION))
    }
}

impl DurableNamespace for FileNamespace {
    fn retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.record_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn store(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let path = self.record_path(key);

        let mut file = NamedTempFile::new_in(&self.root)?;
        file.write_all(&data)?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn list_keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some(key) = hex::decode(stem)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn is_available(&self) -> bool {
        self.root.is_dir()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
