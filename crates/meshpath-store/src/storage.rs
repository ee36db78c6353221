//! The [`Storage`] trait and its two implementations.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use meshpath_protocol::{Value, serial};
use sha2::{Digest, Sha224};

use crate::StoreError;

/// Blocking, address-keyed value storage.
///
/// Keys are service addresses (`/wiki/home`, `/login/alice`). Calls may
/// block on disk I/O, so services never call a `Storage` directly; they go
/// through [`Persistence`](crate::Persistence), which runs them off the
/// connection path.
pub trait Storage: Send + Sync + 'static {
    /// Returns `true` if something is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Reads the value stored under `key`, or `None` if there is none.
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError>;
}

/// Maps an address to its file name: the hex SHA-224 of the address.
///
/// Hashing keeps arbitrary client-chosen addresses (slashes, `..`,
/// unicode) out of the file system namespace.
pub fn storage_file_name(key: &str) -> String {
    hex::encode(Sha224::digest(key.as_bytes()))
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// One file per key under a root directory, holding the serializer's
/// encoding of the value.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        tracing::info!(root = %root.display(), "file storage opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(storage_file_name(key))
    }
}

impl Storage for FileStorage {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(key).is_file())
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io { key: key.to_string(), source });
            }
        };
        serial::decode(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { key: key.to_string(), source })
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let bytes = serial::encode(value)?;
        let path = self.path_for(key);
        let io_err = |source: std::io::Error| StoreError::Io { key: key.to_string(), source };

        // Write a sibling file and rename it over the old one, so a crash
        // mid-write never leaves a truncated value behind.
        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Keeps everything in a map. Used when no data directory is configured,
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}
