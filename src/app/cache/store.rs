//! On-disk content cache with atomic writes
//!
//! Each entry is one opaque file in the cache root, named by the hex digest
//! of its key. Writes go to a temporary file in the same directory, are
//! optionally fsynced, then renamed over the final path, so a reader sees
//! either the previous entry or the complete new one.
//!
//! Operations on the same key are serialized by a per-key mutex. Every
//! per-key operation also holds the root lock for reading; `flush` takes it
//! for writing and therefore never races an in-progress `set`.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::constants::cache;
use crate::errors::{CacheError, CacheResult};

use super::config::CacheConfig;
use super::key::CacheKey;
use super::stats::{CacheStats, DirectoryScanner};

/// Key to bytes store addressed by key digest
#[derive(Debug)]
pub struct ContentCache {
    config: CacheConfig,
    /// Shared by per-key operations, exclusive for `flush`
    root_lock: RwLock<()>,
    /// Live per-key locks; an entry is dropped once nobody holds it
    key_locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ContentCache {
    /// Create a cache rooted at `config.cache_root`
    ///
    /// Nothing is touched on disk until the first write.
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            "Using content cache at {}",
            config.cache_root.display()
        );
        Self {
            config,
            root_lock: RwLock::new(()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cache root directory
    pub fn cache_root(&self) -> &Path {
        &self.config.cache_root
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Path of the entry file for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.entry_path(&CacheKey::digest(key))
    }

    fn entry_path(&self, digest: &CacheKey) -> PathBuf {
        self.config.cache_root.join(digest.to_hex())
    }

    /// Store `bytes` under `key`, replacing any existing entry
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the cache root cannot be created or the
    /// entry cannot be written and renamed into place
    pub fn set(&self, key: &str, bytes: &[u8]) -> CacheResult<()> {
        let digest = CacheKey::digest(key);
        self.with_key_lock(&digest, || {
            self.write_atomic(&self.entry_path(&digest), bytes)
        })?;
        debug!("Cached {} bytes for {} ({})", bytes.len(), key, digest);
        Ok(())
    }

    /// Store `bytes` under `key` only if no entry exists yet
    ///
    /// The existence check and the write happen under the same key lock.
    /// Returns whether the entry was written.
    pub fn set_if_absent(&self, key: &str, bytes: &[u8]) -> CacheResult<bool> {
        let digest = CacheKey::digest(key);
        let written = self.with_key_lock(&digest, || {
            let path = self.entry_path(&digest);
            if path.is_file() {
                return Ok(false);
            }
            self.write_atomic(&path, bytes).map(|()| true)
        })?;

        if written {
            debug!("Cached {} bytes for {} ({})", bytes.len(), key, digest);
        } else {
            debug!("Keeping existing cache entry for {}", key);
        }
        Ok(written)
    }

    /// Look up `key`; a missing entry is `Ok(None)`, not an error
    pub fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let digest = CacheKey::digest(key);
        let path = self.entry_path(&digest);
        self.with_key_lock(&digest, || match std::fs::read(&path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read { path, source }),
        })
    }

    /// Look up `key`, falling back to `default` on a miss
    pub fn get_or(&self, key: &str, default: Bytes) -> CacheResult<Bytes> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Check whether an entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        let digest = CacheKey::digest(key);
        self.with_key_lock(&digest, || self.entry_path(&digest).is_file())
    }

    /// Remove the entry for `key`; returns whether anything was removed
    ///
    /// Deleting a missing entry is a no-op.
    pub fn delete(&self, key: &str) -> CacheResult<bool> {
        let digest = CacheKey::digest(key);
        let path = self.entry_path(&digest);
        let removed = self.with_key_lock(&digest, || match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Remove { path, source }),
        })?;

        if removed {
            debug!("Removed cache entry for {}", key);
        }
        Ok(removed)
    }

    /// Remove every entry and the cache root itself
    ///
    /// Safe to call when the cache is empty or the root does not exist.
    pub fn flush(&self) -> CacheResult<()> {
        let _exclusive = self.root_lock.write();
        let root = &self.config.cache_root;

        match std::fs::remove_dir_all(root) {
            Ok(()) => {
                info!("Flushed content cache at {}", root.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Remove {
                path: root.clone(),
                source,
            }),
        }
    }

    /// Scan the cache root for entry statistics
    pub fn stats(&self) -> CacheStats {
        let _shared = self.root_lock.read();
        DirectoryScanner::scan(&self.config.cache_root)
    }

    /// Run `f` holding the shared root lock and the lock for `digest`
    fn with_key_lock<T>(&self, digest: &CacheKey, f: impl FnOnce() -> T) -> T {
        let _shared = self.root_lock.read();
        let lock = Arc::clone(self.key_locks.lock().entry(*digest).or_default());

        let result = {
            let _guard = lock.lock();
            f()
        };

        drop(lock);
        let mut locks = self.key_locks.lock();
        if locks
            .get(digest)
            .map_or(false, |held| Arc::strong_count(held) == 1)
        {
            locks.remove(digest);
        }
        result
    }

    /// Temp file in the cache root, fsync, rename over `final_path`
    fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> CacheResult<()> {
        let root = &self.config.cache_root;
        std::fs::create_dir_all(root).map_err(|source| CacheError::DirectoryNotAccessible {
            path: root.clone(),
            source,
        })?;

        let mut temp = tempfile::Builder::new()
            .prefix(cache::TEMP_FILE_PREFIX)
            .tempfile_in(root)
            .map_err(|source| CacheError::Write {
                path: root.clone(),
                source,
            })?;

        temp.write_all(bytes)
            .and_then(|()| temp.flush())
            .map_err(|source| CacheError::Write {
                path: temp.path().to_path_buf(),
                source,
            })?;

        if self.config.durable_writes {
            temp.as_file()
                .sync_all()
                .map_err(|source| CacheError::Write {
                    path: temp.path().to_path_buf(),
                    source,
                })?;
        }

        temp.persist(final_path)
            .map_err(|e| CacheError::AtomicOperationFailed {
                temp_path: e.file.path().to_path_buf(),
                final_path: final_path.to_path_buf(),
                source: e.error,
            })?;

        Ok(())
    }
}
