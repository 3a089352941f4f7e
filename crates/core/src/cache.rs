//! Memoized dataset loading.
//!
//! Entries are keyed by canonical file path and remember the file's
//! fingerprint (length + modification time) at load time. An entry is only
//! served while the file on disk still has that fingerprint; otherwise it is
//! reloaded and replaced. `invalidate` and `clear` drop entries explicitly.

use crate::error::{Error, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// What a cached entry was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileFingerprint {
    /// Fingerprint of the file currently at `path`
    pub fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| Error::unavailable(path, e))?;
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

struct CacheEntry<T> {
    fingerprint: FileFingerprint,
    value: Arc<T>,
}

/// Bounded LRU cache of loaded datasets (rasters, boundary sets, tables).
pub struct DatasetCache<T> {
    inner: LruCache<PathBuf, CacheEntry<T>>,
    loads: usize,
}

impl<T> DatasetCache<T> {
    /// Create a new cache holding at most `capacity` datasets.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
            loads: 0,
        }
    }

    /// Return the cached value for `path`, loading it with `load` if absent
    /// or if the file changed since it was cached.
    pub fn get_or_load<F>(&mut self, path: impl AsRef<Path>, load: F) -> Result<Arc<T>>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).map_err(|e| Error::unavailable(path, e))?;
        let fingerprint = FileFingerprint::of(&key)?;

        if let Some(entry) = self.inner.get(&key) {
            if entry.fingerprint == fingerprint {
                debug!("cache hit: {}", key.display());
                return Ok(Arc::clone(&entry.value));
            }
            debug!("cache stale: {}", key.display());
        }

        let value = Arc::new(load(&key)?);
        self.loads += 1;
        self.inner.put(
            key,
            CacheEntry {
                fingerprint,
                value: Arc::clone(&value),
            },
        );
        Ok(value)
    }

    /// Drop the entry for `path`. Returns whether an entry was present.
    pub fn invalidate(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.inner.pop(&key).is_some()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Number of loads performed (cache misses).
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Number of datasets currently cached.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
