//! Best-effort memoization of probe results, keyed by registry and name.
//!
//! The cache never fails its caller: storage or encoding problems are logged
//! and turn into a miss (reads) or a no-op (writes).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::check::ProbeResult;
use crate::registry::RegistryId;
use crate::sanitize::sanitize;

/// Prefix of every key this cache writes.
pub const CACHE_PREFIX: &str = "registry-check";

/// Failure inside a [`CacheStore`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("cache file {path}: {source}")]
    Io {
        /// The backing file.
        path: PathBuf,
        /// The underlying failure.
        source: io::Error,
    },
    /// Stored data could not be encoded or decoded.
    #[error("cache data is corrupt: {0}")]
    Encoding(#[from] serde_json::Error),
    /// Another thread panicked while holding the store.
    #[error("cache store lock is poisoned")]
    Poisoned,
}

/// A string key/value backend for [`ResultCache`].
///
/// Implementations must be safe to share between threads; each call is
/// independent and last write wins.
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// The value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    /// Delete `key`; deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    /// Every key currently stored, including keys this cache did not write.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Poisoned)
}

/// In-process store; entries live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        lock(&self.entries)?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.entries)?.keys().cloned().collect())
    }
}

/// Store backed by a JSON object in a file, so results survive across runs
/// until the file is cleared or deleted.
///
/// The file is created on first write; a missing file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileStore {
    /// A store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let text = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, text).map_err(|e| self.io_error(e))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = lock(&self.guard)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = lock(&self.guard)?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value);
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.guard)?;
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let _guard = lock(&self.guard)?;
        Ok(self.load()?.into_keys().collect())
    }
}

/// Probe results remembered per `(registry, sanitized name)`.
///
/// Each registry's result is stored on its own, so a later read can return a
/// partial set when only some registries were checked.
///
/// # Example
///
/// ```
/// use taken::cache::{MemoryStore, ResultCache};
/// use taken::check::{Outcome, ProbeResult};
/// use taken::registry::RegistryId;
///
/// let cache = ResultCache::new(MemoryStore::new());
/// let result = ProbeResult::new(RegistryId::Npm, "left-pad", Outcome::Available);
/// cache.put("left-pad", &[result]);
/// assert!(cache.has(RegistryId::Npm, "left-pad"));
/// assert_eq!(cache.get("left-pad").map(|r| r.len()), Some(1));
/// ```
#[derive(Debug)]
pub struct ResultCache {
    store: Box<dyn CacheStore>,
}

impl ResultCache {
    /// A cache over `store`.
    #[must_use]
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// An in-memory cache that lives as long as the value.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    // `:` is never part of a sanitized name, so distinct names never share a key.
    fn key(registry: RegistryId, name: &str) -> String {
        format!("{CACHE_PREFIX}:{registry}:{name}")
    }

    fn read(&self, registry: RegistryId, name: &str) -> Result<Option<ProbeResult>, StoreError> {
        let Some(text) = self.store.get(&Self::key(registry, name))? else {
            return Ok(None);
        };
        let result: ProbeResult = serde_json::from_str(&text)?;
        Ok((result.registry == registry && result.name == name).then_some(result))
    }

    /// Every cached result for `name`, in registry order.
    ///
    /// Returns `None` when no registry has a result for the name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<ProbeResult>> {
        let name = sanitize(name);
        let found: Vec<ProbeResult> = RegistryId::ALL
            .into_iter()
            .filter_map(|registry| match self.read(registry, &name) {
                Ok(result) => result,
                Err(e) => {
                    warn!(%registry, %name, error = %e, "ignoring unreadable cache entry");
                    None
                }
            })
            .collect();
        (!found.is_empty()).then_some(found)
    }

    /// The cached result of one registry for `name`.
    #[must_use]
    pub fn get_one(&self, registry: RegistryId, name: &str) -> Option<ProbeResult> {
        self.read(registry, &sanitize(name)).unwrap_or_else(|e| {
            warn!(%registry, error = %e, "ignoring unreadable cache entry");
            None
        })
    }

    /// Remember `results` for `name`, one entry per registry.
    pub fn put(&self, name: &str, results: &[ProbeResult]) {
        let name = sanitize(name);
        for result in results {
            let mut entry = result.clone();
            entry.name.clone_from(&name);
            let stored = serde_json::to_string(&entry)
                .map_err(StoreError::from)
                .and_then(|text| self.store.set(&Self::key(entry.registry, &name), text));
            if let Err(e) = stored {
                warn!(registry = %entry.registry, %name, error = %e, "could not cache result");
            }
        }
    }

    /// Whether `registry` has a cached result for `name`.
    #[must_use]
    pub fn has(&self, registry: RegistryId, name: &str) -> bool {
        match self.store.get(&Self::key(registry, &sanitize(name))) {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(%registry, error = %e, "cache lookup failed");
                false
            }
        }
    }

    /// Forget every result this cache wrote. Other keys in the store are kept.
    pub fn clear(&self) {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "could not list cache entries");
                return;
            }
        };
        let prefix = format!("{CACHE_PREFIX}:");
        for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            if let Err(e) = self.store.remove(key) {
                warn!(%key, error = %e, "could not remove cache entry");
            }
        }
    }
}
