//! Key-value cache persisted between invocations
//!
//! The cache lives in `<cache_dir>/<app>` as `key=value` lines. It is loaded
//! into memory on `init`; reads are served from memory and every mutation
//! rewrites the whole file.
//!
//! The map mutex is held across mutate, serialize and write, so persistence
//! within one process is serialized and a failed write rolls the in-memory
//! change back. Separate processes do not merge: each write is a full
//! snapshot of that process's view, and the last one wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::dirs::{AppName, Location};
use super::locked::{LockOptions, LockedFile};
use super::{Result, StoreError};
use crate::format;

/// Thread-safe string cache backed by a flat file
#[derive(Debug)]
pub struct CacheStore {
    location: Location,
    options: LockOptions,
    file: Option<LockedFile>,
    entries: Mutex<HashMap<String, String>>,
}

impl CacheStore {
    /// Creates a cache for the given application. Call [`init`](Self::init)
    /// before anything else.
    pub fn new(app: AppName) -> Self {
        Self::with_location(Location::App(app))
    }

    /// Creates a cache bound to an explicit file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self::with_location(Location::Path(path.into()))
    }

    fn with_location(location: Location) -> Self {
        Self {
            location,
            options: LockOptions::default(),
            file: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the lock timeout and file modes used once initialized
    pub fn with_options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    /// Creates and initializes the cache for `app` in one step
    pub fn open(app: AppName) -> Result<Self> {
        let mut cache = Self::new(app);
        cache.init()?;
        Ok(cache)
    }

    /// Creates the cache file if absent and loads its entries.
    /// Safe to call more than once.
    pub fn init(&mut self) -> Result<()> {
        let path = self.location.cache_file()?;
        let file = LockedFile::with_options(path, self.options.clone());
        file.ensure_exists()?;

        let loaded = load(&file)?;
        debug!(path = %file.path().display(), entries = loaded.len(), "initialized cache store");

        *self.entries.get_mut() = loaded;
        self.file = Some(file);
        Ok(())
    }

    /// Returns the cache file path, once initialized
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(LockedFile::path)
    }

    fn file(&self) -> Result<&LockedFile> {
        self.file
            .as_ref()
            .ok_or(StoreError::NotInitialized { store: "cache" })
    }

    /// Returns the value for `key`, or an empty string if absent
    pub fn get(&self, key: &str) -> Result<String> {
        self.file()?;
        Ok(self.entries.lock().get(key).cloned().unwrap_or_default())
    }

    /// Whether `key` is present
    pub fn exists(&self, key: &str) -> Result<bool> {
        self.file()?;
        Ok(self.entries.lock().contains_key(key))
    }

    /// Adds or updates an entry and persists the cache
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let file = self.file()?;
        let key = key.into();

        let mut entries = self.entries.lock();
        let previous = entries.insert(key.clone(), value.into());

        if let Err(e) = persist(file, &entries) {
            warn!(key = %key, error = %e, "cache write failed, reverting set");
            match previous {
                Some(old) => entries.insert(key, old),
                None => entries.remove(&key),
            };
            return Err(e);
        }

        Ok(())
    }

    /// Removes an entry (no-op if absent) and persists the cache
    pub fn del(&self, key: &str) -> Result<()> {
        let file = self.file()?;

        let mut entries = self.entries.lock();
        let previous = entries.remove(key);

        if let Err(e) = persist(file, &entries) {
            warn!(key = %key, error = %e, "cache write failed, reverting del");
            if let Some(old) = previous {
                entries.insert(key.to_string(), old);
            }
            return Err(e);
        }

        Ok(())
    }

    /// Replaces the in-memory entries with the current file contents
    pub fn reload(&self) -> Result<()> {
        let file = self.file()?;
        let mut entries = self.entries.lock();
        *entries = load(file)?;
        Ok(())
    }

    /// Returns all keys, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        self.file()?;
        let mut keys: Vec<_> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        self.file()?;
        Ok(self.entries.lock().len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns a copy of all entries
    pub fn snapshot(&self) -> Result<HashMap<String, String>> {
        self.file()?;
        Ok(self.entries.lock().clone())
    }
}

fn load(file: &LockedFile) -> Result<HashMap<String, String>> {
    let data = file.read()?;
    format::from_flat(&data).map_err(|source| StoreError::Decode {
        path: file.path().to_path_buf(),
        source,
    })
}

fn persist(file: &LockedFile, entries: &HashMap<String, String>) -> Result<()> {
    file.write(&format::to_flat(entries), file.options().write_mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> CacheStore {
        let mut cache = CacheStore::at(dir.path().join("cache").join("app"));
        cache.init().unwrap();
        cache
    }

    #[test]
    fn fresh_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        assert!(!cache.exists("anything").unwrap());
        assert!(cache.is_empty().unwrap());
        assert_eq!(fs::read(cache.path().unwrap()).unwrap(), b"");
    }

    #[test]
    fn operations_before_init_fail() {
        let cache = CacheStore::at("/nonexistent/app");

        assert!(matches!(
            cache.get("foo"),
            Err(StoreError::NotInitialized { store: "cache" })
        ));
        assert!(matches!(cache.exists("foo"), Err(StoreError::NotInitialized { .. })));
        assert!(matches!(cache.set("foo", "bar"), Err(StoreError::NotInitialized { .. })));
        assert!(matches!(cache.del("foo"), Err(StoreError::NotInitialized { .. })));
    }

    #[test]
    fn set_get_exists() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.set("foo", "bar").unwrap();
        assert_eq!(cache.get("foo").unwrap(), "bar");
        assert!(cache.exists("foo").unwrap());
        assert!(!cache.exists("missing").unwrap());
        assert_eq!(cache.get("missing").unwrap(), "");
    }

    #[test]
    fn set_then_del() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.set("foo", "bar").unwrap();
        cache.del("foo").unwrap();

        assert_eq!(cache.get("foo").unwrap(), "");
        assert!(!cache.exists("foo").unwrap());
        assert_eq!(fs::read(cache.path().unwrap()).unwrap(), b"");
    }

    #[test]
    fn del_missing_key_is_noop() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.set("keep", "1").unwrap();
        cache.del("missing").unwrap();
        assert_eq!(cache.keys().unwrap(), vec!["keep"]);
    }

    #[test]
    fn disk_mirrors_memory() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache.set("b", "two\nlines").unwrap();
        cache.set("a", "1").unwrap();

        let on_disk = fs::read_to_string(cache.path().unwrap()).unwrap();
        assert_eq!(on_disk, "a=1\nb=two\\nlines\n");
    }

    #[test]
    fn init_loads_previous_state() {
        let dir = TempDir::new().unwrap();
        cache(&dir).set("token", "abc=123\r\n").unwrap();

        let reopened = cache(&dir);
        assert_eq!(reopened.get("token").unwrap(), "abc=123\r\n");
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn reload_picks_up_other_writers() {
        let dir = TempDir::new().unwrap();
        let first = cache(&dir);
        let second = cache(&dir);

        second.set("from", "second").unwrap();
        assert!(!first.exists("from").unwrap());

        first.reload().unwrap();
        assert_eq!(first.get("from").unwrap(), "second");
    }

    #[test]
    fn failed_write_rolls_back() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.set("kept", "yes").unwrap();

        fs::remove_dir_all(dir.path().join("cache")).unwrap();

        assert!(cache.set("lost", "value").is_err());
        assert!(!cache.exists("lost").unwrap());

        assert!(cache.set("kept", "changed").is_err());
        assert_eq!(cache.get("kept").unwrap(), "yes");

        assert!(cache.del("kept").is_err());
        assert_eq!(cache.get("kept").unwrap(), "yes");
    }

    #[test]
    fn concurrent_sets_all_persist() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(cache(&dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..10 {
                        cache.set(format!("k{}-{}", i, j), format!("v{}", j)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let on_disk = format::from_flat(&fs::read(cache.path().unwrap()).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 80);
        assert_eq!(on_disk, cache.snapshot().unwrap());
    }
}
