//! YAML config store
//!
//! The config lives in `<config_dir>/<app>/config.yaml`. Nothing is cached
//! in memory: every read and query goes back to disk, so several processes
//! sharing the file always see the latest complete write.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::dirs::{AppName, Location};
use super::locked::{LockOptions, LockedFile};
use super::{Result, StoreError};
use crate::format;
use crate::query::Query;

/// Store for a single YAML config document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    location: Location,
    options: LockOptions,
    file: Option<LockedFile>,
}

impl ConfigStore {
    /// Creates a store for the given application. Call [`init`](Self::init)
    /// before anything else.
    pub fn new(app: AppName) -> Self {
        Self {
            location: Location::App(app),
            options: LockOptions::default(),
            file: None,
        }
    }

    /// Creates a store bound to an explicit file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::Path(path.into()),
            options: LockOptions::default(),
            file: None,
        }
    }

    /// Overrides the lock timeout and file modes used once initialized
    pub fn with_options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolves the config path and creates the directory and an empty file
    /// if absent. Safe to call more than once.
    pub fn init(&mut self) -> Result<()> {
        let path = self.location.config_file()?;
        let file = LockedFile::with_options(path, self.options.clone());
        file.ensure_exists()?;

        debug!(path = %file.path().display(), "initialized config store");
        self.file = Some(file);
        Ok(())
    }

    /// Returns the config file path, once initialized
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(LockedFile::path)
    }

    fn file(&self) -> Result<&LockedFile> {
        self.file
            .as_ref()
            .ok_or(StoreError::NotInitialized { store: "config" })
    }

    /// Reads the config and decodes it into `T`
    pub fn read<T: DeserializeOwned>(&self) -> Result<T> {
        let file = self.file()?;
        let data = file.read()?;

        format::from_yaml(&data).map_err(|source| StoreError::Decode {
            path: file.path().to_path_buf(),
            source,
        })
    }

    /// Like [`read`](Self::read), but an empty file yields `T::default()`
    pub fn read_or_default<T: DeserializeOwned + Default>(&self) -> Result<T> {
        let file = self.file()?;
        let data = file.read()?;

        format::from_yaml_or_default(&data).map_err(|source| StoreError::Decode {
            path: file.path().to_path_buf(),
            source,
        })
    }

    /// Encodes `value` as YAML and replaces the config file with it
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let file = self.file()?;

        let data = format::to_yaml(value).map_err(|source| StoreError::Encode {
            path: file.path().to_path_buf(),
            source,
        })?;

        file.write(&data, file.options().write_mode)
    }

    /// Evaluates a query such as `.foo` or `.servers[0].name` against the
    /// config file and returns the rendered result
    pub fn query(&self, expr: &str) -> Result<String> {
        let file = self.file()?;
        evaluate_in(expr, file)
    }
}

/// Evaluates a query against the YAML file at `path`, reading it under a
/// shared lock.
///
/// A query that matches nothing returns an empty string.
pub fn evaluate(expr: &str, path: impl AsRef<Path>) -> Result<String> {
    evaluate_in(expr, &LockedFile::new(path.as_ref()))
}

fn evaluate_in(expr: &str, file: &LockedFile) -> Result<String> {
    let query = Query::parse(expr).map_err(|e| StoreError::query(expr, file.path(), e))?;

    let data = file.read()?;
    query
        .evaluate_yaml(&data)
        .map_err(|e| StoreError::query(expr, file.path(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct MyCfg {
        foo: String,
        bar: bool,
        blah: i32,
    }

    fn sample() -> MyCfg {
        MyCfg {
            foo: "foo".to_string(),
            bar: true,
            blah: 100,
        }
    }

    fn store(dir: &TempDir) -> ConfigStore {
        let mut store = ConfigStore::at(dir.path().join("app").join("config.yaml"));
        store.init().unwrap();
        store
    }

    #[test]
    fn operations_before_init_fail() {
        let store = ConfigStore::at("/nonexistent/config.yaml");

        assert!(store.path().is_none());
        assert!(matches!(
            store.read::<MyCfg>(),
            Err(StoreError::NotInitialized { store: "config" })
        ));
        assert!(matches!(
            store.write(&sample()),
            Err(StoreError::NotInitialized { .. })
        ));
        assert!(matches!(
            store.query(".foo"),
            Err(StoreError::NotInitialized { .. })
        ));
    }

    #[test]
    fn init_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let path = store.path().unwrap();
        assert!(path.is_file());
        assert_eq!(std::fs::read(path).unwrap(), b"");
    }

    #[test]
    fn write_read_query() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.write(&sample()).unwrap();

        let back: MyCfg = store.read().unwrap();
        assert_eq!(back, sample());
        assert_eq!(store.query(".foo").unwrap(), "foo");
        assert_eq!(store.query(".blah").unwrap(), "100");
    }

    #[test]
    fn reinit_keeps_contents() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.write(&sample()).unwrap();

        store.init().unwrap();
        assert_eq!(store.read::<MyCfg>().unwrap(), sample());
    }

    #[test]
    fn empty_file_reads_as_default() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert_eq!(store.read_or_default::<MyCfg>().unwrap(), MyCfg::default());
        assert!(matches!(
            store.read::<MyCfg>(),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn incompatible_shape_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write(&vec!["a", "b"]).unwrap();

        assert!(matches!(
            store.read::<MyCfg>(),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn query_errors_are_distinct() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write(&sample()).unwrap();

        assert!(matches!(
            store.query(".foo["),
            Err(StoreError::QuerySyntax { .. })
        ));

        std::fs::write(store.path().unwrap(), "foo: [unclosed\n").unwrap();
        assert!(matches!(store.query(".foo"), Err(StoreError::Decode { .. })));

        assert!(matches!(
            evaluate(".foo", dir.path().join("missing.yaml")),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn syntax_error_reported_even_for_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            evaluate("][", dir.path().join("missing.yaml")),
            Err(StoreError::QuerySyntax { .. })
        ));
    }

    #[test]
    fn unmatched_filter_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write(&sample()).unwrap();

        assert_eq!(store.query("select(.bar == false)").unwrap(), "");
    }

    #[cfg(unix)]
    #[test]
    fn written_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.write(&sample()).unwrap();

        let mode = std::fs::metadata(store.path().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
