//! Application identity and per-user file locations
//!
//! Config: `<config_dir>/<app>/config.yaml`
//! Cache:  `<cache_dir>/<app>`

use std::fmt;
use std::path::{Path, PathBuf};

use directories::BaseDirs;

use super::{Result, StoreError};

/// Name of the application owning the config and cache files
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    /// Validates an application name.
    ///
    /// The name becomes a single path component, so it must be non-empty,
    /// must not be `.` or `..` and must not contain a path separator.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
            || name.contains('\0');
        if invalid {
            return Err(StoreError::InvalidAppName(name));
        }
        Ok(Self(name))
    }

    /// Derives the name from the running executable's file stem
    pub fn from_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|_| StoreError::PathResolution {
            kind: "executable",
        })?;
        let stem = exe
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or(StoreError::PathResolution { kind: "executable" })?;
        Self::new(stem)
    }

    /// The validated name, as used for the directory components
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns `<config_dir>/<app>/config.yaml`
pub fn config_file(app: &AppName) -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or(StoreError::PathResolution { kind: "config" })?;
    Ok(config_file_in(dirs.config_dir(), app))
}

/// Returns `<cache_dir>/<app>`
pub fn cache_file(app: &AppName) -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or(StoreError::PathResolution { kind: "cache" })?;
    Ok(cache_file_in(dirs.cache_dir(), app))
}

pub(crate) fn config_file_in(config_dir: &Path, app: &AppName) -> PathBuf {
    config_dir.join(app.as_str()).join("config.yaml")
}

pub(crate) fn cache_file_in(cache_dir: &Path, app: &AppName) -> PathBuf {
    cache_dir.join(app.as_str())
}

/// Where a store keeps its file: derived from the app name at `init`, or fixed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Location {
    App(AppName),
    Path(PathBuf),
}

impl Location {
    pub(crate) fn config_file(&self) -> Result<PathBuf> {
        match self {
            Location::App(app) => config_file(app),
            Location::Path(path) => Ok(path.clone()),
        }
    }

    pub(crate) fn cache_file(&self) -> Result<PathBuf> {
        match self {
            Location::App(app) => cache_file(app),
            Location::Path(path) => Ok(path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(AppName::new("mytool").unwrap().as_str(), "mytool");
        assert_eq!(AppName::new("my-tool.v2").unwrap().to_string(), "my-tool.v2");
    }

    #[test]
    fn rejects_path_like_names() {
        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(AppName::new(bad), Err(StoreError::InvalidAppName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn file_layout() {
        let app = AppName::new("demo").unwrap();
        assert_eq!(
            config_file_in(Path::new("/home/u/.config"), &app),
            PathBuf::from("/home/u/.config/demo/config.yaml")
        );
        assert_eq!(
            cache_file_in(Path::new("/home/u/.cache"), &app),
            PathBuf::from("/home/u/.cache/demo")
        );
    }

    #[test]
    fn current_exe_name_is_valid() {
        let app = AppName::from_current_exe().unwrap();
        assert!(!app.as_str().is_empty());
    }
}
