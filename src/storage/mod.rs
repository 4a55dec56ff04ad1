//! # Storage Layer
//!
//! Per-user files shared safely between repeated invocations of a program.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Config | YAML | `<config_dir>/<app>/config.yaml` |
//! | Cache | `key=value` lines | `<cache_dir>/<app>` |
//!
//! ## Concurrency Safety
//!
//! - [`LockedFile`] takes `fs2` advisory locks on a `.name.lock` sidecar:
//!   shared for reads, exclusive for writes, bounded by [`LockOptions::timeout`]
//! - All writes are atomic (temp file + rename)
//! - [`CacheStore`] guards its map with one mutex held through persistence
//!
//! ## Key Types
//!
//! - [`ConfigStore`] - Read, write and query the YAML config
//! - [`CacheStore`] - Get/set/del string values that survive between runs
//! - [`AppName`] - Application identity used to derive file locations

mod cache;
mod config;
mod dirs;
mod error;
mod locked;

pub use cache::CacheStore;
pub use config::{evaluate, ConfigStore};
pub use dirs::{cache_file, config_file, AppName};
pub use error::{Result, StoreError};
pub use locked::{read_locked, write_locked, LockOptions, LockedFile};
