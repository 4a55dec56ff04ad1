//! localstate - config and cache files for command-line programs
//!
//! Two small stores for state that must outlive a single process:
//!
//! - [`ConfigStore`] keeps a YAML document under the user's config directory
//!   and can answer yq-style queries against it
//! - [`CacheStore`] keeps `key=value` strings under the user's cache directory
//!
//! Both sit on [`LockedFile`], which lets several processes share one file
//! without lost updates or torn reads.
//!
//! ```no_run
//! use localstate::{AppName, CacheStore, ConfigStore};
//!
//! # fn main() -> localstate::Result<()> {
//! let app = AppName::new("mytool")?;
//!
//! let mut config = ConfigStore::new(app.clone());
//! config.init()?;
//! let editor = config.query(".editor")?;
//!
//! let cache = CacheStore::open(app)?;
//! cache.set("last-editor", editor)?;
//! # Ok(())
//! # }
//! ```

pub mod format;
pub mod query;
pub mod storage;

pub use query::{Query, QueryError};
pub use storage::{
    AppName, CacheStore, ConfigStore, LockOptions, LockedFile, Result, StoreError,
};
