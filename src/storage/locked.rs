//! Cross-process locked file access
//!
//! Every store file `name` gets two hidden siblings:
//!
//! - `.name.lock` carries the `fs2` advisory lock (shared for readers,
//!   exclusive for writers)
//! - `.name.tmp` receives new contents before being renamed over `name`
//!
//! Locking a sidecar instead of the file itself keeps the lock valid across
//! the rename, so a reader never sees a half-written file and two writers
//! never interleave.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{Result, StoreError};

/// Lock and permission settings shared by both stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// How long to wait for a contended lock before giving up
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Delay between lock attempts while contended
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,

    /// Mode for created directories (Unix only)
    pub dir_mode: u32,

    /// Mode for files created empty by `init` (Unix only)
    pub create_mode: u32,

    /// Mode applied on every write (Unix only)
    pub write_mode: u32,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
            dir_mode: 0o751,
            create_mode: 0o644,
            write_mode: 0o600,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    Shared,
    Exclusive,
}

/// Releases the advisory lock when dropped
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// A single file read and written under a cross-process lock
#[derive(Debug, Clone)]
pub struct LockedFile {
    path: PathBuf,
    lock_path: PathBuf,
    temp_path: PathBuf,
    options: LockOptions,
}

impl LockedFile {
    /// Creates a locked file handle with default options
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, LockOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: LockOptions) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lock_path = path.with_file_name(format!(".{}.lock", name));
        let temp_path = path.with_file_name(format!(".{}.tmp", name));

        Self {
            path,
            lock_path,
            temp_path,
            options,
        }
    }

    /// Returns the path of the guarded file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the sidecar lock file
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Lock timeout and file modes this handle was created with
    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Creates the parent directory and an empty file if they are missing.
    ///
    /// Existing directories and files are left untouched.
    pub fn ensure_exists(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent, self.options.dir_mode).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut open = OpenOptions::new();
        open.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open.mode(self.options.create_mode);
        }
        open.open(&self.path).map_err(|source| StoreError::CreateFile {
            path: self.path.clone(),
            source,
        })?;

        trace!(path = %self.path.display(), "ensured file exists");
        Ok(())
    }

    /// Reads the whole file under a shared lock
    pub fn read(&self) -> Result<Vec<u8>> {
        let _guard = self.lock(LockKind::Shared)?;

        let data = fs::read(&self.path).map_err(|e| StoreError::io("read", &self.path, e))?;

        debug!(path = %self.path.display(), bytes = data.len(), "read locked file");
        Ok(data)
    }

    /// Replaces the file contents under an exclusive lock.
    ///
    /// The data goes to a temp file first and is renamed into place, so the
    /// file holds either the old or the new contents, never a mix.
    pub fn write(&self, data: &[u8], mode: u32) -> Result<()> {
        let _guard = self.lock(LockKind::Exclusive)?;

        if let Err(e) = self.write_temp(data, mode) {
            let _ = fs::remove_file(&self.temp_path);
            return Err(e);
        }

        fs::rename(&self.temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&self.temp_path);
            StoreError::io("replace", &self.path, e)
        })?;

        debug!(path = %self.path.display(), bytes = data.len(), "wrote locked file");
        Ok(())
    }

    fn write_temp(&self, data: &[u8], mode: u32) -> Result<()> {
        let write_err = |e: io::Error| StoreError::io("write", &self.temp_path, e);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(write_err)?;

        file.write_all(data).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        set_mode(&self.temp_path, mode).map_err(write_err)?;

        Ok(())
    }

    fn lock(&self, kind: LockKind) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| StoreError::io("open lock file for", &self.path, e))?;

        // an unrepresentable deadline means wait forever
        let deadline = Instant::now().checked_add(self.options.timeout);
        let mut contended = false;

        loop {
            let attempt = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file),
            };

            match attempt {
                Ok(()) => {
                    trace!(path = %self.path.display(), ?kind, contended, "acquired lock");
                    return Ok(LockGuard { file });
                }
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    let mut wait = self.options.poll_interval;
                    if let Some(deadline) = deadline {
                        if now >= deadline {
                            return Err(StoreError::LockTimeout {
                                path: self.path.clone(),
                                timeout: self.options.timeout,
                            });
                        }
                        wait = wait.min(deadline - now);
                    }
                    if !contended {
                        trace!(path = %self.path.display(), ?kind, "waiting for lock");
                        contended = true;
                    }
                    thread::sleep(wait);
                }
                Err(source) => {
                    return Err(StoreError::Lock {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
    }
}

/// Reads `path` under a shared lock with default options
pub fn read_locked(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    LockedFile::new(path.as_ref()).read()
}

/// Atomically replaces `path` under an exclusive lock with default options
pub fn write_locked(path: impl AsRef<Path>, data: &[u8], mode: u32) -> Result<()> {
    LockedFile::new(path.as_ref()).write(data, mode)
}

fn is_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    match (err.raw_os_error(), fs2::lock_contended_error().raw_os_error()) {
        (Some(code), Some(contended)) => code == contended,
        _ => false,
    }
}

fn create_dir_all(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
