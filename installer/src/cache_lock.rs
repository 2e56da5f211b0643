//! Advisory per-entry locking for the artifact cache.
//!
//! Two processes fetching the same URL would otherwise race on the shared
//! `.tmp` file. Each entry gets a sibling `<entry>.lock` file held with an
//! exclusive `fs2` lock for the duration of a download. Lock files are left
//! in place after release.

use fs2::FileExt;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to a cache entry path to form its lock file.
pub const LOCK_SUFFIX: &str = "lock";

/// Return the lock file path for a cache entry.
///
/// # Examples
///
/// ```
/// use pantry_installer::cache_lock::lock_path_for;
/// use std::path::Path;
///
/// assert_eq!(
///     lock_path_for(Path::new("/cache/ABCD.exe")),
///     Path::new("/cache/ABCD.exe.lock"),
/// );
/// ```
#[must_use]
pub fn lock_path_for(entry: &Path) -> PathBuf {
    let mut name = entry.as_os_str().to_owned();
    name.push(".");
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// An exclusive lock on one cache entry, released on drop.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block until the lock for `entry` is held by this process.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the lock file cannot be opened or locked.
    pub fn acquire(entry: &Path) -> io::Result<Self> {
        let path = lock_path_for(entry);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        debug!("waiting for cache lock {}", path.display());
        file.lock_exclusive()?;
        debug!("acquired cache lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("failed to release cache lock {}: {err}", self.path.display());
        }
    }
}
