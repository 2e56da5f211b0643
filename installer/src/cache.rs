//! Deterministic on-disk cache of downloaded artifacts.
//!
//! Every URL maps to a single file inside the cache root, named by the
//! upper-case hexadecimal CRC32 of the URL text followed by an extension.
//! Downloads stream into a `<entry>.tmp` sibling and are renamed into place
//! only once the body has been read completely, so an entry that exists is
//! always whole. The CRC32 key is not collision-resistant; two URLs sharing
//! a key and an extension share an entry.

use crate::cache_lock::CacheLock;
use crate::fetch::{ContentFetcher, FetchError};
use crate::progress::{ProgressMode, TransferProgress};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix of the in-progress download file.
pub const TEMP_SUFFIX: &str = "tmp";

/// Errors arising from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The URL could not be parsed to derive an extension.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The request failed or returned a non-200 status.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A filesystem operation on the cache failed.
    #[error("failed to {operation} {}: {source}", path.display())]
    Filesystem {
        /// What was being attempted.
        operation: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The response body could not be read to completion.
    #[error("transfer from {url} was interrupted: {source}")]
    Transfer {
        /// The URL being downloaded.
        url: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    fn filesystem(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Filesystem {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Compute the cache key for `url`: its CRC32 as upper-case hex without
/// leading zeros.
///
/// # Examples
///
/// ```
/// use pantry_installer::cache::cache_key;
///
/// assert_eq!(cache_key("123456789"), "CBF43926");
/// ```
#[must_use]
pub fn cache_key(url: &str) -> String {
    format!("{:X}", crc32fast::hash(url.as_bytes()))
}

/// Derive the extension of the last path segment of `url`.
///
/// The extension is everything after the segment's last `.`; a segment
/// without one yields an empty extension. Query strings and fragments are
/// ignored.
///
/// # Errors
///
/// Returns [`CacheError::InvalidUrl`] when `url` cannot be parsed.
///
/// # Examples
///
/// ```
/// use pantry_installer::cache::url_extension;
///
/// assert_eq!(url_extension("https://host/dl/setup.exe?x=1").unwrap(), "exe");
/// assert_eq!(url_extension("https://host/dl/file").unwrap(), "");
/// ```
pub fn url_extension(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| CacheError::InvalidUrl {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    Ok(segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_owned())
        .unwrap_or_default())
}

/// Return the in-progress download path for a cache entry.
#[must_use]
pub fn temp_path_for(entry: &Path) -> PathBuf {
    let mut name = entry.as_os_str().to_owned();
    name.push(".");
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// A cache entry ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// Location of the complete file.
    pub path: PathBuf,
    /// `true` when the file was already present and no request was made.
    pub cache_hit: bool,
    /// Bytes downloaded by this call; zero on a hit.
    pub bytes_transferred: u64,
}

/// The artifact cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    timeout: Option<Duration>,
    progress: ProgressMode,
}

impl ArtifactCache {
    /// Create a cache rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: None,
            progress: ProgressMode::default(),
        }
    }

    /// Bound each whole fetch, body included, to `timeout`. Without one the
    /// fetcher's default limits only connecting and the response head.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Choose whether downloads draw a progress bar.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressMode) -> Self {
        self.progress = progress;
        self
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the cache path for `url`, using `extension` when it is
    /// non-empty and otherwise the extension of the URL's last path segment.
    ///
    /// The path is `<root>/<KEY>.<ext>`, or `<root>/<KEY>` when the
    /// extension is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidUrl`] when the extension must be derived
    /// and `url` does not parse.
    pub fn cache_path(&self, url: &str, extension: Option<&str>) -> Result<PathBuf> {
        let ext = match extension.map(|ext| ext.trim_start_matches('.')) {
            Some(ext) if !ext.is_empty() => ext.to_owned(),
            _ => url_extension(url)?,
        };
        let key = cache_key(url);
        let name = if ext.is_empty() {
            key
        } else {
            format!("{key}.{ext}")
        };
        Ok(self.root.join(name))
    }

    /// Make sure the artifact for `url` is cached, downloading it when it
    /// is missing or when `force` is set.
    ///
    /// Concurrent callers for the same entry serialize on a per-entry lock;
    /// a caller that waited re-checks the entry and reuses a download that
    /// completed meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Fetch`] when the request fails or the status is
    /// not 200, [`CacheError::Transfer`] when the body cannot be read to the
    /// end, and [`CacheError::Filesystem`] for local I/O failures. No final
    /// entry is created on any error.
    pub fn ensure(
        &self,
        fetcher: &dyn ContentFetcher,
        url: &str,
        extension: Option<&str>,
        force: bool,
    ) -> Result<CachedArtifact> {
        let path = self.cache_path(url, extension)?;
        if !force && path.is_file() {
            debug!("cache hit for {url} at {}", path.display());
            return Ok(Self::hit(path));
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| CacheError::filesystem("create cache directory", &self.root, e))?;
        let _lock = CacheLock::acquire(&path)
            .map_err(|e| CacheError::filesystem("lock cache entry", &path, e))?;
        if !force && path.is_file() {
            debug!("{url} was cached while waiting for the lock");
            return Ok(Self::hit(path));
        }

        let temp = temp_path_for(&path);
        let outcome = self.download(fetcher, url, &temp, &path);
        if outcome.is_err() && temp.exists() {
            if let Err(err) = fs::remove_file(&temp) {
                debug!("failed to remove partial download {}: {err}", temp.display());
            }
        }
        let bytes_transferred = outcome?;
        info!("Downloaded {url} to {}", path.display());
        Ok(CachedArtifact {
            path,
            cache_hit: false,
            bytes_transferred,
        })
    }

    fn hit(path: PathBuf) -> CachedArtifact {
        CachedArtifact {
            path,
            cache_hit: true,
            bytes_transferred: 0,
        }
    }

    fn download(
        &self,
        fetcher: &dyn ContentFetcher,
        url: &str,
        temp: &Path,
        path: &Path,
    ) -> Result<u64> {
        info!("Downloading {url}");
        let mut response = fetcher.fetch(url, self.timeout)?.require_ok(url)?;

        let file = File::create(temp)
            .map_err(|e| CacheError::filesystem("create temporary file", temp, e))?;
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let progress = TransferProgress::start(&label, response.content_length, self.progress);
        let mut writer = progress.writer(file);
        let copied = copy_body(&mut response.body, &mut writer, url, temp)?;
        let file = writer.into_inner();
        file.sync_all()
            .map_err(|e| CacheError::filesystem("sync temporary file", temp, e))?;
        drop(file);
        progress.finish();

        fs::rename(temp, path)
            .map_err(|e| CacheError::filesystem("move download into place", path, e))?;
        Ok(copied)
    }
}

/// Copy the body to the writer, separating read failures from write ones.
fn copy_body(
    body: &mut dyn io::Read,
    writer: &mut impl Write,
    url: &str,
    temp: &Path,
) -> Result<u64> {
    let mut buf = [0_u8; 64 * 1024];
    let mut total = 0_u64;
    loop {
        let read = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(CacheError::Transfer {
                    url: url.to_owned(),
                    source,
                });
            }
        };
        let chunk = buf.get(..read).unwrap_or_default();
        writer
            .write_all(chunk)
            .map_err(|e| CacheError::filesystem("write temporary file", temp, e))?;
        total += read as u64;
    }
    writer
        .flush()
        .map_err(|e| CacheError::filesystem("flush temporary file", temp, e))?;
    Ok(total)
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
