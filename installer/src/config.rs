//! Runtime configuration for the install pipeline.

use crate::cache::ArtifactCache;
use crate::fetch::HttpFetcher;
use crate::progress::ProgressMode;
use camino::Utf8PathBuf;
use std::time::Duration;

/// Timeout applied to a fetch when none is configured.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Network settings for the HTTP fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Upper bound on connecting and on waiting for the response head. The
    /// body transfer is not limited.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl FetchConfig {
    /// Build the HTTP fetcher for these settings.
    #[must_use]
    pub fn fetcher(&self) -> HttpFetcher {
        HttpFetcher::new(self.timeout)
    }
}

/// Settings shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory holding cached artifacts.
    pub cache_dir: Utf8PathBuf,
    /// Network settings.
    pub fetch: FetchConfig,
    /// Suppress progress bars.
    pub quiet: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let cache_dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap_or_else(|path| Utf8PathBuf::from(path.to_string_lossy().into_owned()));
        Self {
            cache_dir,
            fetch: FetchConfig::default(),
            quiet: false,
        }
    }
}

impl PipelineConfig {
    /// Build the artifact cache for these settings.
    #[must_use]
    pub fn cache(&self) -> ArtifactCache {
        let progress = if self.quiet {
            ProgressMode::Hidden
        } else {
            ProgressMode::Visible
        };
        ArtifactCache::new(self.cache_dir.as_std_path()).with_progress(progress)
    }

    /// Build the HTTP fetcher for these settings.
    #[must_use]
    pub fn fetcher(&self) -> HttpFetcher {
        self.fetch.fetcher()
    }
}
