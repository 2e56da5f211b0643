//! Install pipeline orchestration.
//!
//! A single install expands the URL against the environment, makes sure the
//! artifact is cached, optionally unpacks it, and finally runs the installer
//! with the arguments its [`InstallerKind`] calls for. Every stage reports a
//! typed error, so a batch of installs can record one package's failure and
//! carry on with the next.

use crate::cache::{ArtifactCache, CachedArtifact};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::{ArchiveExtractor, DefaultExtractor};
use crate::fetch::{ContentFetcher, HttpFetcher};
use crate::invocation::{InstallerKind, build_invocation};
use crate::runner::{CommandExecutor, ProcessRunner, RunOutcome, SystemCommandExecutor};
use log::{debug, info};
use pantry_common::EnvironmentContext;
use std::path::PathBuf;

/// One package to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// URL template of the installer artifact.
    pub url: String,
    /// Cache file extension, overriding the one in the URL.
    pub extension: Option<String>,
    /// Download even when the artifact is already cached.
    pub force: bool,
    /// Directory template to unpack the artifact into, if it is an archive.
    pub extract_to: Option<String>,
    /// How to turn the artifact into a command line.
    pub kind: InstallerKind,
    /// Extra argument templates appended to the preset.
    pub arguments: Vec<String>,
    /// Variables overlaid on the environment for this request only.
    pub overrides: Vec<(String, String)>,
}

impl InstallRequest {
    /// Create a request that downloads `url` and runs it as-is.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extension: None,
            force: false,
            extract_to: None,
            kind: InstallerKind::default(),
            arguments: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// Store the artifact under `extension` instead of the URL's.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Choose whether to bypass the cache.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Unpack the artifact into `target` before running anything.
    #[must_use]
    pub fn with_extract_to(mut self, target: impl Into<String>) -> Self {
        self.extract_to = Some(target.into());
        self
    }

    /// Use the preset for `kind`.
    #[must_use]
    pub fn with_kind(mut self, kind: InstallerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Append argument templates after the preset.
    #[must_use]
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Define `name` for this request's templates.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((name.into(), value.into()));
        self
    }
}

/// What a completed install did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// The cache entry that was used.
    pub artifact: CachedArtifact,
    /// Where the artifact was unpacked, if it was.
    pub extracted_to: Option<PathBuf>,
    /// The argument vector that was run.
    pub invocation: Vec<String>,
    /// How the run ended.
    pub outcome: RunOutcome,
}

/// The collaborators a pipeline run uses.
pub struct PipelineDeps<'a> {
    /// Cache to store artifacts in.
    pub cache: &'a ArtifactCache,
    /// Source of artifact bytes.
    pub fetcher: &'a dyn ContentFetcher,
    /// Archive unpacker.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Process launcher.
    pub executor: &'a dyn CommandExecutor,
}

/// Install one package against an environment snapshot.
///
/// # Errors
///
/// Returns the first stage failure: template expansion, fetching, extraction
/// or the installer run. Templates are all expanded up front, so an
/// undefined variable fails before anything is downloaded or extracted.
pub fn install_with(
    request: &InstallRequest,
    env: &EnvironmentContext,
    deps: &PipelineDeps<'_>,
) -> Result<InstallReport> {
    let context = env.clone().with_overrides(
        request
            .overrides
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str())),
    );

    let url = context.expand(&request.url)?;
    debug!("expanded {} to {url}", request.url);
    let extension = request.extension.as_deref();
    let target = request
        .extract_to
        .as_deref()
        .map(|template| context.expand(template).map(PathBuf::from))
        .transpose()?;
    // Every template is resolved before any bytes are fetched or written.
    let installer = deps.cache.cache_path(&url, extension)?;
    let invocation = build_invocation(
        request.kind,
        &installer,
        target.as_deref(),
        &request.arguments,
        &context,
    )?;

    let artifact = deps
        .cache
        .ensure(deps.fetcher, &url, extension, request.force)?;

    let extracted_to = match target {
        Some(target) => {
            let files = deps.extractor.extract(&artifact.path, &target)?;
            info!(
                "Extracted {} file(s) from {} to {}",
                files.len(),
                artifact.path.display(),
                target.display()
            );
            Some(target)
        }
        None => None,
    };

    let outcome = ProcessRunner::new(deps.executor).run(&invocation)?;

    Ok(InstallReport {
        artifact,
        extracted_to,
        invocation,
        outcome,
    })
}

/// Install every request independently, returning one result per request
/// in order. A failure does not stop the remaining requests.
pub fn install_many(
    requests: &[InstallRequest],
    env: &EnvironmentContext,
    deps: &PipelineDeps<'_>,
) -> Vec<Result<InstallReport>> {
    requests
        .iter()
        .map(|request| install_with(request, env, deps))
        .collect()
}

/// Install one package with the production fetcher, extractor and
/// executor. The process environment is snapshotted once.
///
/// # Errors
///
/// See [`install_with`].
pub fn install(request: &InstallRequest, config: &PipelineConfig) -> Result<InstallReport> {
    let env = EnvironmentContext::from_process();
    let cache = config.cache();
    let fetcher = config.fetcher();
    install_with(request, &env, &production_deps(&cache, &fetcher))
}

/// Install several packages with the production collaborators, sharing one
/// environment snapshot and one HTTP agent.
pub fn install_all(
    requests: &[InstallRequest],
    config: &PipelineConfig,
) -> Vec<Result<InstallReport>> {
    let env = EnvironmentContext::from_process();
    let cache = config.cache();
    let fetcher = config.fetcher();
    install_many(requests, &env, &production_deps(&cache, &fetcher))
}

fn production_deps<'a>(cache: &'a ArtifactCache, fetcher: &'a HttpFetcher) -> PipelineDeps<'a> {
    PipelineDeps {
        cache,
        fetcher,
        extractor: &DefaultExtractor,
        executor: &SystemCommandExecutor,
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
