//! CLI argument definitions for pantry.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::{FetchConfig, PipelineConfig};
use crate::invocation::InstallerKind;
use crate::pipeline::InstallRequest;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::time::Duration;

/// Fetch, cache, and run software installers.
#[derive(Parser, Debug)]
#[command(name = "pantry")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, cache, and run software installers.\n\n",
    "Installer URLs and arguments may reference environment variables as ",
    "{{.NAME}}. Downloads are cached under a name derived from the URL, so a ",
    "second install of the same URL does not touch the network.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Download an installer into the cache and print its path:\n",
    "    $ pantry fetch https://example.com/tool/setup.exe\n\n",
    "  Install an MSI silently:\n",
    "    $ pantry install --kind msi https://example.com/tool-{{.VERSION}}.msi --set VERSION=1.2\n\n",
    "  Unpack a portable zip without running anything:\n",
    "    $ pantry install --kind custom --extract-to '{{.LOCALAPPDATA}}/tool' https://example.com/tool.zip\n\n",
    "  Pass extra arguments to an Inno Setup installer:\n",
    "    $ pantry install --kind innosetup https://example.com/setup.exe -- '/DIR={{.PROGRAMFILES}}\\Tool'",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding cached downloads [default: system temp directory].
    #[arg(long, value_name = "DIR", env = "PANTRY_CACHE_DIR", global = true)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Network timeout for each download, in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 300, global = true)]
    pub timeout: u64,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet",
        global = true
    )]
    pub verbosity: u8,

    /// Only show warnings and errors, and hide progress bars.
    #[arg(short, long, conflicts_with = "verbosity", global = true)]
    pub quiet: bool,
}

impl Cli {
    /// The pipeline configuration described by the global flags.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            cache_dir: self.cache_dir.clone().unwrap_or(defaults.cache_dir),
            fetch: FetchConfig {
                timeout: Duration::from_secs(self.timeout),
            },
            quiet: self.quiet,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Make sure a URL is cached and print the cached path.
    Fetch(FetchArgs),

    /// Unpack an archive into a directory.
    Extract {
        /// Archive to unpack (zip, tar.gz or tar.zst).
        archive: Utf8PathBuf,
        /// Directory to unpack into; created if missing.
        target: Utf8PathBuf,
    },

    /// Run a program and report its exit classification.
    Run {
        /// Program followed by its arguments.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
    },

    /// Fetch, optionally unpack, and run an installer.
    Install(InstallArgs),
}

/// Arguments for the fetch command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct FetchArgs {
    /// URL of the artifact; may contain {{.NAME}} references.
    pub url: String,

    /// Extension for the cached file instead of the URL's.
    #[arg(long, value_name = "EXT")]
    pub ext: Option<String>,

    /// Download again even if the artifact is cached.
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct InstallArgs {
    /// Artifact to fetch and install.
    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Unpack the artifact into DIR; may contain {{.NAME}} references.
    #[arg(long, value_name = "DIR")]
    pub extract_to: Option<String>,

    /// Installer technology, selecting silent-install arguments
    /// [default: custom with --extract-to, otherwise as-is].
    #[arg(long, value_enum)]
    pub kind: Option<InstallerKind>,

    /// Define a template variable for this install (can be repeated).
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,

    /// Extra installer argument templates, after `--`.
    #[arg(last = true, value_name = "ARGS")]
    pub arguments: Vec<String>,
}

impl InstallArgs {
    /// The requested kind. An archive that is only extracted is not run
    /// itself, so extraction without `--kind` means `custom`.
    #[must_use]
    pub fn effective_kind(&self) -> InstallerKind {
        match (self.kind, &self.extract_to) {
            (Some(kind), _) => kind,
            (None, Some(_)) => InstallerKind::Custom,
            (None, None) => InstallerKind::AsIs,
        }
    }

    /// Convert the parsed arguments into a pipeline request.
    #[must_use]
    pub fn to_request(&self) -> InstallRequest {
        let mut request = InstallRequest::new(self.fetch.url.clone())
            .with_force(self.fetch.force)
            .with_kind(self.effective_kind())
            .with_arguments(self.arguments.iter().cloned());
        if let Some(ext) = &self.fetch.ext {
            request = request.with_extension(ext.clone());
        }
        if let Some(target) = &self.extract_to {
            request = request.with_extract_to(target.clone());
        }
        for (name, value) in &self.overrides {
            request = request.with_override(name.clone(), value.clone());
        }
        request
    }
}

/// Parse a `KEY=VALUE` pair. The value may be empty or contain `=`.
///
/// # Errors
///
/// Returns a message when there is no `=` or the key is empty.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        Some(_) => Err(format!("missing variable name in '{raw}'")),
        None => Err(format!("expected KEY=VALUE but got '{raw}'")),
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
