//! Output formatting for the pantry CLI.

use crate::cache::CachedArtifact;
use crate::pipeline::InstallReport;
use crate::runner::RunOutcome;
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort diagnostics; ignore write failures.
    }
}

/// Describe how a run ended.
#[must_use]
pub fn outcome_message(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::NothingToRun => "Nothing to run",
        RunOutcome::Success => "Install completed successfully",
        RunOutcome::RebootRequired => "Install completed; a reboot is required to finish",
    }
}

/// Summarize where an artifact came from.
///
/// # Example
///
/// ```
/// use pantry_installer::cache::CachedArtifact;
/// use pantry_installer::output::fetch_summary;
/// use std::path::PathBuf;
///
/// let artifact = CachedArtifact {
///     path: PathBuf::from("/tmp/CBF43926.exe"),
///     cache_hit: true,
///     bytes_transferred: 0,
/// };
/// assert_eq!(fetch_summary(&artifact), "Using cached /tmp/CBF43926.exe");
/// ```
#[must_use]
pub fn fetch_summary(artifact: &CachedArtifact) -> String {
    if artifact.cache_hit {
        format!("Using cached {}", artifact.path.display())
    } else {
        format!(
            "Fetched {} byte(s) to {}",
            artifact.bytes_transferred,
            artifact.path.display()
        )
    }
}

/// Describe a completed install, one line per stage.
#[must_use]
pub fn install_summary(report: &InstallReport) -> Vec<String> {
    let mut lines = vec![fetch_summary(&report.artifact)];
    if let Some(dir) = &report.extracted_to {
        lines.push(format!("Extracted to {}", dir.display()));
    }
    lines.push(outcome_message(report.outcome).to_owned());
    lines
}
