//! Installer argument presets.
//!
//! Silent-install conventions differ per installer technology. A preset
//! turns the cached installer path into a complete argument vector; any
//! caller-supplied templates are expanded and appended.

use pantry_common::{EnvironmentContext, ExpansionError};
use std::path::Path;

/// Context variable holding the cached installer path.
pub const INSTALLER_VAR: &str = "INSTALLER";

/// Context variable holding the extraction directory, when extracting.
pub const EXTRACTED_VAR: &str = "EXTRACTED";

/// Installer technologies with known silent-install arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum InstallerKind {
    /// Run the installer with no extra arguments.
    #[default]
    AsIs,
    /// Windows Installer package, run through `msiexec.exe`.
    Msi,
    /// Nullsoft Scriptable Install System.
    Nsis,
    /// Inno Setup.
    #[value(name = "innosetup")]
    InnoSetup,
    /// Only the caller's argument templates.
    Custom,
}

impl InstallerKind {
    /// The preset argument vector for `installer`.
    #[must_use]
    pub fn preset(self, installer: &str) -> Vec<String> {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();
        match self {
            Self::AsIs => vec![installer.to_owned()],
            Self::Msi => owned(&[
                "msiexec.exe",
                "/q",
                "/i",
                installer,
                "ALLUSERS=1",
                "REBOOT=ReallySuppress",
            ]),
            Self::Nsis => owned(&[installer, "/S", "/NCRC"]),
            Self::InnoSetup => owned(&[
                installer,
                "/NORESTART",
                "/SP-",
                "/SUPPRESSMSGBOXES",
                "/VERYSILENT",
            ]),
            Self::Custom => Vec::new(),
        }
    }
}

/// Build the argument vector that runs `installer`.
///
/// `templates` are expanded against `context` extended with
/// [`INSTALLER_VAR`] and, when given, [`EXTRACTED_VAR`], then appended to
/// the preset for `kind`.
///
/// # Errors
///
/// Returns an [`ExpansionError`] when a template references an undefined
/// variable or is malformed.
///
/// # Examples
///
/// ```
/// use pantry_common::EnvironmentContext;
/// use pantry_installer::invocation::{build_invocation, InstallerKind};
/// use std::path::Path;
///
/// let argv = build_invocation(
///     InstallerKind::Nsis,
///     Path::new("/cache/ABCD.exe"),
///     None,
///     &["/D={{.PROGRAMFILES}}".to_owned()],
///     &EnvironmentContext::from_vars([("ProgramFiles", "/opt")]),
/// )
/// .unwrap();
/// assert_eq!(argv, ["/cache/ABCD.exe", "/S", "/NCRC", "/D=/opt"]);
/// ```
pub fn build_invocation(
    kind: InstallerKind,
    installer: &Path,
    extracted: Option<&Path>,
    templates: &[String],
    context: &EnvironmentContext,
) -> Result<Vec<String>, ExpansionError> {
    let installer = installer.display().to_string();
    let mut context = context.clone();
    context.insert(INSTALLER_VAR, installer.as_str());
    if let Some(dir) = extracted {
        context.insert(EXTRACTED_VAR, dir.display().to_string());
    }

    let mut argv = kind.preset(&installer);
    for template in templates {
        argv.push(context.expand(template)?);
    }
    Ok(argv)
}
