//! Environment Context: upper-cased variable names mapped to their values.
//!
//! The process environment is snapshotted once, at the pipeline entry point,
//! and then overlaid with caller-supplied pairs. Names are normalized so that
//! templates can be written without knowing the host's naming convention
//! (`Path` and `PATH` are the same variable, `ProgramFiles(x86)` becomes
//! `PROGRAMFILES_X86`).

use crate::expand::{ExpansionError, expand};
use log::debug;
use std::collections::BTreeMap;
use std::ffi::OsString;

/// Suffix some hosts use for 32-bit variants of directory variables.
const X86_SUFFIX: &str = "(X86)";

/// Replacement for [`X86_SUFFIX`] that is valid inside a template reference.
const X86_REPLACEMENT: &str = "_X86";

/// Normalize a variable name the way every context key is stored.
///
/// # Examples
///
/// ```
/// use pantry_common::normalize_key;
///
/// assert_eq!(normalize_key("ProgramFiles(x86)"), "PROGRAMFILES_X86");
/// assert_eq!(normalize_key("installer"), "INSTALLER");
/// ```
#[must_use]
pub fn normalize_key(name: &str) -> String {
    name.to_uppercase().replace(X86_SUFFIX, X86_REPLACEMENT)
}

/// Variables available to template expansion.
///
/// Later insertions win over earlier ones, so caller overrides applied after
/// the process snapshot take precedence on collision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentContext {
    vars: BTreeMap<String, String>,
}

impl EnvironmentContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Build a context from explicit name/value pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use pantry_common::EnvironmentContext;
    ///
    /// let context = EnvironmentContext::from_vars([("Foo", "bar")]);
    /// assert_eq!(context.get("FOO"), Some("bar"));
    /// ```
    #[must_use]
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::new().with_overrides(vars)
    }

    fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut context = Self::new();
        for (name, value) in vars {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => {
                    context.insert(&name, value);
                }
                (name, _) => {
                    debug!("skipping non-unicode environment entry {name:?}");
                }
            }
        }
        context
    }

    /// Insert a variable, returning the value it replaced.
    ///
    /// Entries with an empty name are ignored.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        self.vars.insert(normalize_key(name), value.into())
    }

    /// Overlay caller-supplied pairs on this context.
    #[must_use]
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in overrides {
            self.insert(name.as_ref(), value);
        }
        self
    }

    /// Look up a variable by name. The name is normalized first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&normalize_key(name)).map(String::as_str)
    }

    /// Number of variables in the context.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` when the context holds no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Expand `template` against this context.
    ///
    /// # Errors
    ///
    /// Returns an [`ExpansionError`] when a reference is malformed or names a
    /// variable that is not defined.
    pub fn expand(&self, template: &str) -> Result<String, ExpansionError> {
        expand(template, self)
    }
}
