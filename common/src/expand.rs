//! Template expansion for installer URLs and command arguments.
//!
//! A template is plain text with references of the form `{{.NAME}}`
//! (surrounding whitespace inside the braces is allowed). Each reference is
//! replaced by the value of `NAME` in an [`EnvironmentContext`]. Anything
//! that cannot be resolved is an error: an installer must never run against a
//! half-expanded path or URL.

use crate::context::{EnvironmentContext, normalize_key};
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Errors arising from template expansion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    /// The template references a variable the context does not define.
    #[error("undefined variable {name} in template")]
    Undefined {
        /// Normalized name of the missing variable.
        name: String,
    },

    /// A `{{` was opened but never closed.
    #[error("unterminated reference starting at byte {offset}")]
    Unterminated {
        /// Byte offset of the opening braces.
        offset: usize,
    },

    /// The text between the braces is not a `.NAME` reference.
    #[error("invalid reference {{{{{reference}}}}}; expected {{{{.NAME}}}}")]
    InvalidReference {
        /// The offending text between the braces, trimmed.
        reference: String,
    },
}

/// Expand every `{{.NAME}}` reference in `template` from `context`.
///
/// # Errors
///
/// Returns [`ExpansionError::Undefined`] for a reference the context cannot
/// resolve, [`ExpansionError::Unterminated`] for a dangling `{{`, and
/// [`ExpansionError::InvalidReference`] for braces that do not hold a
/// `.NAME` reference.
///
/// # Examples
///
/// ```
/// use pantry_common::{EnvironmentContext, expand};
///
/// let context = EnvironmentContext::from_vars([("FOO", "bar")]);
/// assert_eq!(expand("http://x/{{.FOO}}", &context)?, "http://x/bar");
/// assert!(expand("http://x/{{.MISSING}}", &context).is_err());
/// # Ok::<(), pantry_common::ExpansionError>(())
/// ```
pub fn expand(template: &str, context: &EnvironmentContext) -> Result<String, ExpansionError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((literal, after_open)) = rest.split_once(OPEN) {
        output.push_str(literal);
        let Some((reference, remainder)) = after_open.split_once(CLOSE) else {
            return Err(ExpansionError::Unterminated {
                offset: template.len() - rest.len() + literal.len(),
            });
        };
        output.push_str(resolve(reference, context)?);
        rest = remainder;
    }

    output.push_str(rest);
    Ok(output)
}

fn resolve<'a>(reference: &str, context: &'a EnvironmentContext) -> Result<&'a str, ExpansionError> {
    let trimmed = reference.trim();
    let name = trimmed
        .strip_prefix('.')
        .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
        .ok_or_else(|| ExpansionError::InvalidReference {
            reference: trimmed.to_owned(),
        })?;

    context.get(name).ok_or_else(|| ExpansionError::Undefined {
        name: normalize_key(name),
    })
}
