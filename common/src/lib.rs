//! Shared building blocks for pantry: the environment snapshot that installer
//! templates are resolved against, and the template expander itself.
//!
//! # Modules
//!
//! - [`context`] - Environment Context snapshot with caller overrides
//! - [`expand`] - `{{.NAME}}` template expansion

pub mod context;
pub mod expand;

pub use context::{EnvironmentContext, normalize_key};
pub use expand::{ExpansionError, expand};
