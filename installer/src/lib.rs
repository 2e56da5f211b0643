//! pantry installer library.
//!
//! This crate implements the fetch-cache-execute pipeline behind the `pantry`
//! binary: it downloads an installer into a content-addressed cache, unpacks
//! archives, and runs the installer while interpreting installer-technology
//! exit codes. It can be driven programmatically to install several packages
//! in one process with per-package error isolation.
//!
//! # Modules
//!
//! - [`cache`] - Deterministic cache paths and atomic download-then-rename
//! - [`cache_lock`] - Per-entry advisory locking around a fetch
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Pipeline defaults and tunables
//! - [`error`] - Top-level error type for pipeline operations
//! - [`extract`] - Archive extraction into a target directory
//! - [`fetch`] - HTTP(S) GET with vendor-specific request quirks
//! - [`invocation`] - Installer presets and argument expansion
//! - [`output`] - User-facing message formatting
//! - [`pipeline`] - Install orchestration across all stages
//! - [`progress`] - Byte-level transfer progress reporting
//! - [`runner`] - Installer process execution and exit classification

pub mod cache;
pub mod cache_lock;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod invocation;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod runner;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
