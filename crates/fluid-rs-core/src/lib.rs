//! # fluid-rs-core
//!
//! Core types for the fluid-rs template engine: the error taxonomy, engine
//! settings and their loaders, and logging set-up. This crate has no engine
//! dependencies and is shared by the template engine and the CLI.
//!
//! ## Modules
//!
//! - [`error`] - Error types, stable error codes and result aliases
//! - [`settings`] - Engine settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ErrorCategory, SourceLocation, TemplateError, TemplateResult};
pub use settings::{Settings, SETTINGS};
