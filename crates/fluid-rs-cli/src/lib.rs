//! # fluid-rs-cli
//!
//! Management commands for the fluid-rs template engine.
//!
//! This crate provides:
//!
//! - **Command framework** - [`ManagementCommand`] and [`CommandRegistry`] for
//!   defining and dispatching subcommands
//! - **Built-in commands** - `render`, `check`, `warmup` and `flush`
//!
//! ## Quick Start
//!
//! ```rust
//! use fluid_rs_cli::command::CommandRegistry;
//! use fluid_rs_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"render"));
//! assert!(names.contains(&"warmup"));
//! ```

// - result_large_err: TemplateError is the crate-wide error type
// - doc_markdown: backtick requirements for documentation items are too strict
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]

pub mod command;
pub mod commands;

pub use command::{CommandRegistry, ManagementCommand};

use fluid_rs_core::{Settings, TemplateResult};
use fluid_rs_template::Engine;

/// Builds an engine for a command from the loaded settings.
pub fn engine_from_settings(settings: &Settings) -> TemplateResult<Engine> {
    Engine::from_settings(settings.clone())
}
