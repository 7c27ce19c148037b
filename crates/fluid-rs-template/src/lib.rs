//! # fluid-rs-template
//!
//! The template engine: parses templates written in tag syntax
//! (`<f:if condition="...">`) and inline syntax (`{value -> f:format.raw()}`)
//! into a component tree, caches parsed trees under content-derived
//! identifiers and renders them against a variable scope.
//!
//! ## Modules
//!
//! - [`splitter`] - Context-aware symbol stream over template source
//! - [`sequencer`] - Parsing state machine building the component tree
//! - [`component`] - Component tree, flattening and escaping flags
//! - [`arguments`] - Argument definitions, collections and bound values
//! - [`resolver`] - Helper libraries and namespace resolution
//! - [`boolean`] - Boolean expression evaluation
//! - [`escaping`] - Post-parse escaping interceptor
//! - [`compiler`] - Parsed templates and get-or-parse-and-store
//! - [`cache`] - In-memory, file and null template caches
//! - [`loaders`] - Template source loaders
//! - [`rendering`] - Rendering context, sections, layouts and partials
//! - [`builtins`] - The core `f` helper library
//! - [`engine`] - The engine tying everything together
//! - [`value`] - Runtime values
//! - [`variables`] - Variable scopes

pub mod arguments;
pub mod boolean;
pub mod builtins;
pub mod cache;
pub mod compiler;
pub mod component;
pub mod engine;
pub mod escaping;
pub mod loaders;
pub mod rendering;
pub mod resolver;
pub mod sequencer;
pub mod splitter;
pub mod value;
pub mod variables;

pub use engine::{Engine, EngineBuilder};
pub use value::Value;
pub use variables::Variables;
