//! Core error types for the fluid-rs template engine.
//!
//! This module provides [`TemplateError`], a single enum covering every failure
//! the engine can produce: parse errors, argument validation errors, evaluation
//! errors, loading errors, cache errors and configuration errors. Each variant
//! carries a stable numeric [`code`](TemplateError::code) so callers can match
//! on a failure independently of the message text or the syntax form that
//! triggered it.

use std::fmt;

use thiserror::Error;

/// A position inside a template source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// The line number, starting at 1.
    pub line: usize,
    /// The column number (in characters), starting at 1.
    pub column: usize,
}

impl SourceLocation {
    /// Creates a new location.
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Computes the location of a byte offset inside `source`.
    ///
    /// Offsets past the end of the source are clamped to the end.
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let mut end = offset.min(source.len());
        while !source.is_char_boundary(end) {
            end -= 1;
        }
        let before = &source[..end];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |pos| pos + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The broad class a [`TemplateError`] belongs to.
///
/// Everything except [`ErrorCategory::Cache`] aborts the current parse or
/// render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The template source could not be turned into a component tree.
    Parse,
    /// Supplied arguments do not match a component's declared arguments.
    Validation,
    /// A value could not be computed while rendering.
    Evaluation,
    /// A template source could not be found or read.
    Loading,
    /// A parsed template could not be stored or retrieved.
    Cache,
    /// Settings are missing or malformed.
    Configuration,
}

/// The error type for parsing, validating and rendering templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    // ── Parsing ──────────────────────────────────────────────────────

    /// The source violates the template grammar.
    #[error("Template syntax error at {location}: {message}")]
    Syntax {
        /// What went wrong.
        message: String,
        /// Where it went wrong.
        location: SourceLocation,
    },

    /// A tag or inline invocation uses a namespace that is neither registered
    /// nor ignored.
    #[error("Unknown namespace '{namespace}' used by '{namespace}:{identifier}' at {location}")]
    UnknownNamespace {
        /// The namespace alias.
        namespace: String,
        /// The component identifier following the alias.
        identifier: String,
        /// Where the invocation starts.
        location: SourceLocation,
    },

    /// The namespace is registered but none of its targets provide the component.
    #[error("Unknown component '{namespace}:{identifier}' at {location}")]
    UnknownComponent {
        /// The namespace alias.
        namespace: String,
        /// The component identifier.
        identifier: String,
        /// Where the invocation starts.
        location: SourceLocation,
    },

    /// A closing tag does not match the innermost open tag.
    #[error("Mismatched closing tag at {location}: expected {expected}, found </{found}>")]
    MismatchedClosingTag {
        /// The tag that is currently open (or "no open tag").
        expected: String,
        /// The closing tag that was found.
        found: String,
        /// Where the closing tag starts.
        location: SourceLocation,
    },

    /// The source ended while a construct was still open.
    #[error("Unclosed {construct} opened at {location}")]
    Unclosed {
        /// A description of the construct (tag, quoted string, brace, ...).
        construct: String,
        /// Where the construct was opened.
        location: SourceLocation,
    },

    /// The escaping modifier appeared more than once in a single template.
    #[error("The escaping modifier may only appear once per template (second occurrence at {location})")]
    DuplicateEscapingModifier {
        /// Where the second modifier was found.
        location: SourceLocation,
    },

    // ── Validation ───────────────────────────────────────────────────

    /// A required argument was not supplied.
    #[error("Required argument '{argument}' was not supplied to '{component}'")]
    MissingArgument {
        /// The `namespace:identifier` of the component.
        component: String,
        /// The missing argument name.
        argument: String,
    },

    /// An argument was supplied that the component does not declare and the
    /// component does not accept additional arguments.
    #[error("Undeclared argument '{argument}' supplied to '{component}'")]
    UndeclaredArgument {
        /// The `namespace:identifier` of the component.
        component: String,
        /// The undeclared argument name.
        argument: String,
    },

    /// An argument was supplied in a form the component cannot use.
    #[error("Invalid argument '{argument}' for '{component}': {message}")]
    InvalidArgument {
        /// The `namespace:identifier` of the component.
        component: String,
        /// The argument name.
        argument: String,
        /// Why the value is unusable.
        message: String,
    },

    // ── Evaluation ───────────────────────────────────────────────────

    /// An object-like value without a string representation was used as text.
    #[error("Value of type '{type_name}' cannot be converted to a string")]
    NotStringable {
        /// The type name reported by the value.
        type_name: String,
    },

    /// A section was referenced that the template does not define.
    #[error("Section '{name}' is not defined")]
    UnknownSection {
        /// The section name.
        name: String,
    },

    /// Nested rendering went deeper than the configured limit.
    #[error("Maximum rendering depth of {depth} exceeded")]
    RenderDepthExceeded {
        /// The configured limit.
        depth: usize,
    },

    /// Any other failure while computing a value.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    // ── Loading ──────────────────────────────────────────────────────

    /// No loader could provide the requested template source.
    #[error("Template does not exist: {0}")]
    TemplateNotFound(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Cache ────────────────────────────────────────────────────────

    /// A parsed template could not be stored in or read from the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TemplateError {
    /// Creates a syntax error at the given location.
    pub fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Syntax {
            message: message.into(),
            location,
        }
    }

    /// Returns the stable numeric code of this error.
    ///
    /// Codes are grouped by category: 1xxx parse, 2xxx validation,
    /// 3xxx evaluation, 4xxx loading, 5xxx cache, 6xxx configuration.
    pub const fn code(&self) -> u32 {
        match self {
            Self::Syntax { .. } => 1001,
            Self::UnknownNamespace { .. } => 1002,
            Self::UnknownComponent { .. } => 1003,
            Self::MismatchedClosingTag { .. } => 1004,
            Self::Unclosed { .. } => 1005,
            Self::DuplicateEscapingModifier { .. } => 1006,
            Self::MissingArgument { .. } => 2001,
            Self::UndeclaredArgument { .. } => 2002,
            Self::InvalidArgument { .. } => 2003,
            Self::NotStringable { .. } => 3001,
            Self::UnknownSection { .. } => 3002,
            Self::RenderDepthExceeded { .. } => 3003,
            Self::Evaluation(_) => 3004,
            Self::TemplateNotFound(_) => 4001,
            Self::Io(_) => 4002,
            Self::Cache(_) => 5001,
            Self::Configuration(_) => 6001,
        }
    }

    /// Returns the category this error belongs to.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Syntax { .. }
            | Self::UnknownNamespace { .. }
            | Self::UnknownComponent { .. }
            | Self::MismatchedClosingTag { .. }
            | Self::Unclosed { .. }
            | Self::DuplicateEscapingModifier { .. } => ErrorCategory::Parse,
            Self::MissingArgument { .. }
            | Self::UndeclaredArgument { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::Validation,
            Self::NotStringable { .. }
            | Self::UnknownSection { .. }
            | Self::RenderDepthExceeded { .. }
            | Self::Evaluation(_) => ErrorCategory::Evaluation,
            Self::TemplateNotFound(_) | Self::Io(_) => ErrorCategory::Loading,
            Self::Cache(_) => ErrorCategory::Cache,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Returns `true` if the engine may continue after this error.
    ///
    /// Only cache failures are recoverable: the template is rendered from the
    /// freshly parsed tree instead.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Cache)
    }
}

/// A convenience type alias for `Result<T, TemplateError>`.
pub type TemplateResult<T> = Result<T, TemplateError>;
