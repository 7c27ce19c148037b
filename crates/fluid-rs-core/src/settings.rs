//! Settings for the fluid-rs template engine.
//!
//! This module provides the [`Settings`] struct, which holds all engine
//! configuration, and [`LazySettings`], a globally-accessible, lazily-initialized
//! settings instance for applications that prefer a process-wide configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Which cache backend stores parsed templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Parsed templates are kept in process memory.
    Memory,
    /// Parsed templates are serialized into [`CacheSettings::directory`].
    File,
    /// Nothing is cached; every render parses its templates.
    None,
}

/// Template cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// The backend used to store parsed templates.
    pub backend: CacheBackendKind,
    /// Directory for the file backend.
    pub directory: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            directory: None,
        }
    }
}

/// Where template sources are looked up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Directories searched for templates, in order.
    pub template_root_paths: Vec<PathBuf>,
    /// Directories searched for layouts, in order.
    pub layout_root_paths: Vec<PathBuf>,
    /// Directories searched for partials, in order.
    pub partial_root_paths: Vec<PathBuf>,
    /// The extension appended to names that have none (without the dot).
    pub format: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            template_root_paths: vec![PathBuf::from("Resources/Private/Templates")],
            layout_root_paths: vec![PathBuf::from("Resources/Private/Layouts")],
            partial_root_paths: vec![PathBuf::from("Resources/Private/Partials")],
            format: "html".to_string(),
        }
    }
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use fluid_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.escaping);
/// assert_eq!(settings.max_render_depth, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,
    /// Whether output escaping is enabled unless a template disables it.
    pub escaping: bool,
    /// How deep layouts, sections and partials may nest before rendering fails.
    pub max_render_depth: usize,

    // ── Paths ────────────────────────────────────────────────────────

    /// Template, layout and partial lookup paths.
    pub paths: PathSettings,

    // ── Namespaces ───────────────────────────────────────────────────

    /// Namespace aliases registered for every template, alias -> targets.
    pub namespaces: HashMap<String, Vec<String>>,
    /// Namespace globs that are passed through verbatim instead of resolved.
    pub ignored_namespaces: Vec<String>,

    // ── Cache ────────────────────────────────────────────────────────

    /// Parsed template cache configuration.
    pub cache: CacheSettings,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level (e.g. "info", "debug", "warn").
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            escaping: true,
            max_render_depth: 64,
            paths: PathSettings::default(),
            namespaces: HashMap::new(),
            ignored_namespaces: Vec::new(),
            cache: CacheSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings.
    ///
    /// Returns the rejected settings if they were already configured.
    pub fn configure(&self, settings: Settings) -> Result<(), Settings> {
        self.inner.set(settings)
    }

    /// Returns the configured settings, if any.
    pub fn get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns the configured settings or the defaults.
    pub fn get_or_default(&self) -> Settings {
        self.inner.get().cloned().unwrap_or_default()
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();
