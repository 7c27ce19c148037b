//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML and JSON
//! sources and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `FLUID_DEBUG` | `debug` |
//! | `FLUID_ESCAPING` | `escaping` |
//! | `FLUID_LOG_LEVEL` | `log_level` |
//! | `FLUID_MAX_RENDER_DEPTH` | `max_render_depth` |
//! | `FLUID_CACHE_BACKEND` | `cache.backend` (`memory`, `file`, `none`) |
//! | `FLUID_CACHE_DIRECTORY` | `cache.directory` |
//! | `FLUID_TEMPLATE_ROOT_PATHS` | `paths.template_root_paths` (comma-separated) |
//! | `FLUID_LAYOUT_ROOT_PATHS` | `paths.layout_root_paths` (comma-separated) |
//! | `FLUID_PARTIAL_ROOT_PATHS` | `paths.partial_root_paths` (comma-separated) |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use fluid_rs_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file("config/fluid.toml").unwrap();
//! let settings = settings_loader::from_toml_file_with_env("config/fluid.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::TemplateError;
use crate::settings::{CacheBackendKind, Settings};

/// Loads settings from a TOML string.
///
/// Any fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, TemplateError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| TemplateError::Configuration(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, TemplateError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, TemplateError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, TemplateError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| TemplateError::Configuration(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, TemplateError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a file, picking the format from its extension.
///
/// Files ending in `.json` are read as JSON, everything else as TOML.
/// Environment overrides are applied afterwards.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, TemplateError> {
    let path = path.as_ref();
    let mut settings = if path.extension().is_some_and(|ext| ext == "json") {
        from_json_file(path)?
    } else {
        from_toml_file(path)?
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `FLUID_*` environment variable overrides to a settings struct.
///
/// Unparseable numeric or enum values are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("FLUID_DEBUG") {
        settings.debug = parse_flag(&val);
    }

    if let Ok(val) = std::env::var("FLUID_ESCAPING") {
        settings.escaping = parse_flag(&val);
    }

    if let Ok(val) = std::env::var("FLUID_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("FLUID_MAX_RENDER_DEPTH") {
        if let Ok(depth) = val.parse::<usize>() {
            settings.max_render_depth = depth;
        }
    }

    if let Ok(val) = std::env::var("FLUID_CACHE_BACKEND") {
        match val.to_lowercase().as_str() {
            "memory" => settings.cache.backend = CacheBackendKind::Memory,
            "file" => settings.cache.backend = CacheBackendKind::File,
            "none" => settings.cache.backend = CacheBackendKind::None,
            _ => {}
        }
    }

    if let Ok(val) = std::env::var("FLUID_CACHE_DIRECTORY") {
        settings.cache.directory = Some(PathBuf::from(val));
    }

    if let Ok(val) = std::env::var("FLUID_TEMPLATE_ROOT_PATHS") {
        settings.paths.template_root_paths = split_paths(&val);
    }

    if let Ok(val) = std::env::var("FLUID_LAYOUT_ROOT_PATHS") {
        settings.paths.layout_root_paths = split_paths(&val);
    }

    if let Ok(val) = std::env::var("FLUID_PARTIAL_ROOT_PATHS") {
        settings.paths.partial_root_paths = split_paths(&val);
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, TemplateError> {
    std::fs::read_to_string(path).map_err(|e| {
        TemplateError::Configuration(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, TemplateError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        TemplateError::Configuration(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        TemplateError::Configuration(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn split_paths(val: &str) -> Vec<PathBuf> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
