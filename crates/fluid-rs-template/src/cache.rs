//! Compiled-template caches.
//!
//! All caches are shared between renders and follow last-writer-wins
//! semantics. [`FileCache`] persists trees as JSON; helper descriptors are
//! not serialized and are relinked through the resolver on first use.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use fluid_rs_core::error::{TemplateError, TemplateResult};
use fluid_rs_core::settings::{CacheBackendKind, CacheSettings};

use crate::compiler::ParsedTemplate;

/// Storage for parsed templates keyed by identifier.
pub trait TemplateCache: Send + Sync {
    /// Returns `true` if a template is stored under `identifier`.
    fn has(&self, identifier: &str) -> bool;

    /// Returns the template stored under `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Cache`] if there is no readable entry.
    fn get(&self, identifier: &str) -> TemplateResult<Arc<ParsedTemplate>>;

    /// Stores a template, replacing any previous entry.
    fn store(&self, identifier: &str, template: Arc<ParsedTemplate>) -> TemplateResult<()>;

    /// Removes every entry.
    fn flush(&self) -> TemplateResult<()>;
}

/// A process-local cache.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Arc<ParsedTemplate>>>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored templates.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TemplateCache for InMemoryCache {
    fn has(&self, identifier: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identifier)
    }

    fn get(&self, identifier: &str) -> TemplateResult<Arc<ParsedTemplate>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .cloned()
            .ok_or_else(|| TemplateError::Cache(format!("No cached template '{identifier}'")))
    }

    fn store(&self, identifier: &str, template: Arc<ParsedTemplate>) -> TemplateResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.to_string(), template);
        Ok(())
    }

    fn flush(&self) -> TemplateResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// A cache persisting templates as JSON files in a directory.
///
/// Entries read from disk are kept in memory for the lifetime of the cache.
#[derive(Debug)]
pub struct FileCache {
    directory: PathBuf,
    memory: InMemoryCache,
}

impl FileCache {
    /// Creates a cache in `directory`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Io`] if the directory cannot be created.
    pub fn new(directory: impl Into<PathBuf>) -> TemplateResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            memory: InMemoryCache::new(),
        })
    }

    /// Returns the cache directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, identifier: &str) -> PathBuf {
        self.directory.join(format!("{identifier}.json"))
    }
}

impl TemplateCache for FileCache {
    fn has(&self, identifier: &str) -> bool {
        self.memory.has(identifier) || self.path(identifier).is_file()
    }

    fn get(&self, identifier: &str) -> TemplateResult<Arc<ParsedTemplate>> {
        if let Ok(template) = self.memory.get(identifier) {
            return Ok(template);
        }
        let path = self.path(identifier);
        let data = fs::read_to_string(&path)
            .map_err(|e| TemplateError::Cache(format!("Cannot read '{}': {e}", path.display())))?;
        let template: ParsedTemplate = serde_json::from_str(&data)
            .map_err(|e| TemplateError::Cache(format!("Corrupt cache file '{}': {e}", path.display())))?;
        let template = Arc::new(template);
        self.memory.store(identifier, Arc::clone(&template))?;
        tracing::debug!(identifier, path = %path.display(), "Loaded template from file cache");
        Ok(template)
    }

    fn store(&self, identifier: &str, template: Arc<ParsedTemplate>) -> TemplateResult<()> {
        let data = serde_json::to_string(template.as_ref())
            .map_err(|e| TemplateError::Cache(format!("Cannot serialize '{identifier}': {e}")))?;
        let path = self.path(identifier);
        let partial = self
            .directory
            .join(format!(".{identifier}.{}.tmp", std::process::id()));
        fs::write(&partial, data)
            .and_then(|()| fs::rename(&partial, &path))
            .map_err(|e| TemplateError::Cache(format!("Cannot write '{}': {e}", path.display())))?;
        self.memory.store(identifier, template)
    }

    fn flush(&self) -> TemplateResult<()> {
        self.memory.flush()?;
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// A cache that stores nothing; every template is parsed on use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl TemplateCache for NullCache {
    fn has(&self, _identifier: &str) -> bool {
        false
    }

    fn get(&self, identifier: &str) -> TemplateResult<Arc<ParsedTemplate>> {
        Err(TemplateError::Cache(format!("No cached template '{identifier}'")))
    }

    fn store(&self, _identifier: &str, _template: Arc<ParsedTemplate>) -> TemplateResult<()> {
        Ok(())
    }

    fn flush(&self) -> TemplateResult<()> {
        Ok(())
    }
}

/// Creates the cache configured in `settings`.
///
/// # Errors
///
/// Returns [`TemplateError::Configuration`] if the file backend has no
/// directory, and [`TemplateError::Io`] if it cannot be created.
pub fn cache_from_settings(settings: &CacheSettings) -> TemplateResult<Arc<dyn TemplateCache>> {
    Ok(match settings.backend {
        CacheBackendKind::Memory => Arc::new(InMemoryCache::new()),
        CacheBackendKind::None => Arc::new(NullCache),
        CacheBackendKind::File => {
            let directory = settings.directory.clone().ok_or_else(|| {
                TemplateError::Configuration("The file cache backend requires a directory".to_string())
            })?;
            Arc::new(FileCache::new(directory)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    fn template(identifier: &str) -> Arc<ParsedTemplate> {
        let mut root = Component::entry();
        root.add_child(Component::text("hello"));
        Arc::new(ParsedTemplate::new(identifier, root))
    }

    #[test]
    fn test_in_memory_last_writer_wins() {
        let cache = InMemoryCache::new();
        assert!(!cache.has("a"));
        cache.store("a", template("first")).unwrap();
        cache.store("a", template("second")).unwrap();
        assert_eq!(cache.get("a").unwrap().identifier(), "second");
        assert_eq!(cache.len(), 1);
        cache.flush().unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a").unwrap_err().code(), 5001);
    }

    #[test]
    fn test_file_cache_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache.store("tpl_abc", template("tpl_abc")).unwrap();
        assert!(dir.path().join("tpl_abc.json").is_file());

        let reopened = FileCache::new(dir.path()).unwrap();
        assert!(reopened.has("tpl_abc"));
        let restored = reopened.get("tpl_abc").unwrap();
        assert_eq!(restored.root().children()[0].as_text(), Some("hello"));

        reopened.flush().unwrap();
        assert!(!reopened.has("tpl_abc"));
    }

    #[test]
    fn test_file_cache_corrupt_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        assert!(cache.has("bad"));
        assert_eq!(cache.get("bad").unwrap_err().code(), 5001);
    }

    #[test]
    fn test_null_cache_stores_nothing() {
        let cache = NullCache;
        cache.store("a", template("a")).unwrap();
        assert!(!cache.has("a"));
    }

    #[test]
    fn test_cache_from_settings() {
        let settings = CacheSettings {
            backend: CacheBackendKind::File,
            directory: None,
        };
        assert_eq!(cache_from_settings(&settings).err().map(|e| e.code()), Some(6001));

        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings {
            backend: CacheBackendKind::File,
            directory: Some(dir.path().join("compiled")),
        };
        assert!(cache_from_settings(&settings).is_ok());
        assert!(dir.path().join("compiled").is_dir());
    }
}
