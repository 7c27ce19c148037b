//! Template loaders.
//!
//! A [`TemplateLoader`] finds template source by kind and name. The engine
//! asks for a cheap [`TemplateLoader::identity`] first and only reads the
//! source on a cache miss.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::UNIX_EPOCH;

use fluid_rs_core::error::{TemplateError, TemplateResult};
use fluid_rs_core::settings::PathSettings;

/// What a template is used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateKind {
    /// A top-level template.
    Template,
    /// A layout wrapping a template.
    Layout,
    /// A partial rendered from another template.
    Partial,
}

impl TemplateKind {
    /// Returns the semantic cache prefix for a template of this kind.
    pub fn prefix(self, name: &str) -> String {
        match self {
            Self::Template => "template".to_string(),
            Self::Layout => format!("layout:{name}"),
            Self::Partial => format!("partial:{name}"),
        }
    }

    /// Returns the lowercase name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Layout => "layout",
            Self::Partial => "partial",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provides template source by kind and name.
pub trait TemplateLoader: Send + Sync {
    /// Returns a string identifying the current version of the source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::TemplateNotFound`] if there is no such template.
    fn identity(&self, kind: TemplateKind, name: &str) -> TemplateResult<String>;

    /// Reads the source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::TemplateNotFound`] if there is no such
    /// template, or [`TemplateError::Io`] if it cannot be read.
    fn load(&self, kind: TemplateKind, name: &str) -> TemplateResult<String>;

    /// Lists the names of every template of `kind` the loader can find.
    fn list(&self, _kind: TemplateKind) -> TemplateResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Loads templates from template, layout and partial root directories.
///
/// Roots are searched in order and the first match wins. A name without
/// the configured format extension also matches `name.<format>`.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    templates: Vec<PathBuf>,
    layouts: Vec<PathBuf>,
    partials: Vec<PathBuf>,
    format: String,
}

impl FileSystemLoader {
    /// Creates a loader from explicit root lists.
    pub fn new(
        templates: Vec<PathBuf>,
        layouts: Vec<PathBuf>,
        partials: Vec<PathBuf>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            templates,
            layouts,
            partials,
            format: format.into(),
        }
    }

    /// Creates a loader from path settings.
    pub fn from_settings(paths: &PathSettings) -> Self {
        Self::new(
            paths.template_root_paths.clone(),
            paths.layout_root_paths.clone(),
            paths.partial_root_paths.clone(),
            paths.format.clone(),
        )
    }

    fn roots(&self, kind: TemplateKind) -> &[PathBuf] {
        match kind {
            TemplateKind::Template => &self.templates,
            TemplateKind::Layout => &self.layouts,
            TemplateKind::Partial => &self.partials,
        }
    }

    fn locate(&self, kind: TemplateKind, name: &str) -> TemplateResult<PathBuf> {
        let relative = Path::new(name);
        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, PathComponent::Normal(_) | PathComponent::CurDir));
        if !escapes_root {
            let with_format = format!("{name}.{}", self.format);
            for root in self.roots(kind) {
                for candidate in [root.join(name), root.join(&with_format)] {
                    if candidate.is_file() {
                        return Ok(candidate);
                    }
                }
            }
        }
        Err(TemplateError::TemplateNotFound(format!(
            "{kind} '{name}' not found in {:?}",
            self.roots(kind)
        )))
    }
}

impl TemplateLoader for FileSystemLoader {
    fn identity(&self, kind: TemplateKind, name: &str) -> TemplateResult<String> {
        let path = self.locate(kind, name)?;
        let metadata = fs::metadata(&path)?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |duration| duration.as_nanos());
        Ok(format!("{}@{modified}:{}", path.display(), metadata.len()))
    }

    fn load(&self, kind: TemplateKind, name: &str) -> TemplateResult<String> {
        let path = self.locate(kind, name)?;
        tracing::debug!(kind = %kind, path = %path.display(), "Loading template source");
        Ok(fs::read_to_string(path)?)
    }

    fn list(&self, kind: TemplateKind) -> TemplateResult<Vec<String>> {
        let mut names = BTreeSet::new();
        for root in self.roots(kind) {
            if root.is_dir() {
                collect_files(root, root, &self.format, &mut names)?;
            }
        }
        Ok(names.into_iter().collect())
    }
}

fn collect_files(
    root: &Path,
    dir: &Path,
    format: &str,
    names: &mut BTreeSet<String>,
) -> TemplateResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, format, names)?;
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(format) {
            continue;
        }
        if let Ok(relative) = path.with_extension("").strip_prefix(root) {
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            names.insert(name);
        }
    }
    Ok(())
}

/// Loads templates from an in-memory map.
///
/// # Examples
///
/// ```
/// use fluid_rs_template::loaders::{StringLoader, TemplateKind, TemplateLoader};
///
/// let loader = StringLoader::new();
/// loader.add_partial("Card", "<div>{title}</div>");
/// assert_eq!(loader.load(TemplateKind::Partial, "Card").unwrap(), "<div>{title}</div>");
/// assert!(loader.load(TemplateKind::Template, "Card").is_err());
/// ```
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<(TemplateKind, String), String>>,
}

impl StringLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a template.
    pub fn add(&self, kind: TemplateKind, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((kind, name.into()), source.into());
    }

    /// Adds or replaces a top-level template.
    pub fn add_template(&self, name: impl Into<String>, source: impl Into<String>) {
        self.add(TemplateKind::Template, name, source);
    }

    /// Adds or replaces a layout.
    pub fn add_layout(&self, name: impl Into<String>, source: impl Into<String>) {
        self.add(TemplateKind::Layout, name, source);
    }

    /// Adds or replaces a partial.
    pub fn add_partial(&self, name: impl Into<String>, source: impl Into<String>) {
        self.add(TemplateKind::Partial, name, source);
    }

    fn source(&self, kind: TemplateKind, name: &str) -> TemplateResult<String> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| TemplateError::TemplateNotFound(format!("{kind} '{name}' not found in StringLoader")))
    }
}

impl TemplateLoader for StringLoader {
    fn identity(&self, kind: TemplateKind, name: &str) -> TemplateResult<String> {
        Ok(format!("{name}\n{}", self.source(kind, name)?))
    }

    fn load(&self, kind: TemplateKind, name: &str) -> TemplateResult<String> {
        self.source(kind, name)
    }

    fn list(&self, kind: TemplateKind) -> TemplateResult<Vec<String>> {
        let mut names: Vec<String> = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_loader_kinds_are_separate() {
        let loader = StringLoader::new();
        loader.add_template("Index", "template");
        loader.add_layout("Index", "layout");
        assert_eq!(loader.load(TemplateKind::Template, "Index").unwrap(), "template");
        assert_eq!(loader.load(TemplateKind::Layout, "Index").unwrap(), "layout");
        assert_eq!(loader.load(TemplateKind::Partial, "Index").unwrap_err().code(), 4001);
    }

    #[test]
    fn test_string_loader_identity_tracks_content() {
        let loader = StringLoader::new();
        loader.add_template("x", "version 1");
        let first = loader.identity(TemplateKind::Template, "x").unwrap();
        loader.add_template("x", "version 2");
        assert_ne!(first, loader.identity(TemplateKind::Template, "x").unwrap());
    }

    #[test]
    fn test_string_loader_list() {
        let loader = StringLoader::new();
        loader.add_partial("b", "");
        loader.add_partial("a", "");
        loader.add_layout("c", "");
        assert_eq!(loader.list(TemplateKind::Partial).unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_filesystem_loader_resolves_format_and_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("Page.html"), "second").unwrap();
        fs::create_dir_all(first.path().join("Blog")).unwrap();
        fs::write(first.path().join("Blog/Post.html"), "post").unwrap();
        fs::write(first.path().join("Page.html"), "first").unwrap();

        let loader = FileSystemLoader::new(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            Vec::new(),
            Vec::new(),
            "html",
        );
        assert_eq!(loader.load(TemplateKind::Template, "Page").unwrap(), "first");
        assert_eq!(loader.load(TemplateKind::Template, "Page.html").unwrap(), "first");
        assert_eq!(loader.load(TemplateKind::Template, "Blog/Post").unwrap(), "post");
        assert!(loader.load(TemplateKind::Layout, "Page").is_err());
        assert_eq!(
            loader.list(TemplateKind::Template).unwrap(),
            ["Blog/Post", "Page"]
        );
    }

    #[test]
    fn test_filesystem_loader_rejects_parent_paths() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("inner")).unwrap();
        fs::write(root.path().join("secret.html"), "no").unwrap();
        let loader = FileSystemLoader::new(vec![root.path().join("inner")], Vec::new(), Vec::new(), "html");
        assert_eq!(loader.load(TemplateKind::Template, "../secret").unwrap_err().code(), 4001);
    }

    #[test]
    fn test_filesystem_identity_changes_with_content() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("A.html");
        fs::write(&path, "a").unwrap();
        let loader = FileSystemLoader::new(vec![root.path().to_path_buf()], Vec::new(), Vec::new(), "html");
        let before = loader.identity(TemplateKind::Template, "A").unwrap();
        fs::write(&path, "longer").unwrap();
        assert_ne!(before, loader.identity(TemplateKind::Template, "A").unwrap());
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(TemplateKind::Template.prefix("Index"), "template");
        assert_eq!(TemplateKind::Layout.prefix("Main"), "layout:Main");
        assert_eq!(TemplateKind::Partial.prefix("Card"), "partial:Card");
    }
}
