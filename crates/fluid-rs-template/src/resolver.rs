//! Helper libraries and namespace resolution.
//!
//! Helpers are grouped into named [`Library`] targets (`Fluid\ViewHelpers`).
//! Templates refer to a target through a namespace alias (`f`), and the
//! [`Resolver`] turns an `alias:identifier` pair into an immutable
//! [`ComponentDescriptor`] that is built once per target and identifier and
//! shared by every call site.
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//! use fluid_rs_template::arguments::{ArgumentDefinition, ArgumentType, Arguments};
//! use fluid_rs_template::rendering::{RenderChildren, RenderingContext};
//! use fluid_rs_template::resolver::{Helper, Library, Resolver};
//! use fluid_rs_template::value::Value;
//! use fluid_rs_core::TemplateResult;
//!
//! struct Shout;
//!
//! impl Helper for Shout {
//!     fn arguments(&self) -> Vec<ArgumentDefinition> {
//!         vec![ArgumentDefinition::new("text", ArgumentType::String, "Text to shout").required()]
//!     }
//!
//!     fn render(
//!         &self,
//!         arguments: &Arguments,
//!         _children: RenderChildren<'_>,
//!         _ctx: &mut RenderingContext,
//!     ) -> TemplateResult<Value> {
//!         let text = arguments.get_string("text")?.unwrap_or_default();
//!         Ok(Value::from(text.to_uppercase()))
//!     }
//! }
//!
//! let mut library = Library::new("Acme\\Helpers");
//! library.register("shout", Shout);
//!
//! let mut resolver = Resolver::new();
//! resolver.register_library(library);
//! resolver.register_namespace("acme", "Acme\\Helpers");
//! assert!(resolver.descriptor("Acme\\Helpers", "shout").is_ok());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use fluid_rs_core::error::{SourceLocation, TemplateError, TemplateResult};

use crate::arguments::{ArgumentDefinition, ArgumentType, Arguments};
use crate::builtins;
use crate::component::Escape;
use crate::rendering::{RenderChildren, RenderingContext};
use crate::value::Value;

/// The library target of the core helpers.
pub const CORE_TARGET: &str = "Fluid\\ViewHelpers";

/// The alias the core library is registered under.
pub const CORE_ALIAS: &str = "f";

/// How a helper affects the escaping of the value it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapingRole {
    /// The helper outputs its value unescaped on purpose.
    Raw,
    /// The helper escapes its value itself.
    Escape,
}

/// A helper that can be invoked from templates.
pub trait Helper: Send + Sync {
    /// The declared arguments.
    fn arguments(&self) -> Vec<ArgumentDefinition>;

    /// Whether undeclared arguments are accepted.
    fn accepts_additional_arguments(&self) -> bool {
        false
    }

    /// Escaping of dynamic content passed as children.
    fn escape_children(&self) -> Escape {
        Escape::Inherit
    }

    /// Escaping of the helper's output.
    fn escape_output(&self) -> Escape {
        Escape::Inherit
    }

    /// The escaping role of the helper within an inline chain.
    fn escaping_role(&self) -> Option<EscapingRole> {
        None
    }

    /// Whether templates using this helper may be cached.
    fn is_compilable(&self) -> bool {
        true
    }

    /// Renders the helper.
    ///
    /// `children` is a deferred handle: the children are only evaluated if
    /// the helper asks for them.
    fn render(
        &self,
        arguments: &Arguments,
        children: RenderChildren<'_>,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value>;
}

/// A named collection of helpers.
pub struct Library {
    name: String,
    helpers: HashMap<String, Arc<dyn Helper>>,
}

impl Library {
    /// Creates an empty library for the given target name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            helpers: HashMap::new(),
        }
    }

    /// Returns the target name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a helper under `identifier` (`format.raw`).
    pub fn register(&mut self, identifier: impl Into<String>, helper: impl Helper + 'static) {
        self.helpers.insert(identifier.into(), Arc::new(helper));
    }

    /// Returns the helper registered under `identifier`.
    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Helper>> {
        self.helpers.get(identifier).cloned()
    }

    /// Returns the identifiers of all registered helpers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }

    /// Returns the number of helpers.
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    /// Returns `true` if the library has no helpers.
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("helpers", &self.identifiers())
            .finish()
    }
}

/// What a resolved component is.
#[derive(Clone)]
pub enum DescriptorVariant {
    /// `f:section`
    Section,
    /// `f:layout`
    Layout,
    /// `f:render`
    Reference,
    /// A helper from a library.
    Helper(Arc<dyn Helper>),
}

impl fmt::Debug for DescriptorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section => f.write_str("Section"),
            Self::Layout => f.write_str("Layout"),
            Self::Reference => f.write_str("Reference"),
            Self::Helper(_) => f.write_str("Helper"),
        }
    }
}

/// An immutable description of a resolvable component.
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    /// The library target.
    pub target: String,
    /// The component identifier within the target.
    pub identifier: String,
    /// What to instantiate.
    pub variant: DescriptorVariant,
    /// The declared arguments.
    pub definitions: Vec<ArgumentDefinition>,
    /// Whether undeclared arguments are accepted.
    pub accepts_additional: bool,
    /// Escaping of dynamic children.
    pub escape_children: Escape,
    /// Escaping of the output.
    pub escape_output: Escape,
    /// The escaping role within inline chains.
    pub escaping_role: Option<EscapingRole>,
    /// Whether templates using the component may be cached.
    pub compilable: bool,
}

impl ComponentDescriptor {
    /// Builds the descriptor of a library helper.
    pub fn for_helper(
        target: impl Into<String>,
        identifier: impl Into<String>,
        helper: Arc<dyn Helper>,
    ) -> Self {
        Self {
            target: target.into(),
            identifier: identifier.into(),
            definitions: helper.arguments(),
            accepts_additional: helper.accepts_additional_arguments(),
            escape_children: helper.escape_children(),
            escape_output: helper.escape_output(),
            escaping_role: helper.escaping_role(),
            compilable: helper.is_compilable(),
            variant: DescriptorVariant::Helper(helper),
        }
    }

    /// Builds the descriptor of a natively handled core component.
    fn native(identifier: &str) -> Option<Self> {
        let (variant, definitions, escape_output) = match identifier {
            "section" => (
                DescriptorVariant::Section,
                vec![ArgumentDefinition::new("name", ArgumentType::String, "Name of the section").required()],
                Escape::Off,
            ),
            "layout" => (
                DescriptorVariant::Layout,
                vec![ArgumentDefinition::new("name", ArgumentType::String, "Name of the layout")
                    .with_default("Default")],
                Escape::Off,
            ),
            "render" => (
                DescriptorVariant::Reference,
                vec![
                    ArgumentDefinition::new("section", ArgumentType::String, "Section to render"),
                    ArgumentDefinition::new("partial", ArgumentType::String, "Partial to render"),
                    ArgumentDefinition::new("arguments", ArgumentType::Array, "Variables for the rendered scope"),
                    ArgumentDefinition::new("optional", ArgumentType::Boolean, "Render nothing if the target is missing")
                        .with_default(false),
                    ArgumentDefinition::new("default", ArgumentType::Mixed, "Output if the target is missing"),
                    ArgumentDefinition::new("contentAs", ArgumentType::String, "Variable receiving the rendered children"),
                ],
                Escape::Off,
            ),
            _ => return None,
        };
        Some(Self {
            target: CORE_TARGET.to_string(),
            identifier: identifier.to_string(),
            variant,
            definitions,
            accepts_additional: false,
            escape_children: Escape::Inherit,
            escape_output,
            escaping_role: None,
            compilable: true,
        })
    }

    /// Returns `target:identifier`, used in error messages.
    pub fn label(&self) -> String {
        format!("{}:{}", self.target, self.identifier)
    }
}

/// Namespace aliases and ignore rules for one parse.
///
/// An alias may point to several targets; later targets take precedence.
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    aliases: HashMap<String, Vec<String>>,
    ignored: Vec<String>,
}

impl NamespaceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a target to an alias.
    pub fn add(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        let target = target.into();
        let targets = self.aliases.entry(alias.into()).or_default();
        targets.retain(|existing| existing != &target);
        targets.push(target);
    }

    /// Marks namespaces matching `pattern` (`*` wildcards allowed) as ignored.
    pub fn ignore(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !self.ignored.contains(&pattern) {
            self.ignored.push(pattern);
        }
    }

    /// Returns the targets registered for `alias`.
    pub fn targets(&self, alias: &str) -> Option<&[String]> {
        self.aliases
            .get(alias)
            .filter(|targets| !targets.is_empty())
            .map(Vec::as_slice)
    }

    /// Returns `true` if `alias` matches an ignore pattern.
    pub fn is_ignored(&self, alias: &str) -> bool {
        self.ignored.iter().any(|pattern| glob_matches(pattern, alias))
    }

    /// Returns `true` if `alias` is not registered but ignored.
    pub fn passes_through(&self, alias: &str) -> bool {
        self.targets(alias).is_none() && self.is_ignored(alias)
    }
}

fn glob_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }
    let expression = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
    regex::Regex::new(&expression).is_ok_and(|re| re.is_match(name))
}

/// The outcome of resolving an `alias:identifier` pair.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The namespace is ignored; the source is passed through verbatim.
    Ignored,
    /// The component was found.
    Component(Arc<ComponentDescriptor>),
}

/// Resolves namespaced identifiers to component descriptors.
pub struct Resolver {
    libraries: HashMap<String, Library>,
    namespaces: NamespaceTable,
    descriptors: RwLock<HashMap<(String, String), Arc<ComponentDescriptor>>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Creates a resolver with the core library registered as `f`.
    pub fn new() -> Self {
        let mut resolver = Self::empty();
        resolver.register_library(builtins::core_library());
        resolver.register_namespace(CORE_ALIAS, CORE_TARGET);
        resolver
    }

    /// Creates a resolver without any libraries or namespaces.
    pub fn empty() -> Self {
        Self {
            libraries: HashMap::new(),
            namespaces: NamespaceTable::new(),
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a library. Helpers of an existing library with the same
    /// target are replaced one by one.
    pub fn register_library(&mut self, library: Library) {
        match self.libraries.get_mut(library.name()) {
            Some(existing) => existing.helpers.extend(library.helpers),
            None => {
                self.libraries.insert(library.name.clone(), library);
            }
        }
        self.descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Registers a namespace alias for every template.
    pub fn register_namespace(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.namespaces.add(alias, target);
    }

    /// Ignores namespaces matching `pattern` in every template.
    pub fn ignore_namespace(&mut self, pattern: impl Into<String>) {
        self.namespaces.ignore(pattern);
    }

    /// Returns the namespaces registered for every template.
    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Returns the library registered for `target`.
    pub fn library(&self, target: &str) -> Option<&Library> {
        self.libraries.get(target)
    }

    /// Resolves `namespace:identifier` using the given per-parse table.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownNamespace`] if the namespace is
    /// neither registered nor ignored, and [`TemplateError::UnknownComponent`]
    /// if no target of the namespace provides the identifier.
    pub fn resolve(
        &self,
        table: &NamespaceTable,
        namespace: &str,
        identifier: &str,
        location: SourceLocation,
    ) -> TemplateResult<Resolution> {
        let Some(targets) = table.targets(namespace) else {
            if table.is_ignored(namespace) {
                return Ok(Resolution::Ignored);
            }
            return Err(TemplateError::UnknownNamespace {
                namespace: namespace.to_string(),
                identifier: identifier.to_string(),
                location,
            });
        };

        targets
            .iter()
            .rev()
            .find_map(|target| self.lookup(target, identifier))
            .map(Resolution::Component)
            .ok_or_else(|| TemplateError::UnknownComponent {
                namespace: namespace.to_string(),
                identifier: identifier.to_string(),
                location,
            })
    }

    /// Returns the descriptor for `identifier` in `target`.
    ///
    /// Used to relink components restored from a persistent cache.
    pub fn descriptor(
        &self,
        target: &str,
        identifier: &str,
    ) -> TemplateResult<Arc<ComponentDescriptor>> {
        self.lookup(target, identifier)
            .ok_or_else(|| TemplateError::UnknownComponent {
                namespace: target.to_string(),
                identifier: identifier.to_string(),
                location: SourceLocation::default(),
            })
    }

    fn lookup(&self, target: &str, identifier: &str) -> Option<Arc<ComponentDescriptor>> {
        let key = (target.to_string(), identifier.to_string());
        if let Some(descriptor) = self
            .descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(Arc::clone(descriptor));
        }

        let descriptor = if target == CORE_TARGET {
            ComponentDescriptor::native(identifier)
        } else {
            None
        };
        let descriptor = descriptor.or_else(|| {
            let helper = self.libraries.get(target)?.get(identifier)?;
            Some(ComponentDescriptor::for_helper(target, identifier, helper))
        })?;

        tracing::trace!(target = target, identifier = identifier, "Resolved component descriptor");
        let descriptor = Arc::new(descriptor);
        self.descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| Arc::clone(&descriptor));
        Some(descriptor)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("libraries", &self.libraries.keys().collect::<Vec<_>>())
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}
