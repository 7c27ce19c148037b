//! Parsing pipeline and the compiled-template store.
//!
//! [`TemplateParser`] runs the sequencer and the escaping interceptor and
//! indexes the resulting tree into a [`ParsedTemplate`]. [`Compiler`] puts a
//! [`TemplateCache`] in front of the parser: a template is parsed at most
//! once per identifier, and identifiers are derived from the template's
//! source identity so a changed source gets a new entry.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use fluid_rs_core::error::TemplateResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::TemplateCache;
use crate::component::{Component, ComponentKind};
use crate::escaping;
use crate::rendering::RenderingContext;
use crate::resolver::Resolver;
use crate::sequencer;

/// The layout used when `f:layout` names none.
pub const DEFAULT_LAYOUT: &str = "Default";

/// Builds the cache identifier for a template.
///
/// The identifier is a pure function of the semantic `prefix`
/// (`template`, `layout:Main`, ...) and the source `identity`.
///
/// # Examples
///
/// ```
/// use fluid_rs_template::compiler::template_identifier;
///
/// let a = template_identifier("layout:Main", "Layouts/Main.html@1700000000");
/// assert_eq!(a, template_identifier("layout:Main", "Layouts/Main.html@1700000000"));
/// assert!(a.starts_with("layout_Main_"));
/// assert_ne!(a, template_identifier("layout:Main", "Layouts/Main.html@1700000001"));
/// ```
pub fn template_identifier(prefix: &str, identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    let mut identifier: String = prefix
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    identifier.push('_');
    for byte in digest {
        let _ = write!(identifier, "{byte:02x}");
    }
    identifier
}

/// A parsed template ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTemplate {
    identifier: String,
    root: Component,
    sections: BTreeMap<String, Vec<usize>>,
    layout: Option<Component>,
    compilable: bool,
    compiled: bool,
}

impl ParsedTemplate {
    /// Indexes the sections and layout of an intercepted tree.
    pub fn new(identifier: impl Into<String>, root: Component) -> Self {
        let mut sections = BTreeMap::new();
        let mut layout = None;
        index(&root, &mut Vec::new(), &mut sections, &mut layout);
        let compilable = is_compilable(&root);
        Self {
            identifier: identifier.into(),
            root,
            sections,
            layout,
            compilable,
            compiled: false,
        }
    }

    /// Returns the cache identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the root node.
    pub const fn root(&self) -> &Component {
        &self.root
    }

    /// Returns the section named `name`.
    pub fn section(&self, name: &str) -> Option<&Component> {
        let path = self.sections.get(name)?;
        path.iter()
            .try_fold(&self.root, |node, &index| node.children().get(index))
    }

    /// Returns the names of all sections.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Returns `true` if the template declares a layout.
    pub const fn has_layout(&self) -> bool {
        self.layout.is_some()
    }

    /// Evaluates the layout name, if the template declares a layout.
    pub fn layout_name(&self, ctx: &mut RenderingContext) -> TemplateResult<Option<String>> {
        let Some(layout) = &self.layout else {
            return Ok(None);
        };
        let name = match layout.arguments.get("name") {
            Some(node) => node.evaluate(ctx)?.to_display_string()?,
            None => String::new(),
        };
        Ok(Some(if name.is_empty() {
            DEFAULT_LAYOUT.to_string()
        } else {
            name
        }))
    }

    /// Returns `true` unless a component in the tree forbids caching.
    pub const fn is_compilable(&self) -> bool {
        self.compilable
    }

    /// Returns `true` if the template was stored in the cache.
    pub const fn is_compiled(&self) -> bool {
        self.compiled
    }
}

fn index(
    node: &Component,
    path: &mut Vec<usize>,
    sections: &mut BTreeMap<String, Vec<usize>>,
    layout: &mut Option<Component>,
) {
    for (i, child) in node.children().iter().enumerate() {
        path.push(i);
        match &child.kind {
            ComponentKind::Section => {
                if let Some(name) = &child.name {
                    sections.entry(name.clone()).or_insert_with(|| path.clone());
                }
            }
            ComponentKind::Layout if layout.is_none() => *layout = Some(child.clone()),
            _ => {}
        }
        index(child, path, sections, layout);
        path.pop();
    }
}

fn is_compilable(node: &Component) -> bool {
    let own = match &node.kind {
        ComponentKind::Invocation(invocation) => invocation
            .descriptor
            .as_ref()
            .map_or(true, |descriptor| descriptor.compilable),
        ComponentKind::Array(entries) => entries.iter().all(|entry| is_compilable(&entry.value)),
        _ => true,
    };
    own && node.children().iter().all(is_compilable)
        && node.arguments.iter().all(|(_, value)| is_compilable(value))
}

/// Turns template source into a [`ParsedTemplate`].
#[derive(Debug, Clone)]
pub struct TemplateParser {
    resolver: Arc<Resolver>,
    escaping: bool,
}

impl TemplateParser {
    /// Creates a parser. `escaping` is the default escaping mode.
    pub const fn new(resolver: Arc<Resolver>, escaping: bool) -> Self {
        Self { resolver, escaping }
    }

    /// Returns the resolver used for namespace resolution.
    pub const fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Parses `source` and stores the result under `identifier`.
    pub fn parse(&self, identifier: &str, source: &str) -> TemplateResult<ParsedTemplate> {
        let output = sequencer::sequence(source, &self.resolver, self.escaping)?;
        let root = escaping::intercept(output.root, output.escaping_enabled);
        let template = ParsedTemplate::new(identifier, root);
        tracing::debug!(
            identifier,
            sections = template.sections.len(),
            compilable = template.compilable,
            "Parsed template"
        );
        Ok(template)
    }
}

/// Get-or-parse-and-store front of the template cache.
pub struct Compiler {
    parser: TemplateParser,
    cache: Arc<dyn TemplateCache>,
}

impl Compiler {
    /// Creates a compiler storing parsed templates in `cache`.
    pub fn new(parser: TemplateParser, cache: Arc<dyn TemplateCache>) -> Self {
        Self { parser, cache }
    }

    /// Returns the parser.
    pub const fn parser(&self) -> &TemplateParser {
        &self.parser
    }

    /// Returns the cache.
    pub fn cache(&self) -> &dyn TemplateCache {
        self.cache.as_ref()
    }

    /// Returns the cached template for `identifier`, or parses the source
    /// produced by `source` and stores the result.
    ///
    /// `source` is only called on a cache miss. Templates that are not
    /// compilable are parsed on every call. A failing store is logged and
    /// the template is returned uncached.
    pub fn get_or_parse_and_store(
        &self,
        identifier: &str,
        source: impl FnOnce() -> TemplateResult<String>,
    ) -> TemplateResult<Arc<ParsedTemplate>> {
        if self.cache.has(identifier) {
            match self.cache.get(identifier) {
                Ok(template) => {
                    tracing::trace!(identifier, "Template cache hit");
                    return Ok(template);
                }
                Err(err) => {
                    tracing::warn!(identifier, error = %err, "Discarding unreadable cached template");
                }
            }
        }

        let mut template = self.parser.parse(identifier, &source()?)?;
        if !template.compilable {
            tracing::debug!(identifier, "Template is not compilable, skipping cache");
            return Ok(Arc::new(template));
        }

        template.compiled = true;
        let mut template = Arc::new(template);
        if let Err(err) = self.cache.store(identifier, Arc::clone(&template)) {
            tracing::warn!(identifier, error = %err, "Failed to store compiled template");
            Arc::make_mut(&mut template).compiled = false;
        }
        Ok(template)
    }

    /// Removes every stored template.
    pub fn flush(&self) -> TemplateResult<()> {
        self.cache.flush()
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("parser", &self.parser)
            .finish_non_exhaustive()
    }
}
