//! Rendering: the context threaded through every evaluation.
//!
//! A [`RenderingContext`] carries the variable scope stack, the resolver,
//! the compiler and the loader, and a stack of frames recording which
//! template is being rendered and as what ([`RenderingType`]). Every nested
//! render (layout, section, partial) pushes a frame and pops it again on
//! every exit path, error or not.

use std::fmt;
use std::sync::Arc;

use fluid_rs_core::error::{TemplateError, TemplateResult};

use crate::arguments::Arguments;
use crate::compiler::{template_identifier, Compiler, ParsedTemplate};
use crate::component::{evaluate_nodes, Component};
use crate::loaders::{TemplateKind, TemplateLoader};
use crate::resolver::Resolver;
use crate::value::Value;
use crate::variables::{ScopeMode, VariableProvider, Variables};

/// The default limit of nested renders.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What the template on top of the frame stack is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingType {
    /// A top-level template.
    Template,
    /// A partial.
    Partial,
    /// A layout wrapping a template.
    Layout,
}

#[derive(Debug)]
struct Frame {
    kind: RenderingType,
    template: Arc<ParsedTemplate>,
}

/// The state of one render.
pub struct RenderingContext {
    variables: VariableProvider,
    resolver: Arc<Resolver>,
    compiler: Arc<Compiler>,
    loader: Arc<dyn TemplateLoader>,
    frames: Vec<Frame>,
    max_depth: usize,
}

impl RenderingContext {
    /// Creates a context with `variables` as the outermost scope.
    pub fn new(
        resolver: Arc<Resolver>,
        compiler: Arc<Compiler>,
        loader: Arc<dyn TemplateLoader>,
        variables: Variables,
    ) -> Self {
        Self {
            variables: VariableProvider::with_variables(variables),
            resolver,
            compiler,
            loader,
            frames: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the limit of nested renders.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the variable scopes.
    pub const fn variables(&self) -> &VariableProvider {
        &self.variables
    }

    /// Returns the variable scopes for modification.
    pub fn variables_mut(&mut self) -> &mut VariableProvider {
        &mut self.variables
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Returns the compiler.
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Returns the loader.
    pub fn loader(&self) -> &dyn TemplateLoader {
        self.loader.as_ref()
    }

    /// Returns what the current template is rendered as.
    pub fn rendering_type(&self) -> Option<RenderingType> {
        self.frames.last().map(|frame| frame.kind)
    }

    /// Returns the number of nested renders in progress.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Loads a template through the compiler.
    ///
    /// The loader's identity is asked first; the source is only read if
    /// the compiled template is not cached.
    pub fn load(&self, kind: TemplateKind, name: &str) -> TemplateResult<Arc<ParsedTemplate>> {
        let identity = self.loader.identity(kind, name)?;
        let identifier = template_identifier(&kind.prefix(name), &identity);
        let loader = Arc::clone(&self.loader);
        self.compiler
            .get_or_parse_and_store(&identifier, || loader.load(kind, name))
    }

    /// Renders a parsed top-level template, wrapped in its layout if it
    /// declares one.
    pub fn render_parsed(&mut self, template: Arc<ParsedTemplate>) -> TemplateResult<String> {
        self.scoped(RenderingType::Template, template, None, |ctx, template| {
            match template.layout_name(ctx)? {
                Some(layout) => {
                    tracing::debug!(layout = %layout, "Rendering layout");
                    let layout = ctx.load(TemplateKind::Layout, &layout)?;
                    ctx.scoped(RenderingType::Layout, layout, None, |ctx, layout| {
                        render_nodes(layout.root().children(), ctx)
                    })
                }
                None => render_nodes(template.root().children(), ctx),
            }
        })
    }

    /// Loads and renders a top-level template.
    pub fn render_template(&mut self, name: &str) -> TemplateResult<String> {
        let template = self.load(TemplateKind::Template, name)?;
        self.render_parsed(template)
    }

    /// Renders a section of the current template.
    ///
    /// While a layout is rendered, sections are looked up in the template
    /// the layout wraps. Returns `Ok(None)` for a missing optional section.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownSection`] for a missing section
    /// that is not optional.
    pub fn render_section(
        &mut self,
        name: &str,
        scope: ScopeMode,
        optional: bool,
    ) -> TemplateResult<Option<String>> {
        let (kind, template) = self.section_owner()?;
        if template.section(name).is_none() {
            if optional {
                return Ok(None);
            }
            return Err(TemplateError::UnknownSection {
                name: name.to_string(),
            });
        }
        self.scoped(kind, template, Some(scope), |ctx, template| {
            let children = template.section(name).map_or(&[][..], Component::children);
            render_nodes(children, ctx)
        })
        .map(Some)
    }

    /// Renders a partial, or one section of it.
    ///
    /// Returns `Ok(None)` if the partial or section is missing and
    /// `optional` is set.
    pub fn render_partial(
        &mut self,
        name: &str,
        section: Option<&str>,
        scope: ScopeMode,
        optional: bool,
    ) -> TemplateResult<Option<String>> {
        let template = match self.load(TemplateKind::Partial, name) {
            Ok(template) => template,
            Err(TemplateError::TemplateNotFound(_)) if optional => return Ok(None),
            Err(err) => return Err(err),
        };
        self.scoped(RenderingType::Partial, template, Some(scope), |ctx, template| {
            match section {
                Some(section) => ctx.render_section(section, ScopeMode::Inherit(Variables::new()), optional),
                None => render_nodes(template.root().children(), ctx).map(Some),
            }
        })
    }

    /// Returns the template sections are resolved against.
    fn section_owner(&self) -> TemplateResult<(RenderingType, Arc<ParsedTemplate>)> {
        let index = match self.frames.last() {
            Some(frame) if frame.kind == RenderingType::Layout => self.frames.len().checked_sub(2),
            Some(_) => self.frames.len().checked_sub(1),
            None => None,
        };
        index
            .and_then(|i| self.frames.get(i))
            .map(|frame| (frame.kind, Arc::clone(&frame.template)))
            .ok_or_else(|| TemplateError::Evaluation("No template is being rendered".to_string()))
    }

    /// Runs `f` with a frame for `template` pushed, and with a new variable
    /// scope if `scope` is given. Both are popped before returning.
    fn scoped<T>(
        &mut self,
        kind: RenderingType,
        template: Arc<ParsedTemplate>,
        scope: Option<ScopeMode>,
        f: impl FnOnce(&mut Self, &ParsedTemplate) -> TemplateResult<T>,
    ) -> TemplateResult<T> {
        if self.frames.len() >= self.max_depth {
            return Err(TemplateError::RenderDepthExceeded {
                depth: self.max_depth,
            });
        }
        let new_scope = scope.is_some();
        if let Some(mode) = scope {
            self.variables.push(mode);
        }
        self.frames.push(Frame {
            kind,
            template: Arc::clone(&template),
        });

        let result = f(self, &template);

        self.frames.pop();
        if new_scope {
            self.variables.pop();
        }
        result
    }
}

impl fmt::Debug for RenderingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderingContext")
            .field("variables", &self.variables)
            .field("frames", &self.frames)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

fn render_nodes(nodes: &[Component], ctx: &mut RenderingContext) -> TemplateResult<String> {
    evaluate_nodes(nodes, ctx)?.to_display_string()
}

/// Renders an `f:render` node.
///
/// Without `arguments`, a section is rendered in a copy of the current
/// scope. Partials, and sections given `arguments`, get a fresh scope
/// holding only those variables. `default` implies `optional` and is
/// returned in place of a missing target.
pub fn render_reference(node: &Component, ctx: &mut RenderingContext) -> TemplateResult<Value> {
    let arguments = Arguments::evaluate(&node.arguments, &[], ctx)?;
    let section = arguments.get_string("section")?;
    let partial = arguments.get_string("partial")?;
    let optional = arguments.get_bool("optional") || arguments.has("default");

    let mut variables = match arguments.get("arguments") {
        None | Some(Value::Null) => None,
        Some(Value::Map(map)) => Some(map.clone()),
        Some(other) => {
            return Err(TemplateError::InvalidArgument {
                component: "f:render".to_string(),
                argument: "arguments".to_string(),
                message: format!("expected a map, got {}", other.type_name()),
            });
        }
    };
    if let Some(name) = arguments.get_string("contentAs")? {
        let content = RenderChildren::new(node.children()).render(ctx)?;
        variables
            .get_or_insert_with(Variables::new)
            .insert(name, Value::String(content));
    }

    let rendered = match (partial, section) {
        (Some(partial), section) => ctx.render_partial(
            &partial,
            section.as_deref(),
            ScopeMode::Fresh(variables.unwrap_or_default()),
            optional,
        )?,
        (None, Some(section)) => {
            let scope = variables.map_or_else(|| ScopeMode::Inherit(Variables::new()), ScopeMode::Fresh);
            ctx.render_section(&section, scope, optional)?
        }
        (None, None) => {
            return Err(TemplateError::InvalidArgument {
                component: "f:render".to_string(),
                argument: "section".to_string(),
                message: "either 'section' or 'partial' is required".to_string(),
            });
        }
    };

    Ok(match rendered {
        Some(output) => Value::String(output),
        None => arguments.get("default").cloned().unwrap_or_default(),
    })
}

/// A deferred handle to the children of an invocation.
///
/// Helpers decide whether, and how often, their children are evaluated.
#[derive(Debug, Clone, Copy)]
pub struct RenderChildren<'t> {
    children: &'t [Component],
}

impl<'t> RenderChildren<'t> {
    /// Wraps a list of child nodes.
    pub const fn new(children: &'t [Component]) -> Self {
        Self { children }
    }

    /// Returns `true` if there are no children.
    pub const fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the child nodes.
    pub const fn nodes(&self) -> &'t [Component] {
        self.children
    }

    /// Evaluates the children to a value.
    pub fn evaluate(&self, ctx: &mut RenderingContext) -> TemplateResult<Value> {
        evaluate_nodes(self.children, ctx)
    }

    /// Evaluates the children to a string.
    pub fn render(&self, ctx: &mut RenderingContext) -> TemplateResult<String> {
        render_nodes(self.children, ctx)
    }
}
