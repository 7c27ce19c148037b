//! Template engine: the entry point tying loader, resolver, compiler and
//! renderer together.
//!
//! # Examples
//!
//! ```
//! use fluid_rs_template::engine::Engine;
//! use fluid_rs_template::loaders::StringLoader;
//! use fluid_rs_template::value::Value;
//! use fluid_rs_template::variables::Variables;
//!
//! let loader = StringLoader::new();
//! loader.add_template("Hello", "Hello {name}!");
//! let engine = Engine::new(loader);
//!
//! let mut variables = Variables::new();
//! variables.insert("name".to_string(), Value::from("<World>"));
//! assert_eq!(engine.render("Hello", variables).unwrap(), "Hello &lt;World&gt;!");
//! ```

use std::sync::Arc;

use fluid_rs_core::error::TemplateResult;
use fluid_rs_core::logging::render_span;
use fluid_rs_core::settings::Settings;
use serde::Serialize;

use crate::cache::{cache_from_settings, InMemoryCache, TemplateCache};
use crate::compiler::{template_identifier, Compiler, ParsedTemplate, TemplateParser};
use crate::loaders::{FileSystemLoader, TemplateKind, TemplateLoader};
use crate::rendering::RenderingContext;
use crate::resolver::{Library, Resolver};
use crate::variables::Variables;

/// The template engine.
pub struct Engine {
    settings: Settings,
    resolver: Arc<Resolver>,
    compiler: Arc<Compiler>,
    loader: Arc<dyn TemplateLoader>,
}

impl Engine {
    /// Creates an engine with default settings, an in-memory cache and the
    /// given loader.
    pub fn new(loader: impl TemplateLoader + 'static) -> Self {
        let settings = Settings::default();
        let resolver = Arc::new(Resolver::new());
        let parser = TemplateParser::new(Arc::clone(&resolver), settings.escaping);
        Self {
            compiler: Arc::new(Compiler::new(parser, Arc::new(InMemoryCache::new()))),
            settings,
            resolver,
            loader: Arc::new(loader),
        }
    }

    /// Returns a builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Creates an engine from settings, with a filesystem loader over the
    /// configured paths.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the cache cannot be set up.
    pub fn from_settings(settings: Settings) -> TemplateResult<Self> {
        Self::builder().settings(settings).build()
    }

    /// Returns the settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
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

    /// Creates a rendering context with `variables` in scope.
    pub fn context(&self, variables: Variables) -> RenderingContext {
        RenderingContext::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.compiler),
            Arc::clone(&self.loader),
            variables,
        )
        .with_max_depth(self.settings.max_render_depth)
    }

    /// Renders the named template.
    pub fn render(&self, name: &str, variables: Variables) -> TemplateResult<String> {
        let span = render_span(name);
        let _guard = span.enter();
        self.context(variables).render_template(name)
    }

    /// Renders template source that does not come from the loader.
    pub fn render_source(&self, source: &str, variables: Variables) -> TemplateResult<String> {
        let template = self.parse_source(source)?;
        let span = render_span(template.identifier());
        let _guard = span.enter();
        self.context(variables).render_parsed(template)
    }

    /// Parses template source, keyed by a hash of its content.
    pub fn parse_source(&self, source: &str) -> TemplateResult<Arc<ParsedTemplate>> {
        let identifier = template_identifier(&TemplateKind::Template.prefix(""), source);
        self.compiler
            .get_or_parse_and_store(&identifier, || Ok(source.to_string()))
    }

    /// Loads and parses one template without rendering it.
    pub fn check(&self, kind: TemplateKind, name: &str) -> TemplateResult<Arc<ParsedTemplate>> {
        self.context(Variables::new()).load(kind, name)
    }

    /// Parses every template, layout and partial the loader can list.
    pub fn warmup(&self) -> WarmupReport {
        let mut report = WarmupReport::default();
        for kind in [TemplateKind::Template, TemplateKind::Layout, TemplateKind::Partial] {
            let names = match self.loader.list(kind) {
                Ok(names) => names,
                Err(err) => {
                    report.failures.push(WarmupFailure::new(kind, "*", &err));
                    continue;
                }
            };
            for name in names {
                match self.check(kind, &name) {
                    Ok(template) if template.is_compiled() => report.compiled.push(format!("{kind}:{name}")),
                    Ok(_) => report.uncompilable.push(format!("{kind}:{name}")),
                    Err(err) => report.failures.push(WarmupFailure::new(kind, &name, &err)),
                }
            }
        }
        tracing::info!(
            compiled = report.compiled.len(),
            uncompilable = report.uncompilable.len(),
            failed = report.failures.len(),
            "Cache warmup finished"
        );
        report
    }

    /// Removes every compiled template from the cache.
    pub fn flush_cache(&self) -> TemplateResult<()> {
        self.compiler.flush()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("resolver", &self.resolver)
            .field("compiler", &self.compiler)
            .finish_non_exhaustive()
    }
}

/// The outcome of [`Engine::warmup`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmupReport {
    /// Templates parsed and stored, as `kind:name`.
    pub compiled: Vec<String>,
    /// Templates parsed but not cacheable, as `kind:name`.
    pub uncompilable: Vec<String>,
    /// Templates that failed to load or parse.
    pub failures: Vec<WarmupFailure>,
}

impl WarmupReport {
    /// Returns `true` if nothing failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A template that failed during warmup.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupFailure {
    /// The template kind.
    pub kind: String,
    /// The template name.
    pub name: String,
    /// The error code.
    pub code: u32,
    /// The error message.
    pub error: String,
}

impl WarmupFailure {
    /// Records `error` for the template `kind:name`.
    pub fn new(kind: TemplateKind, name: &str, error: &fluid_rs_core::TemplateError) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            code: error.code(),
            error: error.to_string(),
        }
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    settings: Option<Settings>,
    libraries: Vec<Library>,
    namespaces: Vec<(String, String)>,
    ignored: Vec<String>,
    loader: Option<Arc<dyn TemplateLoader>>,
    cache: Option<Arc<dyn TemplateCache>>,
}

impl EngineBuilder {
    /// Sets the settings.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Registers a helper library.
    #[must_use]
    pub fn library(mut self, library: Library) -> Self {
        self.libraries.push(library);
        self
    }

    /// Registers a namespace alias for a library target.
    #[must_use]
    pub fn namespace(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.namespaces.push((alias.into(), target.into()));
        self
    }

    /// Passes namespaces matching `pattern` through verbatim.
    #[must_use]
    pub fn ignore_namespace(mut self, pattern: impl Into<String>) -> Self {
        self.ignored.push(pattern.into());
        self
    }

    /// Sets the loader, replacing the filesystem loader.
    #[must_use]
    pub fn loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Sets the cache, replacing the configured one.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured cache cannot be set up.
    pub fn build(self) -> TemplateResult<Engine> {
        let settings = self.settings.unwrap_or_default();

        let mut resolver = Resolver::new();
        for library in self.libraries {
            resolver.register_library(library);
        }
        for (alias, targets) in &settings.namespaces {
            for target in targets {
                resolver.register_namespace(alias.clone(), target.clone());
            }
        }
        for pattern in &settings.ignored_namespaces {
            resolver.ignore_namespace(pattern.clone());
        }
        for (alias, target) in self.namespaces {
            resolver.register_namespace(alias, target);
        }
        for pattern in self.ignored {
            resolver.ignore_namespace(pattern);
        }

        let cache = match self.cache {
            Some(cache) => cache,
            None => cache_from_settings(&settings.cache)?,
        };
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(FileSystemLoader::from_settings(&settings.paths)));

        let resolver = Arc::new(resolver);
        let parser = TemplateParser::new(Arc::clone(&resolver), settings.escaping);
        tracing::debug!(
            escaping = settings.escaping,
            cache = ?settings.cache.backend,
            "Template engine configured"
        );
        Ok(Engine {
            compiler: Arc::new(Compiler::new(parser, cache)),
            settings,
            resolver,
            loader,
        })
    }
}
