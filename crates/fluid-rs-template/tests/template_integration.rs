//! Integration tests for the parse -> cache -> render pipeline.
//!
//! These tests drive the public [`Engine`] API end to end, covering:
//! 1. Escaping across tag, inline and chained syntax
//! 2. Namespace resolution and argument validation
//! 3. Boolean conditions
//! 4. Compiled-template caching
//! 5. Layouts, sections and partials from the filesystem

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fluid_rs_core::settings::{CacheBackendKind, CacheSettings, PathSettings, Settings};
use fluid_rs_core::TemplateResult;
use fluid_rs_template::arguments::{ArgumentDefinition, ArgumentType, Arguments};
use fluid_rs_template::component::Escape;
use fluid_rs_template::loaders::{StringLoader, TemplateKind, TemplateLoader};
use fluid_rs_template::rendering::{RenderChildren, RenderingContext};
use fluid_rs_template::resolver::{Helper, Library};
use fluid_rs_template::value::TemplateObject;
use fluid_rs_template::{Engine, Value, Variables};

// ============================================================================
// Shared helpers
// ============================================================================

/// Outputs its `value` argument, or its children when none is given.
/// Escaping flags are configurable.
struct Echo {
    children: Escape,
    output: Escape,
}

impl Helper for Echo {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("value", ArgumentType::Mixed, "The value to output")]
    }

    fn escape_children(&self) -> Escape {
        self.children
    }

    fn escape_output(&self) -> Escape {
        self.output
    }

    fn render(
        &self,
        arguments: &Arguments,
        children: RenderChildren<'_>,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        match arguments.get("value") {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => children.evaluate(ctx),
        }
    }
}

/// Requires a `value` argument and outputs it.
struct Required;

impl Helper for Required {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("value", ArgumentType::String, "The value").required()]
    }

    fn render(
        &self,
        arguments: &Arguments,
        _children: RenderChildren<'_>,
        _ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        Ok(arguments.get("value").cloned().unwrap_or_default())
    }
}

/// Counts its invocations and forbids caching.
struct Volatile(Arc<AtomicUsize>);

impl Helper for Volatile {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        Vec::new()
    }

    fn is_compilable(&self) -> bool {
        false
    }

    fn render(
        &self,
        _arguments: &Arguments,
        _children: RenderChildren<'_>,
        _ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        Ok(Value::from(self.0.fetch_add(1, Ordering::SeqCst)))
    }
}

#[derive(Debug)]
struct User {
    name: &'static str,
}

impl TemplateObject for User {
    fn type_name(&self) -> &str {
        "User"
    }

    fn get(&self, key: &str) -> Option<Value> {
        (key == "name").then(|| Value::from(self.name))
    }

    fn to_display(&self) -> Option<String> {
        Some(self.name.to_string())
    }
}

/// A loader counting how often source is read.
struct CountingLoader {
    inner: Arc<StringLoader>,
    loads: Arc<AtomicUsize>,
}

impl TemplateLoader for CountingLoader {
    fn identity(&self, kind: TemplateKind, name: &str) -> TemplateResult<String> {
        self.inner.identity(kind, name)
    }

    fn load(&self, kind: TemplateKind, name: &str) -> TemplateResult<String> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(kind, name)
    }
}

fn test_library(counter: Arc<AtomicUsize>) -> Library {
    let mut library = Library::new("Test\\Helpers");
    library.register(
        "echo",
        Echo {
            children: Escape::Inherit,
            output: Escape::Inherit,
        },
    );
    let flags = [
        ("inherit", Escape::Inherit),
        ("on", Escape::On),
        ("off", Escape::Off),
    ];
    for (children_name, children) in flags {
        for (output_name, output) in flags {
            library.register(
                format!("echo.{children_name}.{output_name}"),
                Echo { children, output },
            );
        }
    }
    library.register("required", Required);
    library.register("volatile", Volatile(counter));
    library
}

fn engine_with(loader: impl TemplateLoader + 'static) -> Engine {
    Engine::builder()
        .library(test_library(Arc::new(AtomicUsize::new(0))))
        .namespace("test", "Test\\Helpers")
        .loader(loader)
        .build()
        .unwrap()
}

fn engine() -> Engine {
    engine_with(StringLoader::new())
}

fn vars(pairs: &[(&str, Value)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn render(source: &str, pairs: &[(&str, Value)]) -> String {
    engine().render_source(source, vars(pairs)).unwrap()
}

const MARKUP: &str = "<strong>Bla</strong>";
const ESCAPED: &str = "&lt;strong&gt;Bla&lt;/strong&gt;";

// ============================================================================
// 1. Escaping
// ============================================================================

#[test]
fn test_plain_accessor_is_escaped() {
    assert_eq!(render("{value}", &[("value", Value::from(MARKUP))]), ESCAPED);
}

#[test]
fn test_literal_text_is_never_escaped() {
    assert_eq!(render("<b>&amp;</b>", &[]), "<b>&amp;</b>");
}

#[test]
fn test_default_helper_escapes_output_once() {
    let value = [("value", Value::from(MARKUP))];
    assert_eq!(render("<test:echo>{value}</test:echo>", &value), ESCAPED);
    assert_eq!(render("{value -> test:echo()}", &value), ESCAPED);
}

#[test]
fn test_escaping_flag_matrix() {
    const DOUBLE: &str = "&amp;lt;strong&amp;gt;Bla&amp;lt;/strong&amp;gt;";
    let value = [("value", Value::from(MARKUP))];
    // (children flag, output flag, content as child, content as argument)
    let cases = [
        ("inherit", "inherit", ESCAPED, ESCAPED),
        ("inherit", "on", ESCAPED, ESCAPED),
        ("inherit", "off", ESCAPED, MARKUP),
        ("on", "inherit", DOUBLE, ESCAPED),
        ("on", "on", DOUBLE, ESCAPED),
        ("on", "off", ESCAPED, MARKUP),
        ("off", "inherit", ESCAPED, ESCAPED),
        ("off", "on", ESCAPED, ESCAPED),
        ("off", "off", MARKUP, MARKUP),
    ];
    for (children, output, as_child, as_argument) in cases {
        let helper = format!("test:echo.{children}.{output}");
        assert_eq!(
            render(&format!("<{helper}>{{value}}</{helper}>"), &value),
            as_child,
            "{helper} with child content"
        );
        assert_eq!(
            render(&format!("<{helper} value=\"{{value}}\" />"), &value),
            as_argument,
            "{helper} with tag argument"
        );
        assert_eq!(
            render(&format!("{{{helper}(value: value)}}"), &value),
            as_argument,
            "{helper} with inline argument"
        );
    }
}

#[test]
fn test_raw_argument_value_is_not_escaped() {
    let value = [("value", Value::from(MARKUP))];
    assert_eq!(
        render("<test:required value=\"{value -> f:format.raw()}\" />", &value),
        MARKUP
    );
    assert_eq!(
        render("{test:required(value: '{value -> f:format.raw()}')}", &value),
        MARKUP
    );
    assert_eq!(
        render("<test:echo value=\"{value -> f:format.raw()}\" />", &value),
        MARKUP
    );
    assert_eq!(render("<test:required value=\"{value}\" />", &value), ESCAPED);
    assert_eq!(render("{test:required(value: value)}", &value), ESCAPED);
}

#[test]
fn test_escaping_modifier_disables_everything() {
    let value = [("value", Value::from(MARKUP))];
    assert_eq!(render("{escaping off}{value}", &value), MARKUP);
    assert_eq!(render("{escaping off}<test:echo>{value}</test:echo>", &value), MARKUP);
    assert_eq!(
        engine()
            .render_source("{escaping off}{escaping on}", Variables::new())
            .unwrap_err()
            .code(),
        1006
    );
}

#[test]
fn test_raw_in_chain_wins() {
    let value = [("value", Value::from(MARKUP))];
    assert_eq!(render("{value -> f:format.raw() -> test:echo()}", &value), MARKUP);
    assert_eq!(
        render("{value -> f:format.htmlspecialchars() -> test:echo()}", &value),
        ESCAPED
    );
    assert_eq!(
        render(
            "{value -> f:format.raw() -> f:format.htmlspecialchars() -> test:echo()}",
            &value
        ),
        ESCAPED
    );
}

#[test]
fn test_objects_render_through_display() {
    let user: Arc<dyn TemplateObject> = Arc::new(User { name: "<Ada>" });
    let user = Value::from(user);
    assert_eq!(render("{user}|{user.name}", &[("user", user)]), "&lt;Ada&gt;|&lt;Ada&gt;");
}

#[test]
fn test_arrays_are_not_stringable() {
    let err = engine()
        .render_source("a{list}", vars(&[("list", Value::from(vec![1, 2]))]))
        .unwrap_err();
    assert_eq!(err.code(), 3001);
}

// ============================================================================
// 2. Namespaces and arguments
// ============================================================================

#[test]
fn test_unknown_namespace_is_fatal() {
    let err = engine()
        .render_source("<invalid:foo>x</invalid:foo>", Variables::new())
        .unwrap_err();
    assert_eq!(err.code(), 1002);
    assert!(err.to_string().contains("invalid:foo"));
    assert!(err.to_string().contains("line 1, column 1"));
}

#[test]
fn test_ignored_namespace_passes_through_verbatim() {
    let body = "<invalid:foo bar=\"baz\">x <invalid:bar/></invalid:foo>";
    assert_eq!(render(&format!("{{namespace invalid}}{body}"), &[]), body);
    assert_eq!(render(&format!("{{namespace inv*}}{body}"), &[]), body);
}

#[test]
fn test_missing_argument_code_is_stable_across_syntaxes() {
    let tag = engine()
        .render_source("<test:required />", Variables::new())
        .unwrap_err();
    let inline = engine()
        .render_source("{test:required()}", Variables::new())
        .unwrap_err();
    assert_eq!(tag.code(), 2001);
    assert_eq!(inline.code(), 2001);
    assert!(tag.to_string().contains("'value'"));
}

#[test]
fn test_undeclared_argument_is_rejected() {
    let err = engine()
        .render_source("<test:required value=\"a\" other=\"b\" />", Variables::new())
        .unwrap_err();
    assert_eq!(err.code(), 2002);
}

#[test]
fn test_numeric_and_array_arguments() {
    assert_eq!(render("<test:required value=\"42\" />", &[]), "42");
    assert_eq!(
        render("<f:alias map=\"{x: 'a', y: 'b'}\">{x}{y}</f:alias>", &[]),
        "ab"
    );
}

#[test]
fn test_cdata_is_removed() {
    assert_eq!(render("a <![CDATA[b]]> c", &[]), "a  c");
}

#[test]
fn test_comment_syntax_is_removed() {
    assert_eq!(render("a{# {not parsed} #}b", &[]), "ab");
}

#[test]
fn test_invalid_braces_are_text() {
    assert_eq!(
        render("<script>if (a) { b(); }</script>", &[]),
        "<script>if (a) { b(); }</script>"
    );
    assert_eq!(render("<p>{ it's }</p>", &[]), "<p>{ it's }</p>");
    assert_eq!(
        render("<p>{ it's }</p>{value}", &[("value", Value::from(MARKUP))]),
        format!("<p>{{ it's }}</p>{ESCAPED}")
    );
}

// ============================================================================
// 3. Boolean conditions
// ============================================================================

#[test]
fn test_boolean_table() {
    let user: Arc<dyn TemplateObject> = Arc::new(User { name: "ada" });
    let other: Arc<dyn TemplateObject> = Arc::new(User { name: "ada" });
    let variables = [
        ("a", Value::from("x")),
        ("n", Value::Integer(4)),
        ("flag", Value::Bool(false)),
        ("list", Value::from(vec![1])),
        ("empty", Value::Array(Vec::new())),
        ("user", Value::from(Arc::clone(&user))),
        ("same", Value::from(user)),
        ("other", Value::from(other)),
    ];
    let cases = [
        ("1 && 1", true),
        ("1 && 0", false),
        ("(1 && 0) || 1", true),
        ("'stringA' == 'stringA'", true),
        ("'stringA' == 42", false),
        ("43 % 2", true),
        ("42 % 2", false),
        ("{user} != {other}", true),
        ("1 == 1", true),
        ("1 == 2", false),
        ("{a} == 'x'", true),
        ("'{a}' == 'x'", true),
        ("{a} != 'x'", false),
        ("!{flag}", true),
        ("{n} % 2 == 0", true),
        ("{n} > 3 && {n} < 5", true),
        ("({a} == 'y' || {flag}) && {n} > 3", false),
        ("{a} == 'y' or {n} >= 4", true),
        ("{missing}", false),
        ("{list}", true),
        ("{empty}", false),
        ("{user} == {same}", true),
        ("{user} == {other}", false),
        ("{user} == 'ada'", true),
        ("TRUE", true),
        ("off", false),
    ];
    for (condition, expected) in cases {
        let source = format!("<f:if condition=\"{condition}\" then=\"T\" else=\"F\" />");
        let output = render(&source, &variables);
        assert_eq!(output, if expected { "T" } else { "F" }, "{condition}");
    }
}

#[test]
fn test_modulo_by_zero_is_an_error() {
    let err = engine()
        .render_source("<f:if condition=\"3 % 0\">x</f:if>", Variables::new())
        .unwrap_err();
    assert_eq!(err.code(), 3004);
}

// ============================================================================
// 4. Caching
// ============================================================================

#[test]
fn test_cache_idempotence() {
    let inner = Arc::new(StringLoader::new());
    inner.add_template("Index", "Hello {name}");
    let loads = Arc::new(AtomicUsize::new(0));
    let engine = engine_with(CountingLoader {
        inner: Arc::clone(&inner),
        loads: Arc::clone(&loads),
    });

    let first = engine.render("Index", vars(&[("name", Value::from("A"))])).unwrap();
    let second = engine.render("Index", vars(&[("name", Value::from("A"))])).unwrap();
    assert_eq!(first, second);
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    inner.add_template("Index", "Bye {name}");
    assert_eq!(
        engine.render("Index", vars(&[("name", Value::from("A"))])).unwrap(),
        "Bye A"
    );
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_non_compilable_templates_are_reparsed() {
    let inner = Arc::new(StringLoader::new());
    inner.add_template("Index", "<test:volatile />");
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::new(AtomicUsize::new(0));
    let engine = Engine::builder()
        .library(test_library(Arc::clone(&counter)))
        .namespace("test", "Test\\Helpers")
        .loader(CountingLoader {
            inner,
            loads: Arc::clone(&loads),
        })
        .build()
        .unwrap();

    assert_eq!(engine.render("Index", Variables::new()).unwrap(), "0");
    assert_eq!(engine.render("Index", Variables::new()).unwrap(), "1");
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

// ============================================================================
// 5. Filesystem layouts, sections, partials and the file cache
// ============================================================================

fn write(root: &std::path::Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn file_settings(root: &std::path::Path) -> Settings {
    Settings {
        paths: PathSettings {
            template_root_paths: vec![root.join("Templates")],
            layout_root_paths: vec![root.join("Layouts")],
            partial_root_paths: vec![root.join("Partials")],
            format: "html".to_string(),
        },
        cache: CacheSettings {
            backend: CacheBackendKind::File,
            directory: Some(root.join("cache")),
        },
        ..Settings::default()
    }
}

#[test]
fn test_filesystem_layout_and_partials() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "Templates/Blog/Show.html",
        "<f:layout name=\"Page\" />\n\
         <f:section name=\"title\">{post.title}</f:section>\n\
         <f:section name=\"main\"><f:render partial=\"Card\" arguments=\"{post: post}\" /></f:section>",
    );
    write(
        root,
        "Layouts/Page.html",
        "<h1><f:render section=\"title\" /></h1><main><f:render section=\"main\" /></main>\
         <f:render section=\"footer\" default=\"-\" />",
    );
    write(root, "Partials/Card.html", "<article>{post.body}</article>");

    let engine = Engine::from_settings(file_settings(root)).unwrap();
    let mut post = Variables::new();
    post.insert("title".to_string(), Value::from("A & B"));
    post.insert("body".to_string(), Value::from("<p>"));
    let variables = vars(&[("post", Value::Map(post))]);

    let expected = "<h1>A &amp; B</h1><main><article>&lt;p&gt;</article></main>-";
    assert_eq!(engine.render("Blog/Show", variables.clone()).unwrap(), expected);
    let cached = fs::read_dir(root.join("cache")).unwrap().count();
    assert_eq!(cached, 3);

    let restarted = Engine::from_settings(file_settings(root)).unwrap();
    assert_eq!(restarted.render("Blog/Show", variables).unwrap(), expected);
}

#[test]
fn test_warmup_parses_every_template() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "Templates/Index.html", "{a}");
    write(root, "Templates/Broken.html", "<f:if condition=\"1\">");
    write(root, "Layouts/Default.html", "<f:render section=\"main\" />");
    write(root, "Partials/Nav/Item.html", "<li>{label}</li>");

    let engine = Engine::from_settings(file_settings(root)).unwrap();
    let report = engine.warmup();
    assert_eq!(
        report.compiled,
        ["template:Index", "layout:Default", "partial:Nav/Item"]
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "Broken");

    engine.flush_cache().unwrap();
    assert_eq!(fs::read_dir(root.join("cache")).unwrap().count(), 0);
}
