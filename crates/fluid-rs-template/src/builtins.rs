//! The core helper library (`f`).
//!
//! `f:section`, `f:layout` and `f:render` are handled natively by the
//! resolver and renderer; this module holds the helpers implemented through
//! the [`Helper`] trait.

use fluid_rs_core::error::TemplateResult;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::arguments::{ArgumentDefinition, ArgumentType, Arguments};
use crate::component::{Component, Escape};
use crate::rendering::{RenderChildren, RenderingContext};
use crate::resolver::{EscapingRole, Helper, Library, CORE_TARGET};
use crate::value::Value;
use crate::variables::{ScopeMode, Variables};

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);").expect("valid regex")
});

/// Builds the core library.
pub fn core_library() -> Library {
    let mut library = Library::new(CORE_TARGET);
    library.register("format.raw", RawHelper);
    library.register("format.htmlspecialchars", HtmlSpecialCharsHelper);
    library.register("if", IfHelper);
    library.register("then", BranchHelper);
    library.register("else", BranchHelper);
    library.register("comment", CommentHelper);
    library.register("alias", AliasHelper);
    library
}

/// Evaluates the `value` argument, or the children if it is absent.
fn value_or_children(
    arguments: &Arguments,
    children: RenderChildren<'_>,
    ctx: &mut RenderingContext,
) -> TemplateResult<Value> {
    match arguments.get("value") {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => children.evaluate(ctx),
    }
}

/// `f:format.raw`: outputs a value without escaping.
pub struct RawHelper;

impl Helper for RawHelper {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("value", ArgumentType::Mixed, "The value to output")]
    }

    fn escape_children(&self) -> Escape {
        Escape::Off
    }

    fn escape_output(&self) -> Escape {
        Escape::Off
    }

    fn escaping_role(&self) -> Option<EscapingRole> {
        Some(EscapingRole::Raw)
    }

    fn render(
        &self,
        arguments: &Arguments,
        children: RenderChildren<'_>,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        value_or_children(arguments, children, ctx)
    }
}

/// `f:format.htmlspecialchars`: escapes a value itself.
pub struct HtmlSpecialCharsHelper;

impl Helper for HtmlSpecialCharsHelper {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![
            ArgumentDefinition::new("value", ArgumentType::String, "The string to escape"),
            ArgumentDefinition::new("keepQuotes", ArgumentType::Boolean, "Leave quotes unescaped")
                .with_default(false),
            ArgumentDefinition::new("doubleEncode", ArgumentType::Boolean, "Encode existing entities")
                .with_default(true),
        ]
    }

    fn escape_children(&self) -> Escape {
        Escape::Off
    }

    fn escape_output(&self) -> Escape {
        Escape::Off
    }

    fn escaping_role(&self) -> Option<EscapingRole> {
        Some(EscapingRole::Escape)
    }

    fn render(
        &self,
        arguments: &Arguments,
        children: RenderChildren<'_>,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        let text = match value_or_children(arguments, children, ctx)? {
            Value::String(text) => text,
            Value::Object(object) => match object.to_display() {
                Some(text) => text,
                None => return Ok(Value::Object(object)),
            },
            other => return Ok(other),
        };
        Ok(Value::String(escape_special_chars(
            &text,
            arguments.get_bool("keepQuotes"),
            arguments.get_bool("doubleEncode"),
        )))
    }
}

/// Escapes `&`, `<`, `>` and, unless `keep_quotes` is set, both quotes.
/// Existing entities are left alone unless `double_encode` is set.
pub fn escape_special_chars(text: &str, keep_quotes: bool, double_encode: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for (i, ch) in text.char_indices() {
        match ch {
            '&' if !double_encode && ENTITY.is_match(&text[i..]) => escaped.push('&'),
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if !keep_quotes => escaped.push_str("&quot;"),
            '\'' if !keep_quotes => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn is_core_helper(node: &Component, identifier: &str) -> bool {
    node.as_invocation()
        .is_some_and(|inv| inv.target == CORE_TARGET && inv.identifier == identifier)
}

/// `f:if`: renders `then` or `else`, given as arguments or as
/// `f:then`/`f:else` children.
///
/// Without `f:then`, the children other than `f:else` are the then-branch.
pub struct IfHelper;

impl Helper for IfHelper {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![
            ArgumentDefinition::new("condition", ArgumentType::Boolean, "The condition to test")
                .with_default(false),
            ArgumentDefinition::new("then", ArgumentType::Mixed, "Output if the condition holds"),
            ArgumentDefinition::new("else", ArgumentType::Mixed, "Output otherwise"),
        ]
    }

    fn escape_children(&self) -> Escape {
        Escape::On
    }

    fn escape_output(&self) -> Escape {
        Escape::Off
    }

    fn render(
        &self,
        arguments: &Arguments,
        children: RenderChildren<'_>,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        let (branch, helper) = if arguments.get_bool("condition") {
            ("then", "then")
        } else {
            ("else", "else")
        };
        if let Some(value) = arguments.get(branch) {
            return Ok(value.clone());
        }

        let nodes = children.nodes();
        if let Some(node) = nodes.iter().find(|node| is_core_helper(node, helper)) {
            return node.evaluate(ctx);
        }
        if branch == "else" {
            return Ok(Value::Null);
        }

        let then_nodes: Vec<&Component> = nodes
            .iter()
            .filter(|node| !is_core_helper(node, "else"))
            .collect();
        match then_nodes.as_slice() {
            [] => Ok(Value::Null),
            [only] => only.evaluate(ctx),
            many => {
                let mut output = String::new();
                for node in many {
                    output.push_str(&node.evaluate(ctx)?.to_display_string()?);
                }
                Ok(Value::String(output))
            }
        }
    }
}

/// `f:then` and `f:else`: render their children when chosen by `f:if`.
pub struct BranchHelper;

impl Helper for BranchHelper {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        Vec::new()
    }

    fn escape_children(&self) -> Escape {
        Escape::On
    }

    fn escape_output(&self) -> Escape {
        Escape::Off
    }

    fn render(
        &self,
        _arguments: &Arguments,
        children: RenderChildren<'_>,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        children.evaluate(ctx)
    }
}

/// `f:comment`: renders nothing.
pub struct CommentHelper;

impl Helper for CommentHelper {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        Vec::new()
    }

    fn escape_output(&self) -> Escape {
        Escape::Off
    }

    fn render(
        &self,
        _arguments: &Arguments,
        _children: RenderChildren<'_>,
        _ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        Ok(Value::Null)
    }
}

/// `f:alias`: renders the children with extra variables in scope.
pub struct AliasHelper;

impl Helper for AliasHelper {
    fn arguments(&self) -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::new("map", ArgumentType::Array, "Variables to add").required()]
    }

    fn escape_output(&self) -> Escape {
        Escape::Off
    }

    fn render(
        &self,
        arguments: &Arguments,
        children: RenderChildren<'_>,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        let variables: Variables = match arguments.get("map") {
            Some(Value::Map(map)) => map.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, value)| (i.to_string(), value.clone()))
                .collect(),
            _ => Variables::new(),
        };
        ctx.variables_mut().push(ScopeMode::Inherit(variables));
        let result = children.evaluate(ctx);
        ctx.variables_mut().pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::NullCache;
    use crate::compiler::{Compiler, TemplateParser};
    use crate::loaders::StringLoader;
    use crate::resolver::Resolver;

    fn render(source: &str, variables: &[(&str, Value)]) -> String {
        let loader = StringLoader::new();
        loader.add_template("t", source);
        let resolver = Arc::new(Resolver::new());
        let compiler = Arc::new(Compiler::new(
            TemplateParser::new(Arc::clone(&resolver), true),
            Arc::new(NullCache),
        ));
        let variables = variables
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        let mut ctx = RenderingContext::new(resolver, compiler, Arc::new(loader), variables);
        ctx.render_template("t").unwrap()
    }

    #[test]
    fn test_escape_special_chars() {
        assert_eq!(
            escape_special_chars("<a href=\"x\">'&amp;'</a>", false, true),
            "&lt;a href=&quot;x&quot;&gt;&#039;&amp;amp;&#039;&lt;/a&gt;"
        );
        assert_eq!(escape_special_chars("\"&amp; &\"", true, false), "\"&amp; &amp;\"");
    }

    #[test]
    fn test_raw_and_htmlspecialchars() {
        let html = Value::from("<em>");
        assert_eq!(render("{v -> f:format.raw()}", &[("v", html.clone())]), "<em>");
        assert_eq!(render("<f:format.raw value=\"{v}\" />", &[("v", html.clone())]), "<em>");
        assert_eq!(
            render("{v -> f:format.htmlspecialchars()}", &[("v", html.clone())]),
            "&lt;em&gt;"
        );
        assert_eq!(
            render("{v -> f:format.raw() -> f:format.htmlspecialchars()}", &[("v", html)]),
            "&lt;em&gt;"
        );
        assert_eq!(render("{n -> f:format.htmlspecialchars()}", &[("n", Value::Integer(3))]), "3");
    }

    #[test]
    fn test_if_arguments() {
        let source = "{f:if(condition: '{a} > 1', then: 'big', else: 'small')}";
        assert_eq!(render(source, &[("a", Value::Integer(2))]), "big");
        assert_eq!(render(source, &[("a", Value::Integer(1))]), "small");
    }

    #[test]
    fn test_if_children() {
        let source = "<f:if condition=\"{flag}\"><f:then>yes {v}</f:then><f:else>no</f:else></f:if>";
        assert_eq!(
            render(source, &[("flag", Value::Bool(true)), ("v", Value::from("<"))]),
            "yes &lt;"
        );
        assert_eq!(render(source, &[("flag", Value::Bool(false))]), "no");

        let plain = "<f:if condition=\"{flag}\">shown<f:else>hidden</f:else></f:if>";
        assert_eq!(render(plain, &[("flag", Value::Bool(true))]), "shown");
        assert_eq!(render(plain, &[("flag", Value::Bool(false))]), "hidden");
        assert_eq!(render("<f:if condition=\"0\">x</f:if>", &[]), "");
    }

    #[test]
    fn test_comment_renders_nothing() {
        assert_eq!(render("a<f:comment>{missing.deep} b</f:comment>c", &[]), "ac");
    }

    #[test]
    fn test_alias_scope() {
        let source = "<f:alias map=\"{x: 'inner', y: v}\">{x}{y}{v}</f:alias>{x}";
        assert_eq!(render(source, &[("v", Value::from("&"))]), "inner&amp;&amp;");
    }
}
