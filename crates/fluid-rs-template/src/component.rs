//! The component tree.
//!
//! A parsed template is a tree of [`Component`]s. Every component owns its
//! children exclusively; sections and layouts are found by walking down from
//! the root, never up. Adjacent text children are merged as they are added,
//! so a tree never contains two consecutive [`ComponentKind::Text`] siblings.

use std::sync::Arc;

use fluid_rs_core::error::{TemplateError, TemplateResult};
use serde::{Deserialize, Serialize};

use crate::arguments::{ArgumentCollection, Arguments};
use crate::boolean;
use crate::rendering::{self, RenderChildren, RenderingContext};
use crate::resolver::{ComponentDescriptor, DescriptorVariant};
use crate::value::{escape_html, Value};

/// A tri-state escaping flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Escape {
    /// Derived from the other flag (see [`effective_escaping`]).
    #[default]
    Inherit,
    /// Explicitly enabled.
    On,
    /// Explicitly disabled.
    Off,
}

impl Escape {
    /// Resolves the flag, using `inherited` when it is [`Escape::Inherit`].
    pub const fn resolve(self, inherited: bool) -> bool {
        match self {
            Self::Inherit => inherited,
            Self::On => true,
            Self::Off => false,
        }
    }
}

/// The resolved escaping behavior of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveEscaping {
    /// Whether dynamic children are escaped.
    pub children: bool,
    /// Whether the component's own output is escaped.
    pub output: bool,
}

/// Resolves a pair of escaping flags.
///
/// Output escaping defaults to on. Children escaping defaults to the
/// opposite of the effective output escaping, so content is escaped exactly
/// once unless both flags are set explicitly.
pub const fn effective_escaping(children: Escape, output: Escape) -> EffectiveEscaping {
    let output = output.resolve(true);
    EffectiveEscaping {
        children: children.resolve(!output),
        output,
    }
}

/// A numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    /// An integer literal such as `42`.
    Integer(i64),
    /// A decimal literal such as `4.2`.
    Float(f64),
}

impl Number {
    /// Parses a pure digit/decimal sequence (`12`, `-3`, `1.5`).
    pub fn parse(text: &str) -> Option<Self> {
        let digits = text.strip_prefix('-').unwrap_or(text);
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (digits, None),
        };
        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !fraction.map_or(true, all_digits) {
            return None;
        }
        if fraction.is_some() {
            text.parse().ok().map(Self::Float)
        } else {
            text.parse().ok().map(Self::Integer)
        }
    }

    /// Converts the literal to a runtime value.
    pub const fn to_value(self) -> Value {
        match self {
            Self::Integer(i) => Value::Integer(i),
            Self::Float(f) => Value::Float(f),
        }
    }
}

/// The key of an array literal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayKey {
    /// A bare identifier or quoted key.
    Name(String),
    /// A plain integer key.
    Index(i64),
}

/// One `key: value` pair of an array literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayEntry {
    /// The entry key.
    pub key: ArrayKey,
    /// The entry value.
    pub value: Component,
}

/// A call to a helper, as written in the template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// The namespace alias used in the template (`f`).
    pub namespace: String,
    /// The helper identifier (`format.raw`).
    pub identifier: String,
    /// The library target the alias resolved to.
    pub target: String,
    /// The resolved descriptor. Absent after deserialization until relinked.
    #[serde(skip)]
    pub descriptor: Option<Arc<ComponentDescriptor>>,
}

impl Invocation {
    /// Returns `namespace:identifier`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.namespace, self.identifier)
    }
}

/// The variant of a [`Component`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ComponentKind {
    /// A plain container; the root of every template.
    Entry,
    /// Literal text.
    Text(String),
    /// A numeric literal.
    Numeric(Number),
    /// An array literal.
    Array(Vec<ArrayEntry>),
    /// A variable lookup such as `{user.name}`.
    ObjectAccessor {
        /// The dot-separated variable path.
        path: String,
    },
    /// A boolean expression; the children are the captured expression stack.
    Boolean,
    /// HTML-escapes the value of its child.
    Escaping,
    /// Evaluates to null.
    Null,
    /// A named section, rendered on demand.
    Section,
    /// Selects the layout of the template.
    Layout,
    /// Renders a section or a partial.
    Reference,
    /// A helper call.
    Invocation(Invocation),
}

/// The result of [`Component::flatten`].
#[derive(Debug, Clone)]
pub enum Flattened {
    /// A component, either the only child or the original node.
    Node(Component),
    /// The primitive value of a single text or numeric child, or null.
    Value(Value),
}

/// A node of the parsed template tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// The variant of this node.
    pub kind: ComponentKind,
    /// The section name for sections.
    pub name: Option<String>,
    children: Vec<Component>,
    /// Supplied arguments for invocations, sections, layouts and references.
    pub arguments: ArgumentCollection,
    /// Escaping of dynamic children.
    pub escape_children: Escape,
    /// Escaping of this node's output.
    pub escape_output: Escape,
}

impl Component {
    /// Creates a component of the given kind without children.
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: None,
            children: Vec::new(),
            arguments: ArgumentCollection::default(),
            escape_children: Escape::Inherit,
            escape_output: Escape::Inherit,
        }
    }

    /// Creates an empty container.
    pub fn entry() -> Self {
        Self::new(ComponentKind::Entry)
    }

    /// Creates a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ComponentKind::Text(text.into()))
    }

    /// Creates a numeric node.
    pub fn numeric(number: Number) -> Self {
        Self::new(ComponentKind::Numeric(number))
    }

    /// Creates a variable lookup.
    pub fn accessor(path: impl Into<String>) -> Self {
        Self::new(ComponentKind::ObjectAccessor { path: path.into() })
    }

    /// Creates an array literal.
    pub fn array(entries: Vec<ArrayEntry>) -> Self {
        Self::new(ComponentKind::Array(entries))
    }

    /// Creates a null node.
    pub fn null() -> Self {
        Self::new(ComponentKind::Null)
    }

    /// Wraps a captured expression stack into a boolean node.
    ///
    /// A container's children become the stack; any other node becomes a
    /// single-item stack.
    pub fn boolean(captured: Self) -> Self {
        let mut node = Self::new(ComponentKind::Boolean);
        node.children = match captured.kind {
            ComponentKind::Entry => captured.children,
            _ => vec![captured],
        };
        node
    }

    /// Wraps a node into an escaping node.
    pub fn escaping(inner: Self) -> Self {
        let mut node = Self::new(ComponentKind::Escaping);
        node.children.push(inner);
        node
    }

    /// Creates an invocation of a resolved helper.
    pub fn invocation(
        namespace: impl Into<String>,
        identifier: impl Into<String>,
        descriptor: Arc<ComponentDescriptor>,
    ) -> Self {
        let mut node = Self::new(ComponentKind::Invocation(Invocation {
            namespace: namespace.into(),
            identifier: identifier.into(),
            target: descriptor.target.clone(),
            descriptor: None,
        }));
        node.escape_children = descriptor.escape_children;
        node.escape_output = descriptor.escape_output;
        if let ComponentKind::Invocation(invocation) = &mut node.kind {
            invocation.descriptor = Some(descriptor);
        }
        node
    }

    /// Returns the children of this node.
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Consumes the node, returning its children.
    pub fn into_children(self) -> Vec<Self> {
        self.children
    }

    /// Replaces every child with the result of `f`.
    pub fn map_children(&mut self, mut f: impl FnMut(Self) -> Self) {
        self.children = std::mem::take(&mut self.children)
            .into_iter()
            .map(&mut f)
            .collect();
    }

    /// Returns the invocation data if this node is a helper call.
    pub const fn as_invocation(&self) -> Option<&Invocation> {
        match &self.kind {
            ComponentKind::Invocation(invocation) => Some(invocation),
            _ => None,
        }
    }

    /// Returns the text if this node is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Appends a child.
    ///
    /// Text following a text child is merged into it, empty text is dropped
    /// and the children of a container are spliced in instead of nesting it.
    pub fn add_child(&mut self, child: Self) {
        if matches!(child.kind, ComponentKind::Entry) {
            for grandchild in child.children {
                self.add_child(grandchild);
            }
            return;
        }
        if let ComponentKind::Text(text) = &child.kind {
            if let Some(ComponentKind::Text(last)) = self.children.last_mut().map(|c| &mut c.kind) {
                last.push_str(text);
                return;
            }
            if text.is_empty() {
                return;
            }
        }
        self.children.push(child);
    }

    /// Collapses a trivially wrapping node.
    ///
    /// A node with exactly one child yields that child, or the child's
    /// primitive value when `extract` is set and the child is text or
    /// numeric. A childless node yields null when `extract` is set. Every
    /// other node is returned unchanged.
    pub fn flatten(mut self, extract: bool) -> Flattened {
        match self.children.len() {
            0 if extract => Flattened::Value(Value::Null),
            1 => match self.children.remove(0) {
                Self {
                    kind: ComponentKind::Text(text),
                    ..
                } if extract => Flattened::Value(Value::String(text)),
                Self {
                    kind: ComponentKind::Numeric(number),
                    ..
                } if extract => Flattened::Value(number.to_value()),
                child => Flattened::Node(child),
            },
            _ => Flattened::Node(self),
        }
    }

    /// Collapses a trivially wrapping node without extracting values.
    pub fn flatten_node(self) -> Self {
        match self.flatten(false) {
            Flattened::Node(node) => node,
            Flattened::Value(value) => Self::text(value.to_string()),
        }
    }

    /// Evaluates this node against the rendering context.
    pub fn evaluate(&self, ctx: &mut RenderingContext) -> TemplateResult<Value> {
        match &self.kind {
            ComponentKind::Entry => evaluate_nodes(&self.children, ctx),
            ComponentKind::Text(text) => Ok(Value::String(text.clone())),
            ComponentKind::Numeric(number) => Ok(number.to_value()),
            ComponentKind::Array(entries) => evaluate_array(entries, ctx),
            ComponentKind::ObjectAccessor { path } => {
                Ok(ctx.variables().get(path).unwrap_or_default())
            }
            ComponentKind::Boolean => boolean::evaluate_stack(&self.children, ctx).map(Value::Bool),
            ComponentKind::Escaping => Ok(escape_value(evaluate_nodes(&self.children, ctx)?)),
            ComponentKind::Null | ComponentKind::Section | ComponentKind::Layout => Ok(Value::Null),
            ComponentKind::Reference => rendering::render_reference(self, ctx),
            ComponentKind::Invocation(invocation) => self.render_invocation(invocation, ctx),
        }
    }

    fn render_invocation(
        &self,
        invocation: &Invocation,
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Value> {
        let descriptor = match &invocation.descriptor {
            Some(descriptor) => Arc::clone(descriptor),
            None => ctx
                .resolver()
                .descriptor(&invocation.target, &invocation.identifier)?,
        };
        let DescriptorVariant::Helper(helper) = &descriptor.variant else {
            return Err(TemplateError::Evaluation(format!(
                "'{}' cannot be rendered as a helper",
                invocation.label()
            )));
        };
        let arguments = Arguments::evaluate(&self.arguments, &descriptor.definitions, ctx)?;
        helper.render(&arguments, RenderChildren::new(&self.children), ctx)
    }
}

/// Evaluates a list of sibling nodes.
///
/// No nodes yield null, a single node yields its value unchanged and several
/// nodes yield their display strings concatenated.
pub fn evaluate_nodes(nodes: &[Component], ctx: &mut RenderingContext) -> TemplateResult<Value> {
    match nodes {
        [] => Ok(Value::Null),
        [only] => only.evaluate(ctx),
        _ => {
            let mut output = String::new();
            for node in nodes {
                output.push_str(&node.evaluate(ctx)?.to_display_string()?);
            }
            Ok(Value::String(output))
        }
    }
}

fn evaluate_array(entries: &[ArrayEntry], ctx: &mut RenderingContext) -> TemplateResult<Value> {
    let positional = entries.iter().enumerate().all(|(i, entry)| {
        matches!(entry.key, ArrayKey::Index(index) if usize::try_from(index) == Ok(i))
    });
    if positional {
        let items = entries
            .iter()
            .map(|entry| entry.value.evaluate(ctx))
            .collect::<TemplateResult<Vec<_>>>()?;
        return Ok(Value::Array(items));
    }
    let mut map = indexmap::IndexMap::with_capacity(entries.len());
    for entry in entries {
        let key = match &entry.key {
            ArrayKey::Name(name) => name.clone(),
            ArrayKey::Index(index) => index.to_string(),
        };
        map.insert(key, entry.value.evaluate(ctx)?);
    }
    Ok(Value::Map(map))
}

fn escape_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_html(&s)),
        Value::Object(obj) => match obj.to_display() {
            Some(s) => Value::String(escape_html(&s)),
            None => Value::Object(obj),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_count_in_a_row(node: &Component) -> usize {
        node.children()
            .windows(2)
            .filter(|pair| pair[0].as_text().is_some() && pair[1].as_text().is_some())
            .count()
    }

    #[test]
    fn test_effective_escaping_matrix() {
        let cases = [
            (Escape::Inherit, Escape::Inherit, false, true),
            (Escape::Inherit, Escape::On, false, true),
            (Escape::Inherit, Escape::Off, true, false),
            (Escape::On, Escape::Inherit, true, true),
            (Escape::Off, Escape::Inherit, false, true),
            (Escape::On, Escape::Off, true, false),
            (Escape::Off, Escape::Off, false, false),
            (Escape::On, Escape::On, true, true),
            (Escape::Off, Escape::On, false, true),
        ];
        for (children, output, expected_children, expected_output) in cases {
            let effective = effective_escaping(children, output);
            assert_eq!(effective.children, expected_children, "{children:?}/{output:?}");
            assert_eq!(effective.output, expected_output, "{children:?}/{output:?}");
        }
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let mut node = Component::entry();
        node.add_child(Component::text("a"));
        node.add_child(Component::text("b"));
        node.add_child(Component::accessor("x"));
        node.add_child(Component::text("c"));
        node.add_child(Component::text(""));
        node.add_child(Component::text("d"));
        assert_eq!(node.children().len(), 3);
        assert_eq!(node.children()[0].as_text(), Some("ab"));
        assert_eq!(node.children()[2].as_text(), Some("cd"));
        assert_eq!(text_count_in_a_row(&node), 0);
    }

    #[test]
    fn test_entry_children_are_spliced() {
        let mut inner = Component::entry();
        inner.add_child(Component::text("b"));
        inner.add_child(Component::accessor("x"));

        let mut node = Component::entry();
        node.add_child(Component::text("a"));
        node.add_child(inner);
        assert_eq!(node.children().len(), 2);
        assert_eq!(node.children()[0].as_text(), Some("ab"));
        assert!(matches!(
            node.children()[1].kind,
            ComponentKind::ObjectAccessor { .. }
        ));
    }

    #[test]
    fn test_flatten_single_text_child() {
        let mut node = Component::entry();
        node.add_child(Component::text("hello"));
        match node.flatten(true) {
            Flattened::Value(value) => assert_eq!(value, Value::from("hello")),
            Flattened::Node(_) => panic!("expected a value"),
        }
    }

    #[test]
    fn test_flatten_single_numeric_child() {
        let mut node = Component::entry();
        node.add_child(Component::numeric(Number::Integer(7)));
        assert!(matches!(node.flatten(true), Flattened::Value(Value::Integer(7))));
    }

    #[test]
    fn test_flatten_childless_node() {
        assert!(matches!(Component::entry().flatten(true), Flattened::Value(Value::Null)));
        assert!(matches!(
            Component::entry().flatten(false),
            Flattened::Node(Component {
                kind: ComponentKind::Entry,
                ..
            })
        ));
    }

    #[test]
    fn test_flatten_keeps_multiple_children() {
        let mut node = Component::entry();
        node.add_child(Component::text("a"));
        node.add_child(Component::accessor("b"));
        match node.flatten(true) {
            Flattened::Node(node) => assert_eq!(node.children().len(), 2),
            Flattened::Value(_) => panic!("expected the node"),
        }
    }

    #[test]
    fn test_flatten_single_dynamic_child() {
        let mut node = Component::entry();
        node.add_child(Component::accessor("user.name"));
        let flat = node.flatten_node();
        assert!(matches!(flat.kind, ComponentKind::ObjectAccessor { ref path } if path == "user.name"));
    }

    #[test]
    fn test_boolean_wraps_container_children() {
        let mut captured = Component::entry();
        captured.add_child(Component::accessor("a"));
        captured.add_child(Component::text(" == 1"));
        let node = Component::boolean(captured);
        assert!(matches!(node.kind, ComponentKind::Boolean));
        assert_eq!(node.children().len(), 2);

        let single = Component::boolean(Component::text("1"));
        assert_eq!(single.children().len(), 1);
    }

    #[test]
    fn test_number_parse() {
        assert_eq!(Number::parse("42"), Some(Number::Integer(42)));
        assert_eq!(Number::parse("-3"), Some(Number::Integer(-3)));
        assert_eq!(Number::parse("1.5"), Some(Number::Float(1.5)));
        assert_eq!(Number::parse("1."), None);
        assert_eq!(Number::parse(".5"), None);
        assert_eq!(Number::parse("12a"), None);
        assert_eq!(Number::parse(""), None);
    }

    #[test]
    fn test_tree_survives_serialization() {
        let mut node = Component::entry();
        node.add_child(Component::text("Hello "));
        node.add_child(Component::escaping(Component::accessor("name")));
        let json = serde_json::to_string(&node).unwrap();
        let restored: Component = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.children().len(), 2);
        assert!(matches!(restored.children()[1].kind, ComponentKind::Escaping));
    }
}
