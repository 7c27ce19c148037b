//! Template sequencer (parser).
//!
//! Drives the [`Splitter`] through an explicit state machine and builds the
//! component tree in the same pass. Tag invocations are kept on a stack of
//! open components with the root at the bottom; inline expressions are parsed
//! recursively. The sequencer owns the namespace table and the escaping flag
//! for the duration of a single parse.

use fluid_rs_core::error::{SourceLocation, TemplateError, TemplateResult};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::arguments::ArgumentType;
use crate::component::{ArrayEntry, ArrayKey, Component, ComponentKind, Flattened, Number};
use crate::resolver::{DescriptorVariant, NamespaceTable, Resolution, Resolver};
use crate::splitter::{SplitContext, Splitter, Symbol, SymbolKind, QUOTED_STRING};

static XMLNS_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"xmlns:([A-Za-z][A-Za-z0-9.]*)\s*=\s*"([^"]*)""#).expect("valid regex")
});
static XMLNS_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://typo3\.org/ns/(.+?)/?$").expect("valid regex"));
static NAMESPACE_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{namespace\s+([^}]*)\}").expect("valid regex"));
static NAMESPACE_ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z*][A-Za-z0-9.*]*$").expect("valid regex"));

const BOOLEAN_LITERALS: [&str; 6] = ["true", "false", "on", "off", "yes", "no"];

/// The lexical state the sequencer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Template text between tags.
    Text,
    /// Reading the name of an opening tag.
    TagName,
    /// Between the attributes of an opening tag.
    AttributeList,
    /// Inside a quoted attribute value.
    AttributeValue,
    /// Inside an inline `{ ... }` expression.
    InlineExpression,
    /// Inside an array literal.
    ArrayLiteral,
    /// Inside a quoted string of an inline expression.
    StringLiteral,
    /// Rewrapping boolean-typed arguments.
    BooleanExpressionCapture,
    /// Reading a namespace declaration.
    NamespaceDeclaration,
}

/// The result of sequencing a template.
#[derive(Debug)]
pub struct SequenceOutput {
    /// The root of the component tree.
    pub root: Component,
    /// Whether escaping is enabled for this template.
    pub escaping_enabled: bool,
    /// The namespaces in effect for this template.
    pub namespaces: NamespaceTable,
}

/// Parses `source` into a component tree.
///
/// `escaping` is the escaping mode used unless the template toggles it.
///
/// # Errors
///
/// Returns a parse error for malformed syntax, unknown namespaces,
/// mismatched or unclosed tags and a repeated escaping modifier, and a
/// validation error for missing or undeclared arguments.
pub fn sequence(source: &str, resolver: &Resolver, escaping: bool) -> TemplateResult<SequenceOutput> {
    Sequencer::new(source, resolver, escaping)?.run()
}

struct OpenTag {
    node: Component,
    tag: String,
    offset: usize,
}

/// An opening tag whose attributes are still being read.
struct PendingTag<'s> {
    symbol: Symbol<'s>,
    node: Option<Component>,
}

/// The parsing state machine for one template.
pub struct Sequencer<'s, 'r> {
    splitter: Splitter<'s>,
    resolver: &'r Resolver,
    namespaces: NamespaceTable,
    escaping_enabled: bool,
    escaping_modifier: Option<usize>,
    state: State,
    pending: Option<PendingTag<'s>>,
    stack: Vec<OpenTag>,
}

impl<'s, 'r> Sequencer<'s, 'r> {
    /// Creates a sequencer and registers the namespaces the source declares.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for a malformed namespace declaration.
    pub fn new(source: &'s str, resolver: &'r Resolver, escaping: bool) -> TemplateResult<Self> {
        let mut sequencer = Self {
            splitter: Splitter::new(source),
            resolver,
            namespaces: resolver.namespaces().clone(),
            escaping_enabled: escaping,
            escaping_modifier: None,
            state: State::Text,
            pending: None,
            stack: vec![OpenTag {
                node: Component::entry(),
                tag: String::new(),
                offset: 0,
            }],
        };
        sequencer.detect_namespaces()?;
        Ok(sequencer)
    }

    /// Returns the current state.
    pub const fn state(&self) -> State {
        self.state
    }

    /// Runs the state machine to the end of the source.
    pub fn run(mut self) -> TemplateResult<SequenceOutput> {
        while self.step()? {}

        if self.stack.len() > 1 {
            if let Some(open) = self.stack.last() {
                return Err(TemplateError::Unclosed {
                    construct: format!("tag <{}>", open.tag),
                    location: self.location(open.offset),
                });
            }
        }

        let root = self
            .stack
            .pop()
            .map_or_else(Component::entry, |open| open.node);
        tracing::debug!(
            nodes = root.children().len(),
            escaping = self.escaping_enabled,
            "Sequenced template"
        );
        Ok(SequenceOutput {
            root,
            escaping_enabled: self.escaping_enabled,
            namespaces: self.namespaces,
        })
    }

    // ── Namespaces and directives ───────────────────────────────────

    fn detect_namespaces(&mut self) -> TemplateResult<()> {
        let source = self.splitter.source();
        for caps in XMLNS_ATTRIBUTE.captures_iter(source) {
            let alias = &caps[1];
            match XMLNS_TARGET.captures(&caps[2]) {
                Some(target) => self.namespaces.add(alias, target[1].replace('/', "\\")),
                None => self.namespaces.ignore(alias),
            }
        }
        for caps in NAMESPACE_DECLARATION.captures_iter(source) {
            let offset = caps.get(0).map_or(0, |m| m.start());
            self.declare_namespace(caps[1].trim(), offset)?;
        }
        Ok(())
    }

    fn declare_namespace(&mut self, declaration: &str, offset: usize) -> TemplateResult<()> {
        self.state = State::NamespaceDeclaration;
        let (alias, target) = match declaration.split_once('=') {
            Some((alias, target)) => (alias.trim(), Some(target.trim())),
            None => (declaration, None),
        };
        if !NAMESPACE_ALIAS.is_match(alias) || target.is_some_and(str::is_empty) {
            return Err(TemplateError::syntax(
                format!("Invalid namespace declaration '{declaration}'"),
                self.location(offset),
            ));
        }
        match target {
            Some(target) => self.namespaces.add(alias, target),
            None => self.namespaces.ignore(alias),
        }
        self.state = State::Text;
        Ok(())
    }

    fn escaping_directive(&mut self, symbol: Symbol<'s>) -> TemplateResult<()> {
        if self.escaping_modifier.is_some() {
            return Err(TemplateError::DuplicateEscapingModifier {
                location: self.location(symbol.start),
            });
        }
        self.escaping_modifier = Some(symbol.start);
        self.escaping_enabled = matches!(symbol.lexeme.to_ascii_lowercase().as_str(), "on" | "true");
        tracing::debug!(enabled = self.escaping_enabled, "Escaping modifier");
        Ok(())
    }

    /// Performs one transition from the current state.
    ///
    /// Returns `false` once the source is exhausted. Expression states are
    /// entered and left within a single step, so only the tag-level states
    /// are dispatched here.
    fn step(&mut self) -> TemplateResult<bool> {
        match self.state {
            State::Text => self.text(),
            State::TagName => self.tag_name(),
            State::AttributeList => self.attribute_list(),
            State::NamespaceDeclaration => {
                // Declarations were registered before the run started.
                self.state = State::Text;
                Ok(true)
            }
            nested => Err(TemplateError::syntax(
                format!("Parser left in {nested:?} state"),
                self.location(self.splitter.cursor()),
            )),
        }
    }

    fn text(&mut self) -> TemplateResult<bool> {
        let Some(symbol) = self.splitter.next(SplitContext::Text)? else {
            return Ok(false);
        };
        match symbol.kind {
            SymbolKind::Text => self.append(Component::text(symbol.lexeme)),
            SymbolKind::TagOpen => {
                self.pending = Some(PendingTag { symbol, node: None });
                self.state = State::TagName;
            }
            SymbolKind::TagClose => self.close_tag(symbol)?,
            SymbolKind::InlineBraceOpen => {
                let node = self.inline_or_brace(symbol.start)?;
                self.append(node);
            }
            SymbolKind::EscapeDirective => self.escaping_directive(symbol)?,
            SymbolKind::NamespaceDirective => self.state = State::NamespaceDeclaration,
            _ => return Err(self.unexpected(symbol)),
        }
        Ok(true)
    }

    // ── Tags ────────────────────────────────────────────────────────

    fn tag_name(&mut self) -> TemplateResult<bool> {
        self.state = State::Text;
        let Some(PendingTag { symbol, .. }) = self.pending.take() else {
            return Ok(true);
        };
        let (namespace, identifier) = split_name(symbol.lexeme);
        let location = self.location(symbol.start);
        match self
            .resolver
            .resolve(&self.namespaces, namespace, identifier, location)?
        {
            Resolution::Ignored => {
                self.append(Component::text(self.verbatim(symbol.start, symbol.end)));
            }
            Resolution::Component(descriptor) => {
                let node = Component::invocation(namespace, identifier, descriptor);
                self.pending = Some(PendingTag {
                    symbol,
                    node: Some(node),
                });
                self.state = State::AttributeList;
            }
        }
        Ok(true)
    }

    fn attribute_list(&mut self) -> TemplateResult<bool> {
        let Some(PendingTag {
            symbol,
            node: Some(mut node),
        }) = self.pending.take()
        else {
            self.state = State::Text;
            return Ok(true);
        };
        let Some(next) = self.splitter.next(SplitContext::Tag)? else {
            return Err(TemplateError::Unclosed {
                construct: format!("tag <{}>", symbol.lexeme),
                location: self.location(symbol.start),
            });
        };
        match next.kind {
            SymbolKind::TagEnd => {
                self.stack.push(OpenTag {
                    node,
                    tag: symbol.lexeme.to_string(),
                    offset: symbol.start,
                });
                self.state = State::Text;
            }
            SymbolKind::TagSelfClose => {
                let node = self.finalize(node)?;
                self.append(node);
                self.state = State::Text;
            }
            SymbolKind::AttributeName => {
                let value = self.attribute_value(next, symbol.lexeme)?;
                if !node.arguments.insert(next.lexeme, value) {
                    return Err(TemplateError::syntax(
                        format!("Duplicate argument '{}' on <{}>", next.lexeme, symbol.lexeme),
                        self.location(next.start),
                    ));
                }
                self.pending = Some(PendingTag {
                    symbol,
                    node: Some(node),
                });
            }
            _ => return Err(self.unexpected(next)),
        }
        Ok(true)
    }

    fn attribute_value(&mut self, name: Symbol<'s>, tag: &str) -> TemplateResult<Component> {
        let equals = self.splitter.next(SplitContext::Tag)?;
        let quote = self.splitter.next(SplitContext::Tag)?;
        let (Some(equals), Some(quote)) = (equals, quote) else {
            return Err(TemplateError::Unclosed {
                construct: format!("tag <{tag}>"),
                location: self.location(name.start),
            });
        };
        if equals.kind != SymbolKind::Equals || quote.kind != SymbolKind::QuoteStart {
            return Err(TemplateError::syntax(
                format!("Argument '{}' on <{tag}> needs a quoted value", name.lexeme),
                self.location(name.start),
            ));
        }
        let previous = self.state;
        self.state = State::AttributeValue;
        let container = self.quoted(quote)?;
        self.state = previous;
        Ok(argument_node(container))
    }

    fn close_tag(&mut self, symbol: Symbol<'s>) -> TemplateResult<()> {
        let (namespace, _) = split_name(symbol.lexeme);
        let open_tag = self
            .stack
            .last()
            .filter(|_| self.stack.len() > 1)
            .map(|open| open.tag.clone());

        if open_tag.as_deref() != Some(symbol.lexeme) {
            if self.namespaces.passes_through(namespace) {
                self.append(Component::text(self.verbatim(symbol.start, symbol.end)));
                return Ok(());
            }
            return Err(TemplateError::MismatchedClosingTag {
                expected: open_tag.map_or_else(|| "no open tag".to_string(), |tag| format!("</{tag}>")),
                found: symbol.lexeme.to_string(),
                location: self.location(symbol.start),
            });
        }

        if let Some(open) = self.stack.pop() {
            let node = self.finalize(open.node)?;
            self.append(node);
        }
        Ok(())
    }

    /// Validates the arguments of a closed invocation and turns the core
    /// section, layout and render components into their own node kinds.
    fn finalize(&mut self, mut node: Component) -> TemplateResult<Component> {
        let Some((descriptor, label)) = node
            .as_invocation()
            .and_then(|inv| inv.descriptor.clone().map(|d| (d, inv.label())))
        else {
            return Ok(node);
        };

        let previous = self.state;
        if descriptor
            .definitions
            .iter()
            .any(|def| def.argument_type == ArgumentType::Boolean)
        {
            self.state = State::BooleanExpressionCapture;
        }
        node.arguments
            .finalize(&descriptor.definitions, descriptor.accepts_additional, &label)?;
        self.state = previous;

        match descriptor.variant {
            DescriptorVariant::Section => {
                let name = node
                    .arguments
                    .get("name")
                    .and_then(Component::as_text)
                    .map(str::to_string)
                    .ok_or_else(|| TemplateError::InvalidArgument {
                        component: label,
                        argument: "name".to_string(),
                        message: "section names must be literal text".to_string(),
                    })?;
                node.kind = ComponentKind::Section;
                node.name = Some(name);
            }
            DescriptorVariant::Layout => node.kind = ComponentKind::Layout,
            DescriptorVariant::Reference => node.kind = ComponentKind::Reference,
            DescriptorVariant::Helper(_) => {}
        }
        Ok(node)
    }

    // ── Quoted strings ──────────────────────────────────────────────

    /// Reads a quoted string into a container of text and inline nodes.
    fn quoted(&mut self, open: Symbol<'s>) -> TemplateResult<Component> {
        let quote = open.lexeme.chars().next().unwrap_or('"');
        let mut container = Component::entry();
        loop {
            let Some(symbol) = self.splitter.next(SplitContext::Quoted(quote))? else {
                return Err(TemplateError::Unclosed {
                    construct: QUOTED_STRING.to_string(),
                    location: self.location(open.start),
                });
            };
            match symbol.kind {
                SymbolKind::Text | SymbolKind::EscapedQuote => {
                    container.add_child(Component::text(symbol.lexeme));
                }
                SymbolKind::InlineBraceOpen => {
                    let node = self.inline_or_brace(symbol.start)?;
                    container.add_child(node);
                }
                SymbolKind::QuoteEnd => return Ok(container),
                _ => return Err(self.unexpected(symbol)),
            }
        }
    }

    // ── Inline expressions ──────────────────────────────────────────

    /// Parses the inline expression opened at `start`.
    ///
    /// If the braces do not hold a valid expression, only the `{` is
    /// consumed and returned as text; the rest is read again as text. A quote
    /// that never closes, as in `{ it's }`, counts as such text.
    fn inline_or_brace(&mut self, start: usize) -> TemplateResult<Component> {
        let end = match self.splitter.balanced_extent(start) {
            Ok(end) => end,
            Err(TemplateError::Unclosed { construct, .. }) if construct == QUOTED_STRING => {
                self.splitter.rewind(start + 1);
                return Ok(Component::text("{"));
            }
            Err(err) => return Err(err),
        };
        let previous = self.state;
        self.state = State::InlineExpression;
        self.splitter.rewind(start + 1);
        let parsed = self.inline_body()?;
        self.state = previous;

        match parsed {
            Some(node) if self.splitter.cursor() == end => Ok(node),
            _ => {
                self.splitter.rewind(start + 1);
                Ok(Component::text("{"))
            }
        }
    }

    /// Parses an expression up to and including its closing brace.
    fn inline_body(&mut self) -> TemplateResult<Option<Component>> {
        let head = if self.looks_like_array()? {
            self.array_literal()?
        } else {
            self.argument_value()?
        };
        let Some(node) = head else {
            return Ok(None);
        };
        Ok(self.expect(SymbolKind::InlineBraceClose)?.then_some(node))
    }

    /// An operand followed by any number of `-> ns:identifier(...)` links.
    fn argument_value(&mut self) -> TemplateResult<Option<Component>> {
        match self.operand()? {
            Some(node) => self.chain(node),
            None => Ok(None),
        }
    }

    fn operand(&mut self) -> TemplateResult<Option<Component>> {
        let Some(symbol) = self.splitter.next(SplitContext::Inline)? else {
            return Ok(None);
        };
        match symbol.kind {
            SymbolKind::Identifier => {
                if self.invocation_follows(symbol)? {
                    self.splitter.rewind(symbol.start);
                    return self.inline_invocation();
                }
                Ok(Some(accessor_or_literal(symbol.lexeme)))
            }
            SymbolKind::Number => Ok(Number::parse(symbol.lexeme).map(Component::numeric)),
            SymbolKind::QuoteStart => {
                let previous = self.state;
                self.state = State::StringLiteral;
                let container = self.quoted(symbol)?;
                self.state = previous;
                Ok(Some(string_node(container)))
            }
            SymbolKind::InlineBraceOpen => self.inline_body(),
            _ => Ok(None),
        }
    }

    fn chain(&mut self, mut node: Component) -> TemplateResult<Option<Component>> {
        loop {
            let saved = self.splitter.cursor();
            match self.splitter.next(SplitContext::Inline)? {
                Some(arrow) if arrow.kind == SymbolKind::Arrow => {
                    let Some(head) = self.splitter.next(SplitContext::Inline)? else {
                        return Ok(None);
                    };
                    if head.kind != SymbolKind::Identifier || !self.invocation_follows(head)? {
                        return Ok(None);
                    }
                    self.splitter.rewind(head.start);
                    let Some(mut invocation) = self.inline_invocation()? else {
                        return Ok(None);
                    };
                    invocation.add_child(node);
                    node = invocation;
                }
                _ => {
                    self.splitter.rewind(saved);
                    return Ok(Some(node));
                }
            }
        }
    }

    /// Returns `true` if `ns:identifier(` starts at `symbol`, with the colon
    /// and the identifier directly adjacent.
    fn invocation_follows(&mut self, symbol: Symbol<'s>) -> TemplateResult<bool> {
        let saved = self.splitter.cursor();
        self.splitter.rewind(symbol.end);
        let colon = self.splitter.next(SplitContext::Inline)?;
        let identifier = self.splitter.next(SplitContext::Inline)?;
        let paren = self.splitter.next(SplitContext::Inline)?;
        self.splitter.rewind(saved);
        Ok(matches!(
            (colon, identifier, paren),
            (Some(c), Some(i), Some(p))
                if c.kind == SymbolKind::Colon
                    && c.start == symbol.end
                    && i.kind == SymbolKind::Identifier
                    && i.start == c.end
                    && p.kind == SymbolKind::ParenOpen
        ))
    }

    /// Parses `ns:identifier(name: value, ...)` into a finalized invocation.
    ///
    /// Returns `Ok(None)` if the namespace is ignored or the argument list is
    /// malformed.
    fn inline_invocation(&mut self) -> TemplateResult<Option<Component>> {
        let namespace = self.splitter.next(SplitContext::Inline)?;
        let _colon = self.splitter.next(SplitContext::Inline)?;
        let identifier = self.splitter.next(SplitContext::Inline)?;
        let _paren = self.splitter.next(SplitContext::Inline)?;
        let (Some(namespace), Some(identifier)) = (namespace, identifier) else {
            return Ok(None);
        };

        let location = self.location(namespace.start);
        let descriptor = match self.resolver.resolve(
            &self.namespaces,
            namespace.lexeme,
            identifier.lexeme,
            location,
        )? {
            Resolution::Ignored => return Ok(None),
            Resolution::Component(descriptor) => descriptor,
        };
        let mut node = Component::invocation(namespace.lexeme, identifier.lexeme, descriptor);

        loop {
            let Some(symbol) = self.splitter.next(SplitContext::Inline)? else {
                return Ok(None);
            };
            match symbol.kind {
                SymbolKind::ParenClose => break,
                SymbolKind::Identifier => {
                    if !self.expect(SymbolKind::Colon)? {
                        return Ok(None);
                    }
                    let Some(value) = self.argument_value()? else {
                        return Ok(None);
                    };
                    if !node.arguments.insert(symbol.lexeme, value) {
                        return Err(TemplateError::syntax(
                            format!(
                                "Duplicate argument '{}' for {}:{}",
                                symbol.lexeme, namespace.lexeme, identifier.lexeme
                            ),
                            self.location(symbol.start),
                        ));
                    }
                    match self.splitter.next(SplitContext::Inline)?.map(|s| s.kind) {
                        Some(SymbolKind::Comma) => {}
                        Some(SymbolKind::ParenClose) => break,
                        _ => return Ok(None),
                    }
                }
                _ => return Ok(None),
            }
        }

        self.finalize(node).map(Some)
    }

    /// Returns `true` if the next symbols are `key:` for a non-invocation key.
    fn looks_like_array(&mut self) -> TemplateResult<bool> {
        let saved = self.splitter.cursor();
        let is_array = match self.splitter.next(SplitContext::Inline)? {
            Some(key) if key.kind == SymbolKind::Identifier => {
                !self.invocation_follows(key)? && self.expect(SymbolKind::Colon)?
            }
            Some(key) if key.kind == SymbolKind::Number => self.expect(SymbolKind::Colon)?,
            Some(key) if key.kind == SymbolKind::QuoteStart => {
                let end = self.splitter.quoted_extent(key.start)?;
                self.splitter.rewind(end);
                self.expect(SymbolKind::Colon)?
            }
            _ => false,
        };
        self.splitter.rewind(saved);
        Ok(is_array)
    }

    /// Parses `key: value, ...` up to, but not including, the closing brace.
    fn array_literal(&mut self) -> TemplateResult<Option<Component>> {
        let previous = self.state;
        self.state = State::ArrayLiteral;
        let mut entries = Vec::new();
        loop {
            let saved = self.splitter.cursor();
            let Some(symbol) = self.splitter.next(SplitContext::Inline)? else {
                return Ok(None);
            };
            let key = match symbol.kind {
                SymbolKind::Identifier => ArrayKey::Name(symbol.lexeme.to_string()),
                SymbolKind::Number => symbol
                    .lexeme
                    .parse::<i64>()
                    .map_or_else(|_| ArrayKey::Name(symbol.lexeme.to_string()), ArrayKey::Index),
                SymbolKind::QuoteStart => match self.quoted(symbol)?.flatten(true) {
                    Flattened::Value(value) => ArrayKey::Name(value.to_string()),
                    Flattened::Node(_) => return Ok(None),
                },
                SymbolKind::InlineBraceClose if !entries.is_empty() => {
                    self.splitter.rewind(saved);
                    break;
                }
                _ => return Ok(None),
            };
            if !self.expect(SymbolKind::Colon)? {
                return Ok(None);
            }
            let Some(value) = self.argument_value()? else {
                return Ok(None);
            };
            entries.push(ArrayEntry { key, value });

            let saved = self.splitter.cursor();
            if self.splitter.next(SplitContext::Inline)?.map(|s| s.kind) != Some(SymbolKind::Comma) {
                self.splitter.rewind(saved);
                break;
            }
        }
        self.state = previous;
        Ok(Some(Component::array(entries)))
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn expect(&mut self, kind: SymbolKind) -> TemplateResult<bool> {
        Ok(self
            .splitter
            .next(SplitContext::Inline)?
            .is_some_and(|symbol| symbol.kind == kind))
    }

    fn append(&mut self, node: Component) {
        if let Some(open) = self.stack.last_mut() {
            open.node.add_child(node);
        }
    }

    fn verbatim(&self, start: usize, end: usize) -> &'s str {
        &self.splitter.source()[start..end]
    }

    fn location(&self, offset: usize) -> SourceLocation {
        self.splitter.location(offset)
    }

    fn unexpected(&self, symbol: Symbol<'s>) -> TemplateError {
        TemplateError::syntax(
            format!("Unexpected '{}' while reading {:?}", symbol.lexeme, self.state),
            self.location(symbol.start),
        )
    }
}

fn split_name(name: &str) -> (&str, &str) {
    name.split_once(':').unwrap_or((name, ""))
}

fn accessor_or_literal(lexeme: &str) -> Component {
    if BOOLEAN_LITERALS
        .iter()
        .any(|literal| literal.eq_ignore_ascii_case(lexeme))
    {
        Component::boolean(Component::text(lexeme))
    } else {
        Component::accessor(lexeme)
    }
}

/// Turns a parsed attribute value into the argument sub-tree.
fn argument_node(container: Component) -> Component {
    if container.children().is_empty() {
        return Component::text("");
    }
    let node = container.flatten_node();
    match node.as_text().and_then(Number::parse) {
        Some(number) => Component::numeric(number),
        None => node,
    }
}

fn string_node(container: Component) -> Component {
    if container.children().is_empty() {
        return Component::text("");
    }
    container.flatten_node()
}
