//! Template splitter (tokenizer).
//!
//! Converts raw template source text into [`Symbol`]s. The splitter keeps no
//! state besides its cursor: the caller chooses the lexical context for each
//! symbol ([`SplitContext`]) and may save and rewind the cursor to look
//! ahead. CDATA sections and `{# ... #}` comments are skipped entirely in
//! text context.

use fluid_rs_core::error::{SourceLocation, TemplateError, TemplateResult};
use once_cell::sync::Lazy;
use regex::Regex;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";
const COMMENT_OPEN: &str = "{#";
const COMMENT_CLOSE: &str = "#}";

/// The construct named by [`TemplateError::Unclosed`] for a string whose
/// closing quote is missing.
pub const QUOTED_STRING: &str = "quoted string";

static TAG_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<([A-Za-z][A-Za-z0-9]*:[A-Za-z][A-Za-z0-9.]*)(?:[\s/>]|$)").expect("valid regex")
});
static TAG_CLOSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^</([A-Za-z][A-Za-z0-9]*:[A-Za-z][A-Za-z0-9.]*)\s*>").expect("valid regex")
});
static NAMESPACE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{namespace\s+([^}]*)\}").expect("valid regex"));
static ESCAPE_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\{escaping(?:enabled)?\s*=?\s*(on|off|true|false)\s*\}").expect("valid regex")
});
static ATTRIBUTE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_:][A-Za-z0-9_:.\-]*").expect("valid regex"));
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*").expect("valid regex"));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?").expect("valid regex"));

/// The lexical context the next symbol is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitContext {
    /// Template text between tags.
    Text,
    /// Inside an opening tag, between attributes.
    Tag,
    /// Inside a string delimited by the given quote character.
    Quoted(char),
    /// Inside an inline `{ ... }` expression.
    Inline,
}

/// The kind of a [`Symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Literal text.
    Text,
    /// `<ns:identifier`; the lexeme is `ns:identifier`.
    TagOpen,
    /// `</ns:identifier>`; the lexeme is `ns:identifier`.
    TagClose,
    /// The `>` ending an opening tag.
    TagEnd,
    /// The `/>` ending a self-closing tag.
    TagSelfClose,
    /// An attribute name.
    AttributeName,
    /// `=`
    Equals,
    /// An opening quote; the lexeme is the quote character.
    QuoteStart,
    /// The closing quote.
    QuoteEnd,
    /// A backslash-escaped quote; the lexeme is the quote character.
    EscapedQuote,
    /// `{`
    InlineBraceOpen,
    /// `}`
    InlineBraceClose,
    /// A name or dotted path.
    Identifier,
    /// A digit/decimal sequence.
    Number,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `->`
    Arrow,
    /// `(`
    ParenOpen,
    /// `)`
    ParenClose,
    /// `{escaping off}`; the lexeme is the requested mode.
    EscapeDirective,
    /// `{namespace ...}`; the lexeme is the declaration.
    NamespaceDirective,
}

/// A symbol read from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol<'s> {
    /// The kind of the symbol.
    pub kind: SymbolKind,
    /// The meaningful part of the symbol's text.
    pub lexeme: &'s str,
    /// The byte offset where the symbol starts.
    pub start: usize,
    /// The byte offset just past the symbol.
    pub end: usize,
}

/// Splits template source into symbols.
#[derive(Debug, Clone)]
pub struct Splitter<'s> {
    source: &'s str,
    cursor: usize,
}

impl<'s> Splitter<'s> {
    /// Creates a splitter positioned at the start of `source`.
    pub const fn new(source: &'s str) -> Self {
        Self { source, cursor: 0 }
    }

    /// Returns the source being split.
    pub const fn source(&self) -> &'s str {
        self.source
    }

    /// Returns the current byte offset.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor to `offset`.
    pub fn rewind(&mut self, offset: usize) {
        self.cursor = offset.min(self.source.len());
    }

    /// Returns the line and column of a byte offset.
    pub fn location(&self, offset: usize) -> SourceLocation {
        SourceLocation::from_offset(self.source, offset)
    }

    /// Reads the next symbol in the given context.
    ///
    /// Returns `Ok(None)` at the end of the source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unclosed`] for an unterminated CDATA section or
    /// comment and [`TemplateError::Syntax`] for a character that cannot
    /// appear inside a tag.
    pub fn next(&mut self, context: SplitContext) -> TemplateResult<Option<Symbol<'s>>> {
        match context {
            SplitContext::Text => self.next_text(),
            SplitContext::Tag => self.next_tag(),
            SplitContext::Quoted(quote) => Ok(self.next_quoted(quote)),
            SplitContext::Inline => Ok(self.next_inline()),
        }
    }

    /// Reads the next symbol without consuming it.
    pub fn peek(&mut self, context: SplitContext) -> TemplateResult<Option<Symbol<'s>>> {
        let saved = self.cursor;
        let symbol = self.next(context);
        self.cursor = saved;
        symbol
    }

    /// Returns the offset just past the `}` matching the `{` at `start`.
    ///
    /// Quoted strings inside the braces are skipped, and a backslash escapes
    /// the following character.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unclosed`] if a quote or the brace is never
    /// closed.
    pub fn balanced_extent(&self, start: usize) -> TemplateResult<usize> {
        let mut depth = 0usize;
        let mut quote: Option<(char, usize)> = None;
        let mut chars = self.source[start..].char_indices();
        while let Some((i, ch)) = chars.next() {
            let at = start + i;
            if let Some((q, _)) = quote {
                if ch == '\\' {
                    chars.next();
                } else if ch == q {
                    quote = None;
                }
                continue;
            }
            match ch {
                '\\' => {
                    chars.next();
                }
                '\'' | '"' => quote = Some((ch, at)),
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(at + 1);
                    }
                }
                _ => {}
            }
        }
        Err(match quote {
            Some((_, at)) => self.unclosed(QUOTED_STRING, at),
            None => self.unclosed("inline expression", start),
        })
    }

    /// Returns the offset just past the quote closing the string at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unclosed`] if the string is never closed.
    pub fn quoted_extent(&self, start: usize) -> TemplateResult<usize> {
        let mut chars = self.source[start..].char_indices();
        let quote = chars.next().map(|(_, ch)| ch);
        while let Some((i, ch)) = chars.next() {
            if ch == '\\' {
                chars.next();
            } else if Some(ch) == quote {
                return Ok(start + i + 1);
            }
        }
        Err(self.unclosed(QUOTED_STRING, start))
    }

    fn unclosed(&self, construct: &str, offset: usize) -> TemplateError {
        TemplateError::Unclosed {
            construct: construct.to_string(),
            location: self.location(offset),
        }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.cursor..]
    }

    fn emit(&mut self, kind: SymbolKind, lexeme: &'s str, len: usize) -> Symbol<'s> {
        let start = self.cursor;
        self.cursor += len;
        Symbol {
            kind,
            lexeme,
            start,
            end: self.cursor,
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.cursor += rest.len() - rest.trim_start().len();
    }

    // ── Text context ────────────────────────────────────────────────

    fn next_text(&mut self) -> TemplateResult<Option<Symbol<'s>>> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok(None);
            }
            if rest.starts_with(CDATA_OPEN) {
                self.skip_past(CDATA_OPEN, CDATA_CLOSE, "CDATA section")?;
                continue;
            }
            if rest.starts_with(COMMENT_OPEN) {
                self.skip_past(COMMENT_OPEN, COMMENT_CLOSE, "comment")?;
                continue;
            }
            if let Some(symbol) = self.markup_at_cursor() {
                return Ok(Some(symbol));
            }

            let end = rest
                .char_indices()
                .skip(1)
                .find(|&(i, ch)| ch == '{' || (ch == '<' && starts_markup(&rest[i..])))
                .map_or(rest.len(), |(i, _)| i);
            return Ok(Some(self.emit(SymbolKind::Text, &rest[..end], end)));
        }
    }

    fn skip_past(&mut self, open: &str, close: &str, construct: &str) -> TemplateResult<()> {
        let start = self.cursor;
        match self.rest()[open.len()..].find(close) {
            Some(pos) => {
                self.cursor += open.len() + pos + close.len();
                Ok(())
            }
            None => Err(self.unclosed(construct, start)),
        }
    }

    fn markup_at_cursor(&mut self) -> Option<Symbol<'s>> {
        let rest = self.rest();
        if rest.starts_with('{') {
            if let Some(caps) = NAMESPACE_DIRECTIVE.captures(rest) {
                let len = caps[0].len();
                let lexeme = caps.get(1).map_or("", |m| m.as_str().trim());
                return Some(self.emit(SymbolKind::NamespaceDirective, lexeme, len));
            }
            if let Some(caps) = ESCAPE_DIRECTIVE.captures(rest) {
                let len = caps[0].len();
                let lexeme = caps.get(1).map_or("", |m| m.as_str());
                return Some(self.emit(SymbolKind::EscapeDirective, lexeme, len));
            }
            return Some(self.emit(SymbolKind::InlineBraceOpen, &rest[..1], 1));
        }
        if let Some(caps) = TAG_CLOSE.captures(rest) {
            let len = caps[0].len();
            let lexeme = caps.get(1).map_or("", |m| m.as_str());
            return Some(self.emit(SymbolKind::TagClose, lexeme, len));
        }
        if let Some(caps) = TAG_OPEN.captures(rest) {
            let lexeme = caps.get(1).map_or("", |m| m.as_str());
            return Some(self.emit(SymbolKind::TagOpen, lexeme, lexeme.len() + 1));
        }
        None
    }

    // ── Tag context ─────────────────────────────────────────────────

    fn next_tag(&mut self) -> TemplateResult<Option<Symbol<'s>>> {
        self.skip_whitespace();
        let rest = self.rest();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };
        if rest.starts_with("/>") {
            return Ok(Some(self.emit(SymbolKind::TagSelfClose, &rest[..2], 2)));
        }
        let symbol = match first {
            '>' => self.emit(SymbolKind::TagEnd, &rest[..1], 1),
            '=' => self.emit(SymbolKind::Equals, &rest[..1], 1),
            '"' | '\'' => self.emit(SymbolKind::QuoteStart, &rest[..1], 1),
            _ => match ATTRIBUTE_NAME.find(rest) {
                Some(m) => self.emit(SymbolKind::AttributeName, m.as_str(), m.end()),
                None => {
                    return Err(TemplateError::syntax(
                        format!("Unexpected character '{first}' inside a tag"),
                        self.location(self.cursor),
                    ))
                }
            },
        };
        Ok(Some(symbol))
    }

    // ── Quoted context ──────────────────────────────────────────────

    fn next_quoted(&mut self, quote: char) -> Option<Symbol<'s>> {
        let rest = self.rest();
        let first = rest.chars().next()?;
        let quote_len = quote.len_utf8();
        if first == quote {
            return Some(self.emit(SymbolKind::QuoteEnd, &rest[..quote_len], quote_len));
        }
        if first == '\\' && rest[1..].starts_with(quote) {
            return Some(self.emit(SymbolKind::EscapedQuote, &rest[1..=quote_len], 1 + quote_len));
        }
        if first == '{' {
            return Some(self.emit(SymbolKind::InlineBraceOpen, &rest[..1], 1));
        }

        let end = rest
            .char_indices()
            .skip(1)
            .find(|&(i, ch)| {
                ch == quote || ch == '{' || (ch == '\\' && rest[i + 1..].starts_with(quote))
            })
            .map_or(rest.len(), |(i, _)| i);
        Some(self.emit(SymbolKind::Text, &rest[..end], end))
    }

    // ── Inline context ──────────────────────────────────────────────

    fn next_inline(&mut self) -> Option<Symbol<'s>> {
        self.skip_whitespace();
        let rest = self.rest();
        let first = rest.chars().next()?;
        if rest.starts_with("->") {
            return Some(self.emit(SymbolKind::Arrow, &rest[..2], 2));
        }
        let single = match first {
            '{' => Some(SymbolKind::InlineBraceOpen),
            '}' => Some(SymbolKind::InlineBraceClose),
            ':' => Some(SymbolKind::Colon),
            ',' => Some(SymbolKind::Comma),
            '(' => Some(SymbolKind::ParenOpen),
            ')' => Some(SymbolKind::ParenClose),
            '"' | '\'' => Some(SymbolKind::QuoteStart),
            _ => None,
        };
        if let Some(kind) = single {
            return Some(self.emit(kind, &rest[..1], 1));
        }
        if let Some(m) = NUMBER.find(rest) {
            return Some(self.emit(SymbolKind::Number, m.as_str(), m.end()));
        }
        if let Some(m) = IDENTIFIER.find(rest) {
            return Some(self.emit(SymbolKind::Identifier, m.as_str(), m.end()));
        }
        let len = first.len_utf8();
        Some(self.emit(SymbolKind::Text, &rest[..len], len))
    }
}

fn starts_markup(rest: &str) -> bool {
    rest.starts_with(CDATA_OPEN) || TAG_CLOSE.is_match(rest) || TAG_OPEN.is_match(rest)
}
