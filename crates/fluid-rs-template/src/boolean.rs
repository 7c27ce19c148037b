//! Boolean expression evaluation.
//!
//! A boolean argument is captured as a stack of nodes. Literal text and
//! numbers are joined into an expression string; every other node is
//! evaluated and referenced by a placeholder, so objects keep their identity
//! for `==` comparisons. Inside a quoted string the node's display string is
//! inlined instead.
//!
//! Precedence, from loosest to tightest: `||`/`or`, `&&`/`and`, comparison
//! operators, `%`, unary `!`.

use std::collections::HashMap;

use fluid_rs_core::error::{TemplateError, TemplateResult};

use crate::component::{Component, ComponentKind, Number};
use crate::rendering::RenderingContext;
use crate::value::Value;

const PLACEHOLDER_PREFIX: &str = "__b";

/// Evaluates a captured expression stack to a boolean.
///
/// # Errors
///
/// Returns an evaluation error for malformed expressions and propagates
/// errors raised while evaluating the stack items.
pub fn evaluate_stack(items: &[Component], ctx: &mut RenderingContext) -> TemplateResult<bool> {
    let mut expression = String::new();
    let mut operands = HashMap::new();
    let mut quote = None;

    for item in items {
        match &item.kind {
            ComponentKind::Text(text) => {
                track_quotes(text, &mut quote);
                expression.push_str(text);
            }
            ComponentKind::Numeric(number) => expression.push_str(&number.to_value().to_string()),
            _ => {
                let value = item.evaluate(ctx)?;
                match quote {
                    Some(q) => expression.push_str(&escape_quoted(&value.to_display_string()?, q)),
                    None => {
                        let key = format!("{PLACEHOLDER_PREFIX}{}", operands.len());
                        expression.push(' ');
                        expression.push_str(&key);
                        expression.push(' ');
                        operands.insert(key, value);
                    }
                }
            }
        }
    }

    evaluate_expression(&expression, &operands)
}

/// Evaluates an expression string, resolving placeholders from `operands`.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use fluid_rs_template::boolean::evaluate_expression;
///
/// assert!(evaluate_expression("(1 == 1) && 3 % 2", &HashMap::new()).unwrap());
/// assert!(!evaluate_expression("'a' == 'b' || false", &HashMap::new()).unwrap());
/// ```
///
/// # Errors
///
/// Returns an evaluation error for malformed expressions and for `%` by zero.
pub fn evaluate_expression(expression: &str, operands: &HashMap<String, Value>) -> TemplateResult<bool> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Ok(false);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        operands,
    };
    let value = parser.or()?;
    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(TemplateError::Evaluation(format!(
            "Unexpected {token:?} in boolean expression '{}'",
            expression.trim()
        )));
    }
    Ok(value.is_truthy())
}

fn track_quotes(text: &str, quote: &mut Option<char>) {
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match (*quote, ch) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => *quote = None,
            (None, '\'' | '"') => *quote = Some(ch),
            _ => {}
        }
    }
}

fn escape_quoted(text: &str, quote: char) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == quote || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(Value),
    Word(String),
    Operator(&'static str),
    Open,
    Close,
}

const OPERATORS: [&str; 10] = ["==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "%"];

fn tokenize(expression: &str) -> TemplateResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = expression.as_bytes();
    let mut pos = 0;

    while pos < expression.len() {
        let rest = &expression[pos..];
        let Some(ch) = rest.chars().next() else { break };

        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }
        if ch == '(' || ch == ')' {
            tokens.push(if ch == '(' { Token::Open } else { Token::Close });
            pos += 1;
            continue;
        }
        if ch == '\'' || ch == '"' {
            let (text, len) = read_string(rest, ch)?;
            tokens.push(Token::Literal(Value::String(text)));
            pos += len;
            continue;
        }

        let expects_operand = matches!(
            tokens.last(),
            None | Some(Token::Operator(_) | Token::Open)
        );
        let negative = ch == '-' && expects_operand && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit);
        if ch.is_ascii_digit() || negative {
            let len = rest
                .char_indices()
                .skip(1)
                .find(|&(_, c)| !(c.is_ascii_digit() || c == '.'))
                .map_or(rest.len(), |(i, _)| i);
            let number = Number::parse(&rest[..len]).ok_or_else(|| {
                TemplateError::Evaluation(format!("Invalid number '{}'", &rest[..len]))
            })?;
            tokens.push(Token::Literal(number.to_value()));
            pos += len;
            continue;
        }
        if ch.is_alphanumeric() || ch == '_' {
            let len = rest
                .char_indices()
                .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '.'))
                .map_or(rest.len(), |(i, _)| i);
            let word = &rest[..len];
            tokens.push(match word.to_ascii_lowercase().as_str() {
                "and" => Token::Operator("&&"),
                "or" => Token::Operator("||"),
                _ => Token::Word(word.to_string()),
            });
            pos += len;
            continue;
        }
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push(Token::Operator(*op));
                pos += op.len();
            }
            None => {
                return Err(TemplateError::Evaluation(format!(
                    "Unexpected character '{ch}' in boolean expression '{}'",
                    expression.trim()
                )));
            }
        }
    }
    Ok(tokens)
}

/// Reads a quoted string starting at the opening quote. Returns the
/// unescaped text and the consumed byte length.
fn read_string(rest: &str, quote: char) -> TemplateResult<(String, usize)> {
    let mut text = String::new();
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    text.push(escaped);
                }
            }
            c if c == quote => return Ok((text, i + c.len_utf8())),
            c => text.push(c),
        }
    }
    Err(TemplateError::Evaluation(format!(
        "Unterminated string in boolean expression: {rest}"
    )))
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    operands: &'a HashMap<String, Value>,
}

impl Parser<'_> {
    fn peek_operator(&self, candidates: &[&str]) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Operator(op)) if candidates.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn or(&mut self) -> TemplateResult<Value> {
        let mut left = self.and()?;
        while self.peek_operator(&["||"]).is_some() {
            self.pos += 1;
            let right = self.and()?;
            left = Value::Bool(left.is_truthy() || right.is_truthy());
        }
        Ok(left)
    }

    fn and(&mut self) -> TemplateResult<Value> {
        let mut left = self.comparison()?;
        while self.peek_operator(&["&&"]).is_some() {
            self.pos += 1;
            let right = self.comparison()?;
            left = Value::Bool(left.is_truthy() && right.is_truthy());
        }
        Ok(left)
    }

    fn comparison(&mut self) -> TemplateResult<Value> {
        let left = self.modulo()?;
        let Some(op) = self.peek_operator(&["==", "!=", "<", ">", "<=", ">="]) else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.modulo()?;
        Ok(Value::Bool(compare(op, &left, &right)))
    }

    fn modulo(&mut self) -> TemplateResult<Value> {
        let mut left = self.unary()?;
        while self.peek_operator(&["%"]).is_some() {
            self.pos += 1;
            let right = self.unary()?;
            left = remainder(&left, &right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> TemplateResult<Value> {
        if self.peek_operator(&["!"]).is_some() {
            self.pos += 1;
            return Ok(Value::Bool(!self.unary()?.is_truthy()));
        }
        self.primary()
    }

    fn primary(&mut self) -> TemplateResult<Value> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(Token::Open) => {
                let value = self.or()?;
                if self.tokens.get(self.pos) != Some(&Token::Close) {
                    return Err(TemplateError::Evaluation(
                        "Missing ')' in boolean expression".to_string(),
                    ));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Literal(value)) => Ok(value),
            Some(Token::Word(word)) => Ok(self.word(word)),
            Some(other) => Err(TemplateError::Evaluation(format!(
                "Unexpected {other:?} in boolean expression"
            ))),
            None => Err(TemplateError::Evaluation(
                "Incomplete boolean expression".to_string(),
            )),
        }
    }

    fn word(&self, word: String) -> Value {
        if let Some(value) = self.operands.get(&word) {
            return value.clone();
        }
        match word.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" => Value::Bool(true),
            "false" | "off" | "no" => Value::Bool(false),
            _ => Value::String(word),
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(_) | Value::Float(_) => value.as_float(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Object(_), Value::Object(_)) => left.same_object(right),
        (Value::Object(object), Value::String(s)) | (Value::String(s), Value::Object(object)) => {
            object.to_display().as_deref() == Some(s.as_str())
        }
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(_), _) | (_, Value::Bool(_)) => left.is_truthy() == right.is_truthy(),
        _ => match (numeric(left), numeric(right)) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => left == right,
        },
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> bool {
    match op {
        "==" => return equals(left, right),
        "!=" => return !equals(left, right),
        _ => {}
    }
    let ordering = match (numeric(left), numeric(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => match (left.as_str(), right.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        },
    };
    ordering.is_some_and(|ordering| match op {
        "<" => ordering.is_lt(),
        ">" => ordering.is_gt(),
        "<=" => ordering.is_le(),
        ">=" => ordering.is_ge(),
        _ => false,
    })
}

fn remainder(left: &Value, right: &Value) -> TemplateResult<Value> {
    let division_by_zero = || TemplateError::Evaluation("Modulo by zero in boolean expression".to_string());
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        if *b == 0 {
            return Err(division_by_zero());
        }
        // i64::MIN % -1 overflows; the mathematical result is 0.
        return Ok(Value::Integer(a.wrapping_rem(*b)));
    }
    let a = left.as_float().unwrap_or_default();
    let b = right.as_float().unwrap_or_default();
    if b.abs() < f64::EPSILON {
        return Err(division_by_zero());
    }
    Ok(Value::Float(a % b))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::value::TemplateObject;

    #[derive(Debug)]
    struct Person(&'static str);

    impl TemplateObject for Person {
        fn type_name(&self) -> &str {
            "Person"
        }

        fn to_display(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn eval(expression: &str) -> bool {
        evaluate_expression(expression, &HashMap::new()).unwrap()
    }

    #[test]
    fn test_literals() {
        assert!(eval("1"));
        assert!(!eval("0"));
        assert!(eval("TRUE"));
        assert!(!eval("off"));
        assert!(eval("yes"));
        assert!(!eval("''"));
        assert!(eval("'x'"));
        assert!(!eval(""));
    }

    #[test]
    fn test_comparisons() {
        assert!(eval("1 == 1"));
        assert!(eval("1 == '1'"));
        assert!(eval("1.0 == 1"));
        assert!(eval("1 != 2"));
        assert!(eval("2 > 1 && 1 < 2"));
        assert!(eval("2 >= 2 and 2 <= 2"));
        assert!(eval("'abc' < 'abd'"));
        assert!(eval("-1 < 0"));
    }

    #[test]
    fn test_precedence() {
        assert!(eval("1 == 2 || 2 == 2 && 3 == 3"));
        assert!(!eval("(1 == 2 || 2 == 2) && 3 == 4"));
        assert!(eval("!(1 == 2)"));
        assert!(eval("!0"));
        assert!(eval("3 % 2 == 1"));
    }

    #[test]
    fn test_modulo_by_zero() {
        let err = evaluate_expression("3 % 0", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("Modulo by zero"));
    }

    #[test]
    fn test_modulo_overflow_is_not_division_by_zero() {
        let mut operands = HashMap::new();
        operands.insert("__b0".to_string(), Value::Integer(i64::MIN));
        operands.insert("__b1".to_string(), Value::Integer(-1));
        assert!(!evaluate_expression("__b0 % __b1", &operands).unwrap());
        assert!(evaluate_expression("__b0 % __b1 == 0", &operands).unwrap());

        operands.insert("__b1".to_string(), Value::Integer(0));
        let err = evaluate_expression("__b0 % __b1", &operands).unwrap_err();
        assert_eq!(err.code(), 3004);
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(evaluate_expression("(1 == 1", &HashMap::new()).is_err());
        assert!(evaluate_expression("1 ==", &HashMap::new()).is_err());
        assert!(evaluate_expression("'open", &HashMap::new()).is_err());
        assert!(evaluate_expression("1 2", &HashMap::new()).is_err());
    }

    #[test]
    fn test_null_equals_only_null() {
        let mut operands = HashMap::new();
        operands.insert("__b0".to_string(), Value::Null);
        operands.insert("__b1".to_string(), Value::Null);
        assert!(evaluate_expression("__b0 == __b1", &operands).unwrap());
        assert!(!evaluate_expression("__b0 == 0", &operands).unwrap());
        assert!(!evaluate_expression("__b0 == ''", &operands).unwrap());
    }

    #[test]
    fn test_object_comparison() {
        let alice: Arc<dyn TemplateObject> = Arc::new(Person("alice"));
        let other: Arc<dyn TemplateObject> = Arc::new(Person("alice"));
        let mut operands = HashMap::new();
        operands.insert("__b0".to_string(), Value::Object(Arc::clone(&alice)));
        operands.insert("__b1".to_string(), Value::Object(alice));
        operands.insert("__b2".to_string(), Value::Object(other));

        assert!(evaluate_expression("__b0 == __b1", &operands).unwrap());
        assert!(!evaluate_expression("__b0 == __b2", &operands).unwrap());
        assert!(evaluate_expression("__b0 == 'alice'", &operands).unwrap());
    }

    #[test]
    fn test_quote_tracking() {
        let mut quote = None;
        track_quotes("'it\\'s", &mut quote);
        assert_eq!(quote, Some('\''));
        track_quotes("' == 'x'", &mut quote);
        assert_eq!(quote, None);
        assert_eq!(escape_quoted("a'b", '\''), "a\\'b");
    }
}
