//! Runtime values.
//!
//! Provides [`Value`], the tagged union every component evaluates to, and
//! [`TemplateObject`], the trait host types implement to be usable as
//! object-like values inside templates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use fluid_rs_core::error::{TemplateError, TemplateResult};
use indexmap::IndexMap;

/// An object-like value supplied by the host application.
///
/// Objects are compared by identity, expose properties through
/// [`get`](TemplateObject::get) and may or may not have a string form.
pub trait TemplateObject: Send + Sync + fmt::Debug {
    /// The type name reported in error messages.
    fn type_name(&self) -> &str;

    /// Returns the property with the given name.
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Returns the string form of this object, if it has one.
    fn to_display(&self) -> Option<String> {
        None
    }

    /// Returns the number of elements if this object is countable.
    fn len(&self) -> Option<usize> {
        None
    }
}

/// A dynamic value produced while rendering.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// A positional list.
    Array(Vec<Value>),
    /// An ordered key-value mapping.
    Map(IndexMap<String, Value>),
    /// A host object, shared by reference.
    Object(Arc<dyn TemplateObject>),
}

impl Value {
    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) | Self::Map(_) => "array",
            Self::Object(obj) => obj.type_name(),
        }
    }

    /// Returns `true` if this is [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerces this value to a boolean.
    ///
    /// - booleans pass through
    /// - numbers are truthy if nonzero
    /// - strings are falsy if empty or equal to `false` (case-insensitive)
    /// - arrays and countable objects are truthy if non-empty
    /// - every other object is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
            Self::Array(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Object(obj) => obj.len().map_or(true, |len| len > 0),
        }
    }

    /// Converts this value to its display string.
    ///
    /// `true` renders as `1`, `false` and null as the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotStringable`] for arrays and for objects
    /// without a string form.
    pub fn to_display_string(&self) -> TemplateResult<String> {
        match self {
            Self::Null | Self::Bool(false) => Ok(String::new()),
            Self::Bool(true) => Ok("1".to_string()),
            Self::Integer(i) => Ok(i.to_string()),
            Self::Float(f) => Ok(f.to_string()),
            Self::String(s) => Ok(s.clone()),
            Self::Array(_) | Self::Map(_) => Err(TemplateError::NotStringable {
                type_name: self.type_name().to_string(),
            }),
            Self::Object(obj) => obj.to_display().ok_or_else(|| TemplateError::NotStringable {
                type_name: obj.type_name().to_string(),
            }),
        }
    }

    /// Resolves a single path segment (`user` -> `name`, `items` -> `0`).
    pub fn get_segment(&self, key: &str) -> Option<Value> {
        match self {
            Self::Map(map) => map.get(key).cloned(),
            Self::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            Self::Object(obj) => obj.get(key),
            _ => None,
        }
    }

    /// Returns the number of elements of a collection or countable object.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Array(items) => Some(items.len()),
            Self::Map(map) => Some(map.len()),
            Self::String(s) => Some(s.chars().count()),
            Self::Object(obj) => obj.len(),
            _ => None,
        }
    }

    /// Returns `true` if this is an empty collection, string or null.
    pub fn is_empty(&self) -> bool {
        self.is_null() || self.len() == Some(0)
    }

    /// Attempts to interpret this value as a number.
    ///
    /// Numeric strings are accepted, null and booleans count as 0 and 1.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Null => Some(0.0),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer or an integral float.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Returns the string contents if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` if this is an integer or a float.
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Returns `true` if both values are the same host object.
    pub fn same_object(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            #[allow(clippy::cast_precision_loss)]
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(_), Self::Object(_)) => self.same_object(other),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_display_string() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "[{}]", self.type_name()),
        }
    }
}

/// Escapes HTML special characters in a string.
///
/// Converts `&`, `<`, `>`, `"`, and `'` to their HTML entity equivalents.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + s.len() / 10);
    for ch in s.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#039;"),
            _ => result.push(ch),
        }
    }
    result
}

// -- From implementations --

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_possible_wrap)]
    fn from(i: usize) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<IndexMap<String, T>> for Value {
    fn from(m: IndexMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(m: HashMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Self::Null, Into::into)
    }
}

impl From<Arc<dyn TemplateObject>> for Value {
    fn from(obj: Arc<dyn TemplateObject>) -> Self {
        Self::Object(obj)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::Array(arr.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}
