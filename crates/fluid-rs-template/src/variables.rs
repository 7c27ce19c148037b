//! Variable scopes for rendering.
//!
//! Provides [`VariableProvider`], a stack of variable scopes. Only the top
//! scope is visible: entering a partial or section either starts a fresh
//! scope seeded with explicitly passed variables or an inherited copy of the
//! current one, so nothing leaks between scopes implicitly.

use indexmap::IndexMap;

use crate::value::Value;

/// An ordered set of named variables.
pub type Variables = IndexMap<String, Value>;

/// The name that resolves to the whole current scope.
pub const ALL_VARIABLES: &str = "_all";

/// How a new scope is seeded when it is entered.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeMode {
    /// Only the given variables are visible.
    Fresh(Variables),
    /// A copy of the current scope, extended by the given variables.
    Inherit(Variables),
}

/// A stack of variable scopes.
///
/// # Examples
///
/// ```
/// use fluid_rs_template::value::Value;
/// use fluid_rs_template::variables::{ScopeMode, VariableProvider, Variables};
///
/// let mut vars = VariableProvider::new();
/// vars.set("name", Value::from("Fluid"));
///
/// vars.push(ScopeMode::Fresh(Variables::new()));
/// assert!(vars.get("name").is_none());
/// vars.pop();
///
/// assert_eq!(vars.get("name"), Some(Value::from("Fluid")));
/// ```
#[derive(Debug, Clone)]
pub struct VariableProvider {
    scopes: Vec<Variables>,
}

impl Default for VariableProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableProvider {
    /// Creates a provider with a single empty scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Variables::new()],
        }
    }

    /// Creates a provider whose single scope holds the given variables.
    pub fn with_variables(variables: Variables) -> Self {
        Self {
            scopes: vec![variables],
        }
    }

    /// Enters a new scope.
    pub fn push(&mut self, mode: ScopeMode) {
        let scope = match mode {
            ScopeMode::Fresh(variables) => variables,
            ScopeMode::Inherit(variables) => {
                let mut scope = self.current().clone();
                scope.extend(variables);
                scope
            }
        };
        self.scopes.push(scope);
    }

    /// Leaves the current scope.
    ///
    /// The outermost scope is never removed.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Returns the number of scopes on the stack.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Sets a variable in the current scope.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name.into(), value);
        }
    }

    /// Removes a variable from the current scope.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.scopes.last_mut().and_then(|top| top.shift_remove(name))
    }

    /// Looks up a dot-separated path (`user.address.city`, `items.0`).
    ///
    /// `_all` resolves to the whole current scope.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let mut current = if root == ALL_VARIABLES {
            self.all()
        } else {
            self.current().get(root)?.clone()
        };
        for segment in segments {
            current = current.get_segment(segment)?;
        }
        Some(current)
    }

    /// Returns `true` if the current scope defines `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.current().contains_key(name)
    }

    /// Returns the whole current scope as a map value.
    pub fn all(&self) -> Value {
        Value::Map(self.current().clone())
    }

    /// Returns the variables of the current scope.
    pub fn current(&self) -> &Variables {
        // The stack always holds at least the outermost scope.
        &self.scopes[self.scopes.len() - 1]
    }
}
