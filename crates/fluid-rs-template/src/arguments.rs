//! Argument definitions, supplied arguments and bound argument values.
//!
//! Helpers declare their arguments as a list of [`ArgumentDefinition`]s. The
//! sequencer collects the arguments written in the template into an
//! [`ArgumentCollection`], which is validated against the definitions before
//! the owning component is closed. At render time the collection is
//! evaluated into [`Arguments`], the values a helper actually sees.

use fluid_rs_core::error::{TemplateError, TemplateResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::rendering::RenderingContext;
use crate::value::Value;

/// The declared type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentType {
    /// A string.
    String,
    /// An integer.
    Integer,
    /// A float.
    Float,
    /// A boolean; supplied values are evaluated as boolean expressions.
    Boolean,
    /// An array or map.
    Array,
    /// Anything.
    Mixed,
}

/// A declared argument of a helper.
#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    /// The argument name.
    pub name: String,
    /// The declared type.
    pub argument_type: ArgumentType,
    /// A human-readable description.
    pub description: String,
    /// Whether the argument must be supplied.
    pub required: bool,
    /// The value used when the argument is not supplied.
    pub default: Option<Value>,
}

impl ArgumentDefinition {
    /// Creates an optional argument without a default.
    pub fn new(
        name: impl Into<String>,
        argument_type: ArgumentType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            argument_type,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    /// Marks the argument as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// The arguments written for one component, as sub-trees.
///
/// # Examples
///
/// ```
/// use fluid_rs_template::arguments::{ArgumentCollection, ArgumentDefinition, ArgumentType};
/// use fluid_rs_template::component::Component;
///
/// let definitions = vec![ArgumentDefinition::new("value", ArgumentType::Mixed, "").required()];
/// let mut arguments = ArgumentCollection::default();
/// assert_eq!(
///     arguments.finalize(&definitions, false, "x:y").unwrap_err().code(),
///     2001
/// );
///
/// arguments.insert("value", Component::text("1"));
/// assert!(arguments.finalize(&definitions, false, "x:y").is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentCollection {
    entries: Vec<(String, Component)>,
    additional: Vec<String>,
}

impl ArgumentCollection {
    /// Adds an argument. Returns `false` if the name was already supplied.
    pub fn insert(&mut self, name: impl Into<String>, value: Component) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, value));
        true
    }

    /// Returns the sub-tree supplied for `name`.
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Returns `true` if `name` was supplied.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry, _)| entry == name)
    }

    /// Iterates the supplied arguments in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Component)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of supplied arguments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the names accepted as additional (undeclared) arguments.
    pub fn additional_names(&self) -> &[String] {
        &self.additional
    }

    /// Validates the supplied arguments against the declared ones.
    ///
    /// Undeclared names are recorded as additional arguments when
    /// `accepts_additional` is set. Values of boolean-typed arguments are
    /// rewrapped into boolean nodes.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UndeclaredArgument`] for an undeclared name
    /// the component does not accept and [`TemplateError::MissingArgument`]
    /// for a required argument that was not supplied.
    pub fn finalize(
        &mut self,
        definitions: &[ArgumentDefinition],
        accepts_additional: bool,
        component: &str,
    ) -> TemplateResult<()> {
        self.additional.clear();
        for (name, _) in &self.entries {
            if definitions.iter().any(|def| &def.name == name) {
                continue;
            }
            if !accepts_additional {
                return Err(TemplateError::UndeclaredArgument {
                    component: component.to_string(),
                    argument: name.clone(),
                });
            }
            self.additional.push(name.clone());
        }

        if let Some(missing) = definitions
            .iter()
            .find(|def| def.required && !self.contains(&def.name))
        {
            return Err(TemplateError::MissingArgument {
                component: component.to_string(),
                argument: missing.name.clone(),
            });
        }

        for (name, value) in &mut self.entries {
            let is_boolean = definitions
                .iter()
                .any(|def| &def.name == name && def.argument_type == ArgumentType::Boolean);
            if is_boolean {
                let captured = std::mem::replace(value, Component::null());
                *value = Component::boolean(captured);
            }
        }
        Ok(())
    }
}

/// Evaluated argument values handed to a helper.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: IndexMap<String, Value>,
    additional: Vec<String>,
}

impl Arguments {
    /// Evaluates every supplied argument and fills in declared defaults.
    pub fn evaluate(
        collection: &ArgumentCollection,
        definitions: &[ArgumentDefinition],
        ctx: &mut RenderingContext,
    ) -> TemplateResult<Self> {
        let mut values = IndexMap::with_capacity(definitions.len().max(collection.len()));
        for (name, node) in collection.iter() {
            values.insert(name.to_string(), node.evaluate(ctx)?);
        }
        for definition in definitions {
            if values.contains_key(&definition.name) {
                continue;
            }
            if let Some(default) = &definition.default {
                values.insert(definition.name.clone(), default.clone());
            }
        }
        Ok(Self {
            values,
            additional: collection.additional_names().to_vec(),
        })
    }

    /// Creates bound arguments directly from values.
    pub fn from_values(values: IndexMap<String, Value>) -> Self {
        Self {
            values,
            additional: Vec::new(),
        }
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns `true` if `name` has a non-null value.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_null())
    }

    /// Returns the display string bound to `name`, if any.
    pub fn get_string(&self, name: &str) -> TemplateResult<Option<String>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.to_display_string().map(Some),
        }
    }

    /// Returns the truthiness of the value bound to `name`.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).is_some_and(Value::is_truthy)
    }

    /// Iterates the additional (undeclared) arguments.
    pub fn additional(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.additional
            .iter()
            .filter_map(|name| self.values.get(name).map(|value| (name.as_str(), value)))
    }

    /// Iterates all bound arguments.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
