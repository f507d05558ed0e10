//! Interpolating configuration tree
//!
//! Documents (workflows, hooks, project files) are held as raw JSON values.
//! Nothing is formatted at load time: every read interpolates against the
//! lookup handed in, so a value resolves to what is visible when it is read.

use crate::core::error::{Error, Result};
use crate::core::variable::{interpolate, interpolate_value, Lookup};
use serde_json::{Map, Value};
use std::fmt;

/// Expected runtime shape of a tree value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Any,
    Null,
    Bool,
    Int,
    Float,
    Number,
    String,
    List,
    Tree,
    OneOf(&'static [Shape]),
}

impl Shape {
    /// Check whether `value` satisfies this shape
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Shape::Any => true,
            Shape::Null => value.is_null(),
            Shape::Bool => value.is_boolean(),
            Shape::Int => value.is_i64() || value.is_u64(),
            Shape::Float => value.is_f64(),
            Shape::Number => value.is_number(),
            Shape::String => value.is_string(),
            Shape::List => value.is_array(),
            Shape::Tree => value.is_object(),
            Shape::OneOf(shapes) => shapes.iter().any(|shape| shape.matches(value)),
        }
    }

    /// The concrete shape of `value`
    pub fn of(value: &Value) -> Shape {
        match value {
            Value::Null => Shape::Null,
            Value::Bool(_) => Shape::Bool,
            Value::Number(number) if number.is_f64() => Shape::Float,
            Value::Number(_) => Shape::Int,
            Value::String(_) => Shape::String,
            Value::Array(_) => Shape::List,
            Value::Object(_) => Shape::Tree,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => write!(f, "any"),
            Shape::Null => write!(f, "null"),
            Shape::Bool => write!(f, "bool"),
            Shape::Int => write!(f, "int"),
            Shape::Float => write!(f, "float"),
            Shape::Number => write!(f, "number"),
            Shape::String => write!(f, "string"),
            Shape::List => write!(f, "list"),
            Shape::Tree => write!(f, "mapping"),
            Shape::OneOf(shapes) => {
                let names: Vec<String> = shapes.iter().map(Shape::to_string).collect();
                write!(f, "{}", names.join(" | "))
            }
        }
    }
}

/// A string-keyed mapping whose reads interpolate templates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    map: Map<String, Value>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a value that must be a mapping; `what` names it in the error
    pub fn from_value(value: Value, what: &str) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { map }),
            other => Err(Error::config(format!(
                "{what} must be a mapping, found {}.",
                Shape::of(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// True when `key` exists and is not null
    pub fn has_value(&self, key: &str) -> bool {
        self.map.get(key).is_some_and(|value| !value.is_null())
    }

    /// Raw keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Uninterpolated value
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }

    /// Store a value under `key`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(key.into(), value.into());
    }

    /// Typed read: interpolate, fall back to `default`, check `shape`
    pub fn typed_get(
        &self,
        key: &str,
        default: Option<Value>,
        shape: Shape,
        vars: &dyn Lookup,
    ) -> Result<Value> {
        let Some(raw) = self.map.get(key) else {
            return match default {
                Some(default) => Ok(interpolate_value(&default, vars)),
                None => Err(Error::MissingKey(key.to_string())),
            };
        };

        let value = interpolate_value(raw, vars);
        if shape.matches(&value) {
            Ok(value)
        } else {
            Err(Error::TypeMismatch {
                key: key.to_string(),
                expected: shape.to_string(),
                actual: Shape::of(&value).to_string(),
            })
        }
    }

    /// Required read of any shape
    pub fn get(&self, key: &str, vars: &dyn Lookup) -> Result<Value> {
        self.typed_get(key, None, Shape::Any, vars)
    }

    /// Read that treats an absent key or an explicit null as `None`
    pub fn get_opt(&self, key: &str, shape: Shape, vars: &dyn Lookup) -> Result<Option<Value>> {
        if !self.has_value(key) {
            return Ok(None);
        }
        self.typed_get(key, None, shape, vars).map(Some)
    }

    pub fn get_str(&self, key: &str, vars: &dyn Lookup) -> Result<String> {
        let value = self.typed_get(key, None, Shape::String, vars)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub fn get_str_or(&self, key: &str, default: &str, vars: &dyn Lookup) -> Result<String> {
        let value = self.typed_get(key, Some(Value::from(default)), Shape::String, vars)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub fn get_bool_or(&self, key: &str, default: bool, vars: &dyn Lookup) -> Result<bool> {
        let value = self.typed_get(key, Some(Value::Bool(default)), Shape::Bool, vars)?;
        Ok(value.as_bool().unwrap_or(default))
    }

    /// Nested mapping, or an empty tree when absent
    pub fn get_tree_or_empty(&self, key: &str, vars: &dyn Lookup) -> Result<ConfigTree> {
        match self.get_opt(key, Shape::Tree, vars)? {
            Some(value) => ConfigTree::from_value(value, key),
            None => Ok(ConfigTree::new()),
        }
    }

    pub fn get_list(&self, key: &str, vars: &dyn Lookup) -> Result<Vec<Value>> {
        match self.typed_get(key, None, Shape::List, vars)? {
            Value::Array(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    /// Entries with interpolated keys and values, in insertion order
    pub fn entries(&self, vars: &dyn Lookup) -> Vec<(String, Value)> {
        self.map
            .iter()
            .map(|(key, value)| (interpolate(key, vars), interpolate_value(value, vars)))
            .collect()
    }

    /// Merge `src` into this tree. Nested mappings merge recursively,
    /// sequences concatenate, scalars present in `src` overwrite, and keys
    /// only in `src` are appended. Existing keys keep their position.
    pub fn merge(&mut self, src: &ConfigTree) {
        merge_maps(&mut self.map, &src.map);
    }
}

fn merge_maps(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in dst.iter_mut() {
        let Some(incoming) = src.get(key) else {
            continue;
        };
        match (value, incoming) {
            (Value::Object(nested), Value::Object(incoming)) => merge_maps(nested, incoming),
            (Value::Array(items), Value::Array(incoming)) => items.extend(incoming.iter().cloned()),
            (value, incoming) => *value = incoming.clone(),
        }
    }

    for (key, value) in src {
        if !dst.contains_key(key) {
            dst.insert(key.clone(), value.clone());
        }
    }
}

impl From<Map<String, Value>> for ConfigTree {
    fn from(map: Map<String, Value>) -> Self {
        Self { map }
    }
}

impl TryFrom<Value> for ConfigTree {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        ConfigTree::from_value(value, "document")
    }
}
