//! Scoped variable store and `${{ name }}` template interpolation
//!
//! Every name maps to a LIFO stack of values. Pushing shadows the previous
//! value, popping restores it. Interpolation always reads the current top, so
//! a template resolves against whatever is visible at *read* time.

use crate::core::error::{Error, Result};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Version of the running engine, exposed as `repoutils.version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Anything that can resolve a placeholder name to a value
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Lookup for Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Lookup for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Call-site overrides layered on top of another lookup (overrides win)
pub struct Overlay<'a> {
    pub overrides: &'a dyn Lookup,
    pub base: &'a dyn Lookup,
}

impl Lookup for Overlay<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.overrides
            .lookup(name)
            .or_else(|| self.base.lookup(name))
    }
}

/// The process-wide variable store, owned by the engine
#[derive(Debug, Clone, Default)]
pub struct VariableStack {
    entries: HashMap<String, Vec<Value>>,
}

impl VariableStack {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the built-in host and tool variables
    pub fn with_builtins() -> Self {
        let mut stack = Self::new();

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let command = std::env::args().collect::<Vec<_>>().join(" ");
        let node = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        stack.push("home", home.display().to_string());
        stack.push("cwd", cwd.display().to_string());
        stack.push("repoutils.version", VERSION);
        stack.push("repoutils.command", command);
        stack.push("host.os", std::env::consts::OS);
        stack.push("host.family", std::env::consts::FAMILY);
        stack.push("host.machine", std::env::consts::ARCH);
        stack.push("host.node", node);

        stack
    }

    /// Push a value, shadowing any previous one under `name`
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Pop the most recent value; `None` when nothing is pushed under `name`
    pub fn pop(&mut self, name: &str) -> Option<Value> {
        let values = self.entries.get_mut(name)?;
        let value = values.pop();
        if values.is_empty() {
            self.entries.remove(name);
        }
        value
    }

    /// Most recent value of `name`
    pub fn peek(&self, name: &str) -> Result<&Value> {
        self.lookup(name)
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of values currently stacked under `name`
    pub fn depth(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, Vec::len)
    }

    /// All defined names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Interpolate `text` against this store, with optional overrides on top
    pub fn interpolate(&self, text: &str, overrides: Option<&Map<String, Value>>) -> String {
        match overrides {
            Some(overrides) => interpolate(
                text,
                &Overlay {
                    overrides,
                    base: self,
                },
            ),
            None => interpolate(text, self),
        }
    }

    /// Open a scope whose pushes are popped when it is dropped
    pub fn scope(&mut self) -> VarScope<'_, Self> {
        VarScope::new(self)
    }
}

impl Lookup for VariableStack {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).and_then(|values| values.last())
    }
}

impl AsMut<VariableStack> for VariableStack {
    fn as_mut(&mut self) -> &mut VariableStack {
        self
    }
}

/// Guard over anything holding a [`VariableStack`]; every push made through it
/// is popped again when the guard goes away, whatever the exit path.
pub struct VarScope<'a, T: AsMut<VariableStack>> {
    owner: &'a mut T,
    pushed: Vec<String>,
}

impl<'a, T: AsMut<VariableStack>> VarScope<'a, T> {
    pub fn new(owner: &'a mut T) -> Self {
        Self {
            owner,
            pushed: Vec::new(),
        }
    }

    /// Push `value` for the lifetime of this scope
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.owner.as_mut().push(name.clone(), value);
        self.pushed.push(name);
    }
}

impl<T: AsMut<VariableStack>> Deref for VarScope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.owner
    }
}

impl<T: AsMut<VariableStack>> DerefMut for VarScope<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.owner
    }
}

impl<T: AsMut<VariableStack>> Drop for VarScope<'_, T> {
    fn drop(&mut self) {
        let stack = self.owner.as_mut();
        for name in self.pushed.drain(..).rev() {
            stack.pop(&name);
        }
    }
}

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{\{ *([A-Za-z0-9._-]+) *\}\}").expect("placeholder pattern is valid")
    })
}

/// Replace every `${{ name }}` token in `text`. Unresolved tokens stay as-is.
pub fn interpolate(text: &str, vars: &dyn Lookup) -> String {
    placeholder()
        .replace_all(text, |caps: &Captures| match vars.lookup(&caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Interpolate strings, recursing into sequences. Mappings are returned
/// untouched; they interpolate their own leaves when read.
pub fn interpolate_value(value: &Value, vars: &dyn Lookup) -> Value {
    match value {
        Value::String(text) => Value::String(interpolate(text, vars)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, vars))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Textual form used when a value is substituted into a template
pub fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Render a value for user-facing messages: `empty` stands in for an empty
/// string and a trailing backslash is doubled so it cannot escape a quote.
pub fn make_pretty(value: impl ToString, empty: &str) -> String {
    let mut text = value.to_string();
    if text.is_empty() {
        return empty.to_string();
    }
    if text.ends_with('\\') {
        text.push('\\');
    }
    text
}
