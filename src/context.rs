//! Template context for variable resolution.
//!
//! Provides [`Context`] for holding template variables in a stack of scopes,
//! and [`Value`] for representing the dynamic values templates can render.

use std::collections::HashMap;
use std::fmt;

/// A dynamic value in a template context.
///
/// Covers every value type a template can interpolate or iterate over:
/// strings, numbers, booleans, lists, maps, and the absence of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A string value.
    String(String),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit floating point number.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A key-value mapping.
    Map(HashMap<String, Value>),
    /// The absence of a value.
    None,
}

impl Value {
    /// Returns `true` if this value is considered truthy in a condition.
    ///
    /// `None`, `false`, numeric zero, and empty strings, lists, and maps are
    /// falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
        }
    }

    /// Converts this value to its display string for interpolation.
    ///
    /// `None` renders as the empty string. Booleans render as `True`/`False`
    /// and integer-valued floats keep one decimal place, the Python-style
    /// string representations existing templates depend on.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => {
                if f.fract() == 0.0 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Self::Bool(b) => {
                if *b {
                    "True".to_string()
                } else {
                    "False".to_string()
                }
            }
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Self::Map(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.to_repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Self::None => String::new(),
        }
    }

    /// Returns a repr-style string for values nested inside lists and maps.
    fn to_repr(&self) -> String {
        match self {
            Self::String(s) => format!("'{s}'"),
            Self::None => "None".to_string(),
            other => other.to_display_string(),
        }
    }

    /// Resolves one path segment on this value.
    ///
    /// Maps resolve by key; lists resolve by numeric index. Anything else has
    /// no resolvable segments.
    pub fn resolve_segment(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(list) => key.parse::<usize>().ok().and_then(|idx| list.get(idx)),
            _ => None,
        }
    }

    /// Returns the string contents if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
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

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<usize> for Value {
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
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(m: HashMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => v.into(),
            None => Self::None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::None
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::List(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// A template context holding variables in a stack of scopes.
///
/// Loop expansion pushes a scope per iteration so the loop variable shadows
/// ambient bindings without mutating them; popping the scope restores the
/// enclosing context exactly.
///
/// # Examples
///
/// ```
/// use stencil::context::{Context, Value};
///
/// let mut ctx = Context::new();
/// ctx.set("name", Value::from("Ada"));
/// assert_eq!(ctx.get("name").unwrap().to_display_string(), "Ada");
///
/// ctx.push();
/// ctx.set("name", Value::from("shadowed"));
/// assert_eq!(ctx.get("name").unwrap().to_display_string(), "shadowed");
///
/// ctx.pop();
/// assert_eq!(ctx.get("name").unwrap().to_display_string(), "Ada");
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    stack: Vec<HashMap<String, Value>>,
    escape: bool,
}

impl Context {
    /// Creates a new empty context with a single scope.
    ///
    /// Escaping is off by default: values are interpolated as raw text, which
    /// is unsafe for untrusted input. Opt in with [`Context::set_escape`] or
    /// [`Engine::set_auto_escape`](crate::engine::Engine::set_auto_escape).
    pub fn new() -> Self {
        Self {
            stack: vec![HashMap::new()],
            escape: false,
        }
    }

    /// Pushes a new scope onto the context stack.
    pub fn push(&mut self) {
        self.stack.push(HashMap::new());
    }

    /// Pops the top scope from the context stack.
    ///
    /// The base scope is never popped.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Sets a variable in the current (top) scope.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if let Some(top) = self.stack.last_mut() {
            top.insert(key.into(), value);
        }
    }

    /// Looks up a variable by name, searching from the top scope downward.
    ///
    /// Supports dot-separated paths like `user.name` or `items.0`. Any
    /// missing segment or type mismatch along the path yields `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let root_key = parts.next()?;

        let mut current = self
            .stack
            .iter()
            .rev()
            .find_map(|scope| scope.get(root_key))?;

        for part in parts {
            current = current.resolve_segment(part)?;
        }

        Some(current)
    }

    /// Returns whether HTML escaping is applied to interpolated values.
    pub fn escape(&self) -> bool {
        self.escape
    }

    /// Sets whether HTML escaping is applied to interpolated values.
    pub fn set_escape(&mut self, enabled: bool) {
        self.escape = enabled;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes HTML special characters in a string.
///
/// Replaces `&`, `<`, `>`, `"`, and `'` with their HTML entity equivalents.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
