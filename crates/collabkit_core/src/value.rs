//! The JSON value universe and the input templates that get normalized into it.
//!
//! Trees owned by callers are plain [`Value`]s (`serde_json::Value`, built with
//! `preserve_order` so object keys keep their insertion order). Desired states
//! arrive as [`Template`]s, which may additionally carry `undefined` slots and
//! values that have no JSON representation. [`normalize`] strips those away:
//!
//! ```
//! use collabkit_core::value::{normalize, Template};
//! use indexmap::IndexMap;
//!
//! let mut fields = IndexMap::new();
//! fields.insert("title".to_string(), Template::from("draft"));
//! fields.insert("opened".to_string(), Template::Unsupported("Date".into()));
//! fields.insert("owner".to_string(), Template::Undefined);
//!
//! let value = normalize(Template::Object(fields)).unwrap();
//! assert_eq!(value, serde_json::json!({ "title": "draft" }));
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number};

use crate::error::{CollabError, Result};
use crate::path::Path;

pub use serde_json::Value;

/// Largest integer a replicated `f64` number can carry without losing precision.
pub(crate) const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// The shape class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean,
    /// Any JSON number
    Number,
    /// A string
    String,
    /// An ordered sequence
    Array,
    /// A string-keyed mapping
    Object,
}

impl NodeKind {
    /// Returns the kind of `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => NodeKind::Null,
            Value::Bool(_) => NodeKind::Boolean,
            Value::Number(_) => NodeKind::Number,
            Value::String(_) => NodeKind::String,
            Value::Array(_) => NodeKind::Array,
            Value::Object(_) => NodeKind::Object,
        }
    }

    /// Arrays and objects can be diffed and patched recursively.
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Array | NodeKind::Object)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Null => "null",
            NodeKind::Boolean => "boolean",
            NodeKind::Number => "number",
            NodeKind::String => "string",
            NodeKind::Array => "array",
            NodeKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// A desired state as supplied by a caller, before normalization.
///
/// Besides everything a [`Value`] can hold, a template may contain
/// [`Template::Undefined`] (an absent key or array slot) and
/// [`Template::Unsupported`] (a value with no JSON form, such as a date or a
/// function, named by its kind). Neither survives normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// An absent value. Deletes the key or drops the array slot.
    Undefined,
    /// A value outside the JSON universe, identified by its kind.
    Unsupported(String),
    /// `null`
    Null,
    /// A boolean
    Bool(bool),
    /// A finite number
    Number(Number),
    /// A string
    String(String),
    /// An array of templates
    Array(Vec<Template>),
    /// An object of templates, in insertion order
    Object(IndexMap<String, Template>),
}

impl Template {
    fn describe(&self) -> String {
        match self {
            Template::Undefined => "undefined".to_string(),
            Template::Unsupported(kind) => format!("unsupported {}", kind),
            _ => "value".to_string(),
        }
    }
}

impl From<Value> for Template {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Template::Null,
            Value::Bool(b) => Template::Bool(b),
            Value::Number(n) => Template::Number(n),
            Value::String(s) => Template::String(s),
            Value::Array(items) => Template::Array(items.into_iter().map(Template::from).collect()),
            Value::Object(map) => Template::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Template::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for Template {
    fn from(value: &Value) -> Self {
        Template::from(value.clone())
    }
}

impl From<bool> for Template {
    fn from(value: bool) -> Self {
        Template::Bool(value)
    }
}

impl From<i64> for Template {
    fn from(value: i64) -> Self {
        Template::Number(Number::from(value))
    }
}

/// Non-finite numbers have no JSON form and become [`Template::Unsupported`].
impl From<f64> for Template {
    fn from(value: f64) -> Self {
        match Number::from_f64(value) {
            Some(n) => Template::Number(n),
            None => Template::Unsupported(format!("number {}", value)),
        }
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Template::String(value.to_string())
    }
}

impl From<String> for Template {
    fn from(value: String) -> Self {
        Template::String(value)
    }
}

impl<T: Into<Template>> From<Option<T>> for Template {
    fn from(value: Option<T>) -> Self {
        value.map_or(Template::Undefined, Into::into)
    }
}

impl FromIterator<Template> for Template {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        Template::Array(iter.into_iter().collect())
    }
}

impl FromIterator<(String, Template)> for Template {
    fn from_iter<I: IntoIterator<Item = (String, Template)>>(iter: I) -> Self {
        Template::Object(iter.into_iter().collect())
    }
}

/// Normalize a template into a [`Value`].
///
/// Undefined and unsupported values nested anywhere below the root are removed:
/// object keys holding them are dropped and arrays are compacted. A root that
/// is itself not representable is a [`CollabError::Normalization`].
///
/// Normalization is idempotent.
pub fn normalize(template: impl Into<Template>) -> Result<Value> {
    let template = template.into();
    let reason = template.describe();
    normalize_node(template).ok_or_else(|| CollabError::Normalization {
        path: Path::root().to_string(),
        reason: format!("root is {}", reason),
    })
}

/// Like [`normalize`], but the root must be an array or an object.
pub fn normalize_container(template: impl Into<Template>) -> Result<Value> {
    let value = normalize(template)?;
    let kind = NodeKind::of(&value);
    if !kind.is_container() {
        return Err(CollabError::Normalization {
            path: Path::root().to_string(),
            reason: format!("expected an array or object root, found {}", kind),
        });
    }
    Ok(value)
}

fn normalize_node(template: Template) -> Option<Value> {
    match template {
        Template::Undefined | Template::Unsupported(_) => None,
        Template::Null => Some(Value::Null),
        Template::Bool(b) => Some(Value::Bool(b)),
        Template::Number(n) => Some(Value::Number(n)),
        Template::String(s) => Some(Value::String(s)),
        Template::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(normalize_node).collect(),
        )),
        Template::Object(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (key, field) in fields {
                if let Some(value) = normalize_node(field) {
                    map.insert(key, value);
                }
            }
            Some(Value::Object(map))
        }
    }
}

/// Strictly convert a template, failing on the first value that is not
/// representable as JSON instead of dropping it.
pub fn validate(template: impl Into<Template>) -> Result<Value> {
    validate_node(template.into(), &mut Path::root())
}

fn validate_node(template: Template, path: &mut Path) -> Result<Value> {
    match template {
        Template::Undefined | Template::Unsupported(_) => Err(CollabError::Normalization {
            path: path.to_string(),
            reason: format!("{} is not valid JSON", template.describe()),
        }),
        Template::Null => Ok(Value::Null),
        Template::Bool(b) => Ok(Value::Bool(b)),
        Template::Number(n) => Ok(Value::Number(n)),
        Template::String(s) => Ok(Value::String(s)),
        Template::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                path.push_index(index);
                let value = validate_node(item, path);
                path.pop();
                values.push(value?);
            }
            Ok(Value::Array(values))
        }
        Template::Object(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (key, field) in fields {
                path.push_key(&key);
                let value = validate_node(field, path);
                path.pop();
                map.insert(key, value?);
            }
            Ok(Value::Object(map))
        }
    }
}

/// Structural equality.
///
/// Objects compare without regard to key order. Numbers compare by numeric
/// value, so `1` equals `1.0`.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| deep_equal(l, r)))
        }
        _ => false,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(l), Some(r)) = (x.as_i64(), y.as_i64()) {
        return l == r;
    }
    if let (Some(l), Some(r)) = (x.as_u64(), y.as_u64()) {
        return l == r;
    }
    x.as_f64() == y.as_f64()
}

/// Build a JSON number from an `f64`, preferring the integer form when the
/// value is integral and exactly representable.
pub(crate) fn number_from_f64(value: f64) -> Option<Number> {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER as f64 {
        return Some(Number::from(value as i64));
    }
    Number::from_f64(value)
}
