//! The runtime value model.
//!
//! Every piece of data flowing through a render is a [`Value`]: props,
//! globals, loop items, expression results. Coercion rules live here so
//! each operator has exactly one implementation instead of one per call
//! site.

use crate::eval::FnCtx;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A dynamically-typed runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absent value. Missing lookups and failed evaluations produce it.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer number.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered sequence.
    List(Arc<Vec<Value>>),
    /// A string-keyed mapping with insertion order preserved.
    Map(Arc<MapValue>),
    /// A callable registered by the host application.
    Func(Function),
    /// An opaque host object resolved through [`PropAccess`].
    Object(Arc<dyn PropAccess>),
}

/// A mapping value. `detached` marks the cycle-safe `$props` wrapper that
/// must not be serialised.
#[derive(Debug, Clone, Default)]
pub struct MapValue {
    entries: IndexMap<String, Value>,
    detached: bool,
}

impl MapValue {
    /// Create a mapping from its entries.
    pub fn new(entries: IndexMap<String, Value>) -> Self {
        Self {
            entries,
            detached: false,
        }
    }

    /// Create a detached (non-serialisable) mapping.
    pub fn new_detached(entries: IndexMap<String, Value>) -> Self {
        Self {
            entries,
            detached: true,
        }
    }

    /// Whether this mapping is excluded from serialisation.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for MapValue {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Accessor for opaque host objects exposed to templates.
pub trait PropAccess: Send + Sync + fmt::Debug {
    /// Resolve a property by key; `None` reads as null.
    fn get_prop(&self, key: &str) -> Option<Value>;
}

/// A host callable. Receives the render context (scope + store) and the
/// evaluated argument list.
#[derive(Clone)]
pub struct Function(Arc<dyn Fn(&FnCtx<'_>, &[Value]) -> Value + Send + Sync>);

impl Function {
    /// Wrap a closure as a template-callable function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&FnCtx<'_>, &[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the function.
    pub fn call(&self, ctx: &FnCtx<'_>, args: &[Value]) -> Value {
        (self.0)(ctx, args)
    }

    fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function(..)")
    }
}

impl Value {
    /// Build a list value.
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(items))
    }

    /// Build a mapping value from key/value pairs, preserving order.
    pub fn map<I, K>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Build a callable value.
    pub fn func<F>(f: F) -> Value
    where
        F: Fn(&FnCtx<'_>, &[Value]) -> Value + Send + Sync + 'static,
    {
        Value::Func(Function::new(f))
    }

    /// Whether this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness. Strings `""`, `"false"` and `"0"` are falsy; this string
    /// convention is a contract of the template dialect.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s != "false" && s != "0",
            Value::List(_) | Value::Map(_) | Value::Func(_) | Value::Object(_) => true,
        }
    }

    /// The numeric reading of this value, if it is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Coerce to a float; non-numbers read as 0.
    pub fn to_float(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// Resolve a member/index key on this value.
    ///
    /// Mappings resolve by key, objects through [`PropAccess`], lists by
    /// integer index plus `length`, strings support `length` (in bytes).
    pub fn get_key(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(key).cloned(),
            Value::Object(obj) => obj.get_prop(key),
            Value::List(items) => {
                if key == "length" {
                    return Some(Value::Int(items.len() as i64));
                }
                let index: usize = key.parse().ok()?;
                items.get(index).cloned()
            }
            Value::Str(s) => {
                if key == "length" {
                    Some(Value::Int(s.len() as i64))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Walk a dotted/indexed key path. Returns the resolved value and
    /// whether the first segment existed at all; a present root with a
    /// missing tail resolves to null without falling through.
    pub fn lookup_path(&self, keys: &[&str]) -> (Value, bool) {
        let Some((first, rest)) = keys.split_first() else {
            return (self.clone(), true);
        };
        match self.get_key(first) {
            Some(v) => {
                let (out, _) = v.lookup_path(rest);
                (out, true)
            }
            None => {
                // `length` and list indexing report existence the same way
                // as map keys: only a hit counts.
                (Value::Null, false)
            }
        }
    }

    /// Render this value as output text, without HTML escaping.
    ///
    /// Strings pass through, integers and floats print their shortest
    /// decimal form, and everything else serialises as JSON. Detached
    /// mappings and callables collapse to the empty string.
    pub fn render_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Map(map) if map.is_detached() => String::new(),
            Value::Func(_) | Value::Object(_) => String::new(),
            other => serde_json::to_string(&other.to_json()).unwrap_or_default(),
        }
    }

    /// Convert to a serde_json value. Callables, opaque objects and
    /// detached mappings serialise as null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => {
                if map.is_detached() {
                    return serde_json::Value::Null;
                }
                serde_json::Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                )
            }
            Value::Func(_) | Value::Object(_) => serde_json::Value::Null,
        }
    }

    /// Convert from a serde_json value.
    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::list(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v))),
            ),
        }
    }
}

impl serde::Serialize for Value {
    /// Serialise through the JSON mapping: callables, opaque objects and
    /// detached mappings become null.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl PartialEq for Value {
    /// Structural equality. Integers and floats compare within one numeric
    /// domain; there is no string↔number coercion. Callables and opaque
    /// objects compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Addition with the template dialect's semantics: numeric when both sides
/// are numbers, string concatenation of coerced operands otherwise.
pub fn add(a: &Value, b: &Value) -> Value {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return match x.checked_add(*y) {
            Some(n) => Value::Int(n),
            None => Value::Float(*x as f64 + *y as f64),
        };
    }
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Value::Float(x + y),
        _ => Value::Str(a.render_string() + &b.render_string()),
    }
}

/// Less-than: numeric when both sides are numbers, else lexicographic on
/// the string rendering.
pub fn less(a: &Value, b: &Value) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x < y,
        _ => a.render_string() < b.render_string(),
    }
}

/// Greater-than counterpart of [`less`].
pub fn greater(a: &Value, b: &Value) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x > y,
        _ => a.render_string() > b.render_string(),
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Str("".into()).truthy());
        assert!(!Value::Str("false".into()).truthy());
        assert!(!Value::Str("0".into()).truthy());
        assert!(Value::Str("no".into()).truthy());
        assert!(Value::list(vec![]).truthy());
        assert!(Value::map(Vec::<(String, Value)>::new()).truthy());
    }

    #[test]
    fn test_add() {
        assert_eq!(add(&Value::Int(1), &Value::Int(1)), Value::Int(2));
        assert_eq!(add(&Value::Int(1), &Value::Float(0.5)), Value::Float(1.5));
        assert_eq!(
            add(&Value::Str("c".into()), &Value::Str("uuu".into())),
            Value::Str("cuuu".into())
        );
        assert_eq!(
            add(&Value::Str("v".into()), &Value::Int(2)),
            Value::Str("v2".into())
        );
    }

    #[test]
    fn test_numeric_equality_across_variants() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Str("1".into()));
    }

    #[test]
    fn test_get_key() {
        let map = Value::map(vec![("a", Value::Int(1))]);
        assert_eq!(map.get_key("a"), Some(Value::Int(1)));
        assert_eq!(map.get_key("b"), None);

        let list = Value::list(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(list.get_key("length"), Some(Value::Int(2)));
        assert_eq!(list.get_key("1"), Some(Value::Int(20)));
        assert_eq!(list.get_key("5"), None);

        let s = Value::Str("héllo".into());
        assert_eq!(s.get_key("length"), Some(Value::Int(6)));
    }

    #[test]
    fn test_lookup_path_halts_on_existing_root() {
        let inner = Value::map(vec![("a", Value::Int(1))]);
        let outer = Value::map(vec![("info", inner)]);
        let (v, root) = outer.lookup_path(&["info", "a"]);
        assert_eq!(v, Value::Int(1));
        assert!(root);
        let (v, root) = outer.lookup_path(&["info", "missing", "deep"]);
        assert_eq!(v, Value::Null);
        assert!(root);
        let (_, root) = outer.lookup_path(&["other"]);
        assert!(!root);
    }

    #[test]
    fn test_render_string() {
        assert_eq!(Value::Str("x".into()).render_string(), "x");
        assert_eq!(Value::Int(42).render_string(), "42");
        assert_eq!(Value::Float(1.5).render_string(), "1.5");
        assert_eq!(Value::Float(2.0).render_string(), "2");
        assert_eq!(Value::Null.render_string(), "null");
        assert_eq!(Value::Bool(true).render_string(), "true");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::Int(2)]).render_string(),
            "[1,2]"
        );
    }

    #[test]
    fn test_detached_map_renders_empty() {
        let detached = Value::Map(Arc::new(MapValue::new_detached(
            [("a".to_string(), Value::Int(1))].into_iter().collect(),
        )));
        assert_eq!(detached.render_string(), "");
    }

    #[test]
    fn test_serialize_impl() {
        let value = Value::map(vec![("a", Value::Int(1)), ("f", Value::func(|_, _| Value::Null))]);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"a":1,"f":null}"#
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"n": 1, "f": 1.5, "s": "x", "l": [true, null]}"#).unwrap();
        let value = Value::from_json(json);
        assert_eq!(value.get_key("n"), Some(Value::Int(1)));
        assert_eq!(value.get_key("f"), Some(Value::Float(1.5)));
        let list = value.get_key("l").unwrap();
        assert_eq!(list.get_key("0"), Some(Value::Bool(true)));
        assert_eq!(list.get_key("1"), Some(Value::Null));
    }
}
