//! Props values.
//!
//! Derived props are dynamic records: a [`Props`] is an ordered map from
//! property names to [`Value`]s, shared behind an `Arc`. Two notions of
//! equality matter here:
//!
//! - [`Value::identical`] is the cheap identity test used by the shallow
//!   comparisons. Scalars and strings compare by value; lists, records,
//!   callbacks and opaque handles compare by pointer.
//! - `PartialEq` is deep structural equality, handy in tests and assertions.
//!
//! A [`Props`] handle keeps its identity until it is mutated, so consumers
//! can tell "nothing changed" apart from "recomputed to equal content" with
//! [`Props::ptr_eq`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A single prop value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Record(Props),
    Callback(Callback),
    /// Arbitrary shared payload, compared by pointer.
    Opaque(Opaque),
}

impl Value {
    /// Wrap a closure as a callback value.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Value::Callback(Callback::new(f))
    }

    /// Wrap any shared payload as an opaque value.
    pub fn opaque<T: Any + Send + Sync>(payload: T) -> Self {
        Value::Opaque(Opaque::new(payload))
    }

    /// Identity comparison used by shallow equality.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Short type name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Callback(_) => "callback",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn as_record(&self) -> Option<&Props> {
        match self {
            Value::Record(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    /// Borrow an opaque payload as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(opaque) => opaque.downcast_ref(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => self.identical(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Record(props) => fmt::Debug::fmt(props, f),
            Value::Callback(_) => f.write_str("<callback>"),
            Value::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Props> for Value {
    fn from(props: Props) -> Self {
        Value::Record(props)
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Value::Callback(cb)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::List(Arc::new(items.into_iter().map(Value::from).collect())),
            Json::Object(map) => Value::Record(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Shared callback, typically an action dispatcher.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&[Value]) + Send + Sync>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) {
        (self.0)(args);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared type-erased payload.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An ordered, shared record of props.
#[derive(Clone, Default)]
pub struct Props(Arc<IndexMap<Arc<str>, Value>>);

impl Props {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object.
    ///
    /// Anything other than an object is rejected, since props must be a
    /// record.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Value::from(json) {
            Value::Record(props) => Ok(props),
            other => Err(Error::NotARecord {
                method: "Props::from_json",
                display_name: String::from("<json>"),
                found: other.kind(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (&**key, value))
    }

    /// Insert or overwrite a prop. Forks the record if it is shared.
    pub fn insert(&mut self, key: impl Into<Arc<str>>, value: impl Into<Value>) {
        Arc::make_mut(&mut self.0).insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Copy every entry of `other` over this record, later keys winning.
    pub fn extend_from(&mut self, other: &Props) {
        if other.is_empty() {
            return;
        }
        let map = Arc::make_mut(&mut self.0);
        for (key, value) in other.0.iter() {
            map.insert(Arc::clone(key), value.clone());
        }
    }

    /// Whether both handles share the same record.
    pub fn ptr_eq(&self, other: &Props) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.len() == other.len()
                && self
                    .0
                    .iter()
                    .all(|(key, value)| other.0.get(key).is_some_and(|o| o == value)))
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Props
where
    K: Into<Arc<str>>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(Arc::new(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Props
where
    K: Into<Arc<str>>,
    V: Into<Value>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Same keys, and every value [`identical`](Value::identical).
pub fn shallow_equal(a: &Props, b: &Props) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    a.len() == b.len()
        && a
            .0
            .iter()
            .all(|(key, value)| b.0.get(key).is_some_and(|other| value.identical(other)))
}

/// [`shallow_equal`] for records, [`Value::identical`] for anything else.
pub fn shallow_equal_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Record(a), Value::Record(b)) => shallow_equal(a, b),
        _ => a.identical(b),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
