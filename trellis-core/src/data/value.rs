//! Values
//!
//! `Value` is what object properties hold. Scalars compare by value; objects,
//! proxies and refs compare by identity, so writing the same object back into
//! a property is a no-op while writing an equal-looking copy is a change.

use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::reactive::{Proxy, Ref};

use super::Object;

/// A dynamically typed property value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A raw, untracked object.
    Object(Object),
    /// A tracked wrapper around an object.
    Proxy(Proxy),
    /// A standalone reactive cell.
    Ref(Ref<Value>),
}

impl Value {
    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Proxy(_) => "proxy",
            Value::Ref(_) => "ref",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value is an object, wrapped or not.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The raw object, if this is a plain object.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    /// Strip a proxy down to its raw target. Other values are returned as is.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Proxy(proxy) => Value::Object(proxy.raw()),
            other => other,
        }
    }

    /// Property read on whatever this value is.
    ///
    /// Proxies go through their tracked accessor, raw objects are read
    /// directly, and anything else has no properties and reads as `Null`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Proxy(proxy) => proxy.get(key),
            Value::Object(object) => object.get(key),
            _ => Value::Null,
        }
    }

    /// Property write on whatever this value is.
    ///
    /// Returns `false` only when the value cannot hold properties.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        match self {
            Value::Proxy(proxy) => proxy.set(key, value),
            Value::Object(object) => {
                object.set(key, value);
                true
            }
            _ => false,
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                int_eq_float(*a, *b)
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Exact mixed comparison. Casting the int to f64 would round above 2^53.
fn int_eq_float(int: i64, float: f64) -> bool {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63

    float.fract() == 0.0 && (-LIMIT..LIMIT).contains(&float) && float as i64 == int
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(o) => write!(f, "Object(#{})", o.id().raw()),
            Value::Proxy(p) => write!(f, "Proxy({:?}, #{})", p.kind(), p.raw().id().raw()),
            Value::Ref(r) => f.debug_tuple("Ref").field(&r.get_untracked()).finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<&Object> for Value {
    fn from(o: &Object) -> Self {
        Value::Object(o.clone())
    }
}

impl From<Proxy> for Value {
    fn from(p: Proxy) -> Self {
        Value::Proxy(p)
    }
}

impl From<Ref<Value>> for Value {
    fn from(r: Ref<Value>) -> Self {
        Value::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Build nested fixtures from JSON.
///
/// JSON arrays become objects keyed by index with a trailing `length`
/// property. Numbers that fit `i64` become `Int`, the rest `Float`.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                let object = Object::new();
                let len = items.len() as i64;
                for (index, item) in items.into_iter().enumerate() {
                    object.set(index.to_string(), Value::from(item));
                }
                object.set("length", len);
                Value::Object(object)
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Value::from(item)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| value.mismatch("bool"))
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| value.mismatch("int"))
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| value.mismatch("float"))
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(other.mismatch("string")),
        }
    }
}

impl TryFrom<Value> for Object {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(o) => Ok(o),
            Value::Proxy(p) => Ok(p.raw()),
            other => Err(other.mismatch("object")),
        }
    }
}
