//! Objects
//!
//! An `Object` is the Rust stand-in for a plain mutable data object: a
//! reference-counted, insertion-ordered property map with a stable identity.
//! Cloning an `Object` clones the handle, not the data.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::Value;

/// Property key.
pub type Key = Rc<str>;

/// Counter for generating unique object IDs.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of an object.
///
/// IDs are never reused, so a stale ID can never alias a newer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct ObjectInner {
    id: ObjectId,
    props: RefCell<IndexMap<Key, Value>>,
}

/// A plain data object.
///
/// # Example
///
/// ```rust
/// use trellis_core::{Object, Value};
///
/// let product: Object = [("price", 5), ("quantity", 3)].into_iter().collect();
/// assert_eq!(product.get("price"), Value::Int(5));
/// assert_eq!(product.get("missing"), Value::Null);
/// ```
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: ObjectId::next(),
                props: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Get the object's identity.
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Read a property. Missing properties read as `Value::Null`.
    pub fn get(&self, key: &str) -> Value {
        self.inner
            .props
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Check whether a property is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    /// Write a property, returning the previous value if there was one.
    ///
    /// Proxies are stored as their raw target, so raw data never contains
    /// wrappers.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        let value = value.into().into_raw();
        self.inner.props.borrow_mut().insert(key.into(), value)
    }

    /// Remove a property, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.props.borrow_mut().shift_remove(key)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.inner.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Property keys in insertion order.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    /// Check whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a non-owning handle to this object.
    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<Key>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (key, value) in iter {
            object.set(key, value);
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Nested objects print as `#id`, so cyclic data cannot recurse forever.
        write!(f, "Object#{} ", self.inner.id.0)?;
        f.debug_map()
            .entries(self.inner.props.borrow().iter())
            .finish()
    }
}

/// A non-owning handle to an object.
///
/// Side tables keyed by object identity hold these so that they never keep
/// their key object alive.
#[derive(Clone)]
pub struct WeakObject {
    id: ObjectId,
    inner: Weak<ObjectInner>,
}

impl WeakObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Whether the object is still alive.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<Object> {
        self.inner.upgrade().map(|inner| Object { inner })
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("id", &self.id.0)
            .field("alive", &self.is_alive())
            .finish()
    }
}
