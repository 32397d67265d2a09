//! Ref Implementation
//!
//! A Ref is a single tracked value: the standalone counterpart of one
//! property of a reactive object. It owns its own dependency set.
//!
//! 1. Reading `get()` while an effect is collecting subscribes that effect.
//!
//! 2. `set()` with a value equal to the current one does nothing. Otherwise
//!    the value is stored first and subscribers are notified after, so they
//!    observe the new value.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::data::Value;
use crate::graph::Dep;

use super::{Runtime, WeakRuntime};

struct RefInner<T> {
    value: RefCell<T>,
    dep: Rc<Dep>,
    runtime: WeakRuntime,
}

/// A reactive cell holding a value of type T.
///
/// Equality decides whether a write is a change. For `Value`, objects,
/// proxies and refs compare by identity.
///
/// # Example
///
/// ```rust
/// use trellis_core::{create_ref, is_ref, un_ref};
///
/// let count = create_ref(1);
/// count.set(2);
/// assert_eq!(count.get(), 2);
/// assert!(is_ref(&count));
/// assert_eq!(un_ref(&count), 2);
/// ```
pub struct Ref<T> {
    inner: Rc<RefInner<T>>,
}

impl<T> Ref<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new ref with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(RefInner {
                value: RefCell::new(value),
                dep: Dep::standalone(),
                runtime: runtime.downgrade(),
            }),
        }
    }

    /// Get the current value, subscribing the running effect if any.
    pub fn get(&self) -> T {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track_dep(&self.inner.dep);
        }
        self.get_untracked()
    }

    /// Get the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.trigger_dep(&self.inner.dep);
        }
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let current = self.inner.value.borrow();
            f(&current)
        };
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.len()
    }
}

impl<T> Ref<T> {
    /// Whether two handles are the same cell.
    pub fn ptr_eq(&self, other: &Ref<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Ref<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.inner.dep.len())
            .finish()
    }
}

/// Something that may or may not be a ref.
pub trait MaybeRef {
    type Target;

    fn is_ref(&self) -> bool;

    /// The ref's value (tracked), or the value itself.
    fn un_ref(&self) -> Self::Target;
}

impl<T> MaybeRef for Ref<T>
where
    T: Clone + PartialEq + 'static,
{
    type Target = T;

    fn is_ref(&self) -> bool {
        true
    }

    fn un_ref(&self) -> T {
        self.get()
    }
}

impl MaybeRef for Value {
    type Target = Value;

    fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    fn un_ref(&self) -> Value {
        match self {
            Value::Ref(cell) => cell.get(),
            other => other.clone(),
        }
    }
}

pub fn is_ref<R: MaybeRef + ?Sized>(value: &R) -> bool {
    value.is_ref()
}

pub fn un_ref<R: MaybeRef + ?Sized>(value: &R) -> R::Target {
    value.un_ref()
}

impl Runtime {
    /// Create a ref owned by this runtime.
    pub fn create_ref<T>(&self, value: T) -> Ref<T>
    where
        T: Clone + PartialEq + 'static,
    {
        Ref::new(self, value)
    }
}

/// Create a ref on the default runtime.
pub fn create_ref<T>(value: T) -> Ref<T>
where
    T: Clone + PartialEq + 'static,
{
    Runtime::current().create_ref(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
