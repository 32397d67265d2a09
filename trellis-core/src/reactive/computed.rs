//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when read
//! after one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. Nothing runs at construction. The getter runs on the first `get()`.
//!
//! 2. The getter runs inside an effect, so its reads subscribe that effect.
//!
//! 3. When a dependency changes, the effect does not recompute. Its
//!    scheduler marks the value dirty and, on the clean → dirty transition
//!    only, notifies whoever read the computed value. Several upstream writes
//!    between two reads therefore reach downstream subscribers once.
//!
//! 4. The next `get()` sees the dirty flag, re-runs the getter and caches the
//!    result. Reads with a clean flag return the cache.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::graph::Dep;

use super::effect::Effect;
use super::{Runtime, WeakRuntime};

struct ComputedInner<T> {
    effect: Effect<T>,

    /// The cached value (None until first read).
    value: RefCell<Option<T>>,

    dirty: Rc<Cell<bool>>,

    /// Subscribers that read this computed value.
    dep: Rc<Dep>,

    runtime: WeakRuntime,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        // Nothing can read us anymore.
        self.effect.stop();
    }
}

/// A read-only, lazily recomputed derived value.
///
/// # Example
///
/// ```rust
/// use trellis_core::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_ref(1);
/// let double = runtime.computed({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// count.set(2);
/// assert_eq!(double.get(), 4);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + 'static,
{
    /// Create a computed value. The getter is not called until the first read.
    pub fn new<F>(runtime: &Runtime, getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let dirty = Rc::new(Cell::new(true));
        let dep = Dep::standalone();

        let effect = Effect::with_runtime_scheduler(runtime, getter, {
            let dirty = Rc::clone(&dirty);
            let dep = Rc::clone(&dep);
            move |runtime: &Runtime| {
                if !dirty.replace(true) {
                    runtime.trigger_dep(&dep);
                }
            }
        });

        Self {
            inner: Rc::new(ComputedInner {
                effect,
                value: RefCell::new(None),
                dirty,
                dep,
                runtime: runtime.downgrade(),
            }),
        }
    }

    /// Get the value, recomputing it if a dependency changed since the last
    /// read.
    pub fn get(&self) -> T {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track_dep(&self.inner.dep);
        }

        let cached = if self.inner.dirty.get() {
            None
        } else {
            self.inner.value.borrow().clone()
        };
        match cached {
            Some(value) => value,
            None => self.recompute(),
        }
    }

    fn recompute(&self) -> T {
        // Clear first: a dependency changing while the getter runs must mark
        // us dirty again.
        self.inner.dirty.set(false);
        let value = self.inner.effect.run();
        *self.inner.value.borrow_mut() = Some(value.clone());
        value
    }

    /// Whether the next read will call the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Whether the getter has run at least once.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dep.len()
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.inner.value.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("subscriber_count", &self.inner.dep.len())
            .finish()
    }
}

impl Runtime {
    /// Create a computed value owned by this runtime.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        Computed::new(self, getter)
    }
}

/// Create a computed value on the default runtime.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Runtime::current().computed(getter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;

    fn counted<T: Clone + 'static>(
        runtime: &Runtime,
        getter: impl Fn() -> T + 'static,
    ) -> (Computed<T>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let computed = runtime.computed({
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                getter()
            }
        });
        (computed, calls)
    }

    #[test]
    fn computed_is_lazy() {
        let runtime = Runtime::new();
        let (computed, calls) = counted(&runtime, || 42);

        assert!(!computed.has_value());
        assert!(computed.is_dirty());
        assert_eq!(calls.get(), 0);

        assert_eq!(computed.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(!computed.is_dirty());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let runtime = Runtime::new();
        let (computed, calls) = counted(&runtime, || 42);

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn computed_recomputes_after_dependency_change() {
        let runtime = Runtime::new();
        let count = runtime.create_ref(1);
        let (double, calls) = counted(&runtime, {
            let count = count.clone();
            move || count.get() * 2
        });

        assert_eq!(double.get(), 2);
        count.set(5);
        assert!(double.is_dirty());
        assert_eq!(calls.get(), 1);

        assert_eq!(double.get(), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn downstream_is_notified_once_per_dirty_transition() {
        let runtime = Runtime::new();
        let count = runtime.create_ref(1);
        let double = runtime.computed({
            let count = count.clone();
            move || count.get() * 2
        });

        let notified = Rc::new(Cell::new(0));
        let watcher = Effect::with_scheduler(
            &runtime,
            {
                let double = double.clone();
                move || double.get()
            },
            {
                let notified = notified.clone();
                move || notified.set(notified.get() + 1)
            },
        );
        watcher.run();

        count.set(2);
        count.set(3);
        count.set(4);
        assert_eq!(notified.get(), 1);

        assert_eq!(watcher.run(), 8);
        count.set(5);
        assert_eq!(notified.get(), 2);
    }

    #[test]
    fn computed_chains_through_computed() {
        let runtime = Runtime::new();
        let count = runtime.create_ref(1);
        let double = runtime.computed({
            let count = count.clone();
            move || count.get() * 2
        });
        let four_times = runtime.computed({
            let double = double.clone();
            move || double.get() * 2
        });

        assert_eq!(four_times.get(), 4);
        count.set(10);
        assert_eq!(double.get(), 20);
        assert_eq!(four_times.get(), 40);
    }

    #[test]
    fn computed_outliving_runtime_still_computes() {
        let (computed, calls) = {
            let runtime = Runtime::new();
            counted(&runtime, || 7)
        };

        assert_eq!(computed.get(), 7);
        assert_eq!(computed.get(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn dropping_computed_releases_upstream() {
        let runtime = Runtime::new();
        let count = runtime.create_ref(1);
        let double = runtime.computed({
            let count = count.clone();
            move || count.get() * 2
        });

        double.get();
        assert_eq!(count.subscriber_count(), 1);

        drop(double);
        assert_eq!(count.subscriber_count(), 0);
    }
}
