//! Reactive Wrappers
//!
//! A `Proxy` stands in for a raw `Object`. Reads through it are tracked and
//! writes through it notify dependents. There are four variants:
//!
//! | kind              | tracks reads | accepts writes | wraps nested objects |
//! |-------------------|--------------|----------------|----------------------|
//! | `Reactive`        | yes          | yes            | yes, as `Reactive`   |
//! | `Readonly`        | no           | no             | yes, as `Readonly`   |
//! | `ShallowReactive` | yes          | yes            | no                   |
//! | `ShallowReadonly` | no           | no             | no                   |
//!
//! Nested objects are wrapped lazily, when they are read, never up front.
//!
//! # Readonly Views
//!
//! A readonly wrapper built from a mutable wrapper is a view of it: reads go
//! through the mutable wrapper, so they are tracked, and deep views hand out
//! readonly views of the nested mutable wrappers. Writes are still refused.
//! Passing a readonly wrapper to any constructor returns it unchanged.
//!
//! # Identity
//!
//! Each runtime keeps one cache per variant mapping a raw object (and, for
//! views, the kind of wrapper they read through) to its wrapper. Wrapping the
//! same object twice the same way returns the same `Proxy` for as long as any
//! handle to it is alive. The caches hold weak references only, so they never
//! extend the life of a wrapper or of its object.

use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::data::{Object, ObjectId, Value};
use crate::error::{Error, Result};

use super::{Runtime, WeakRuntime};

/// Never sweep caches smaller than this.
const MIN_CACHE_SWEEP: usize = 64;

/// The four wrapper variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Reactive,
    Readonly,
    ShallowReactive,
    ShallowReadonly,
}

impl ProxyKind {
    pub(crate) const COUNT: usize = 4;

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn is_readonly(self) -> bool {
        matches!(self, ProxyKind::Readonly | ProxyKind::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, ProxyKind::ShallowReactive | ProxyKind::ShallowReadonly)
    }
}

/// Reserved introspection keys.
///
/// Reading one of these through a proxy answers from the wrapper itself and
/// never touches the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactiveFlag {
    /// `true` for mutable wrappers.
    IsReactive,
    /// `true` for readonly wrappers.
    IsReadonly,
    /// The raw target object.
    Raw,
}

impl ReactiveFlag {
    pub const fn key(self) -> &'static str {
        match self {
            ReactiveFlag::IsReactive => "__v_isReactive",
            ReactiveFlag::IsReadonly => "__v_isReadonly",
            ReactiveFlag::Raw => "__v_raw",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "__v_isReactive" => Some(ReactiveFlag::IsReactive),
            "__v_isReadonly" => Some(ReactiveFlag::IsReadonly),
            "__v_raw" => Some(ReactiveFlag::Raw),
            _ => None,
        }
    }
}

/// What a wrapper constructor was given.
#[derive(Debug, Clone)]
pub enum Target {
    Raw(Object),
    Wrapped(Proxy),
}

/// Anything that can be wrapped: a raw object or a proxy.
pub trait IntoTarget {
    fn into_target(self) -> Target;
}

impl IntoTarget for Object {
    fn into_target(self) -> Target {
        Target::Raw(self)
    }
}

impl IntoTarget for &Object {
    fn into_target(self) -> Target {
        Target::Raw(self.clone())
    }
}

impl IntoTarget for Proxy {
    fn into_target(self) -> Target {
        Target::Wrapped(self)
    }
}

impl IntoTarget for &Proxy {
    fn into_target(self) -> Target {
        Target::Wrapped(self.clone())
    }
}

pub(crate) struct ProxyInner {
    /// Always the raw object, also for views.
    target: Object,
    kind: ProxyKind,
    /// The mutable wrapper a readonly view reads through.
    source: Option<Proxy>,
    runtime: WeakRuntime,
}

/// A tracked wrapper around an `Object`.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trellis_core::{Runtime, Value};
///
/// let runtime = Runtime::new();
/// let raw = Value::from(json!({ "details": { "name": "" } }));
/// let product = runtime.reactive(raw.as_object().unwrap());
///
/// // Nested objects come back wrapped, and always as the same wrapper.
/// let details = product.get("details");
/// assert!(trellis_core::is_reactive(&details));
/// assert_eq!(details, product.get("details"));
/// ```
#[derive(Clone)]
pub struct Proxy {
    inner: Rc<ProxyInner>,
}

impl Proxy {
    fn new(target: Object, kind: ProxyKind, source: Option<Proxy>, runtime: WeakRuntime) -> Self {
        Self {
            inner: Rc::new(ProxyInner {
                target,
                kind,
                source,
                runtime,
            }),
        }
    }

    pub fn kind(&self) -> ProxyKind {
        self.inner.kind
    }

    /// The wrapped object.
    pub fn raw(&self) -> Object {
        self.inner.target.clone()
    }

    /// The runtime this wrapper reports to, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade()
    }

    pub fn is_reactive(&self) -> bool {
        !self.inner.kind.is_readonly()
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.kind.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.kind.is_shallow()
    }

    /// Whether two handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn reads_through(&self, source: Option<&Proxy>) -> bool {
        match (&self.inner.source, source) {
            (None, None) => true,
            (Some(own), Some(other)) => own.ptr_eq(other),
            _ => false,
        }
    }

    /// Answer an introspection query.
    pub fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::IsReactive => Value::Bool(self.is_reactive()),
            ReactiveFlag::IsReadonly => Value::Bool(self.is_readonly()),
            ReactiveFlag::Raw => Value::Object(self.raw()),
        }
    }

    /// Read a property.
    ///
    /// Mutable wrappers, and readonly views of them, track the read. Deep
    /// wrappers return nested objects wrapped with their own variant.
    pub fn get(&self, key: &str) -> Value {
        if let Some(flag) = ReactiveFlag::from_key(key) {
            return self.flag(flag);
        }

        let ProxyInner {
            target,
            kind,
            source,
            runtime,
        } = &*self.inner;

        let value = match source {
            Some(source) => source.get(key),
            None => {
                if !kind.is_readonly() {
                    if let Some(runtime) = runtime.upgrade() {
                        runtime.track(target, key);
                    }
                }
                target.get(key)
            }
        };
        if kind.is_shallow() {
            return value;
        }
        match value {
            Value::Object(nested) => Value::Proxy(self.wrap_nested(nested, None)),
            Value::Proxy(nested) if kind.is_readonly() && !nested.is_readonly() => {
                Value::Proxy(self.wrap_nested(nested.raw(), Some(nested)))
            }
            other => other,
        }
    }

    fn wrap_nested(&self, target: Object, source: Option<Proxy>) -> Proxy {
        let kind = self.inner.kind;
        match self.inner.runtime.upgrade() {
            Some(runtime) => runtime.cached_wrapper(target, kind, source),
            // Nothing left to cache in; the wrapper still refuses writes.
            None => Proxy::new(target, kind, source, self.inner.runtime.clone()),
        }
    }

    /// Write a property.
    ///
    /// Mutable wrappers store the value if it differs from the current one
    /// and then notify dependents. Readonly wrappers drop the write and log a
    /// warning. Either way the write reports success.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        if self.is_readonly() {
            self.warn_readonly(key);
            return true;
        }
        self.write(key, value.into());
        true
    }

    /// Like `set`, but a readonly wrapper returns an error instead of
    /// swallowing the write.
    pub fn try_set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.is_readonly() {
            return Err(Error::ReadonlyWrite {
                key: key.to_owned(),
            });
        }
        self.write(key, value.into());
        Ok(())
    }

    /// Delete a property, notifying dependents if it existed.
    pub fn remove(&self, key: &str) -> bool {
        if self.is_readonly() {
            self.warn_readonly(key);
            return true;
        }
        if self.inner.target.remove(key).is_some() {
            self.notify(key);
        }
        true
    }

    fn write(&self, key: &str, value: Value) {
        let value = value.into_raw();
        let target = &self.inner.target;
        if target.get(key) == value {
            return;
        }
        target.set(key, value);
        // Mutate first so dependents re-running now see the new value.
        self.notify(key);
    }

    fn notify(&self, key: &str) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.trigger(&self.inner.target, key);
        }
    }

    fn warn_readonly(&self, key: &str) {
        let enabled = self
            .inner
            .runtime
            .upgrade()
            .map_or(true, |runtime| runtime.config().warns_on_readonly_write());
        if enabled {
            warn!(
                key,
                kind = ?self.inner.kind,
                "set operation on a readonly target is not allowed; use `reactive` instead"
            );
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &self.inner.kind)
            .field("target", &self.inner.target.id())
            .field("source", &self.inner.source.as_ref().map(Proxy::kind))
            .finish()
    }
}

/// Raw object, plus the kind of wrapper a view reads through.
type CacheKey = (ObjectId, Option<ProxyKind>);

/// `raw object → wrapper` for one variant.
#[derive(Default)]
pub(crate) struct WrapperCache {
    entries: HashMap<CacheKey, Weak<ProxyInner>>,
    sweep_at: usize,
}

impl WrapperCache {
    fn get(&self, key: CacheKey) -> Option<Proxy> {
        self.entries
            .get(&key)
            .and_then(Weak::upgrade)
            .map(|inner| Proxy { inner })
    }

    fn insert(&mut self, key: CacheKey, proxy: &Proxy) {
        if self.entries.len() >= self.sweep_at.max(MIN_CACHE_SWEEP) {
            self.entries.retain(|_, weak| weak.strong_count() > 0);
            self.sweep_at = self.entries.len() * 2;
        }
        self.entries.insert(key, Rc::downgrade(&proxy.inner));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.sweep_at = 0;
    }
}

impl Runtime {
    /// Deep, mutable, tracked wrapper.
    pub fn reactive(&self, target: impl IntoTarget) -> Proxy {
        self.wrap_target(target.into_target(), ProxyKind::Reactive)
    }

    /// Deep, read-only wrapper. Writes are dropped with a warning.
    pub fn readonly(&self, target: impl IntoTarget) -> Proxy {
        self.wrap_target(target.into_target(), ProxyKind::Readonly)
    }

    /// Mutable, tracked wrapper whose nested objects come back raw.
    pub fn shallow_reactive(&self, target: impl IntoTarget) -> Proxy {
        self.wrap_target(target.into_target(), ProxyKind::ShallowReactive)
    }

    /// Read-only wrapper whose nested objects come back unwrapped.
    pub fn shallow_readonly(&self, target: impl IntoTarget) -> Proxy {
        self.wrap_target(target.into_target(), ProxyKind::ShallowReadonly)
    }

    fn wrap_target(&self, target: Target, kind: ProxyKind) -> Proxy {
        match target {
            Target::Raw(object) => self.wrap(object, kind),
            Target::Wrapped(proxy) if proxy.is_readonly() => proxy,
            Target::Wrapped(proxy) if kind.is_readonly() => {
                self.cached_wrapper(proxy.raw(), kind, Some(proxy))
            }
            Target::Wrapped(proxy) => self.wrap(proxy.raw(), kind),
        }
    }

    /// Get the cached wrapper of a raw `target` for `kind`, creating it if
    /// needed.
    pub fn wrap(&self, target: Object, kind: ProxyKind) -> Proxy {
        self.cached_wrapper(target, kind, None)
    }

    fn cached_wrapper(&self, target: Object, kind: ProxyKind, source: Option<Proxy>) -> Proxy {
        let key = (target.id(), source.as_ref().map(Proxy::kind));
        let cache = self.wrapper_cache(kind);
        let cached = cache.borrow().get(key);
        if let Some(proxy) = cached.filter(|proxy| proxy.reads_through(source.as_ref())) {
            return proxy;
        }

        let proxy = Proxy::new(target, kind, source, self.downgrade());
        cache.borrow_mut().insert(key, &proxy);
        proxy
    }

    /// Number of cache entries for one variant, dead ones included until the
    /// next sweep.
    pub fn cached_wrapper_count(&self, kind: ProxyKind) -> usize {
        self.wrapper_cache(kind).borrow().len()
    }
}

/// Deep, mutable, tracked wrapper on the default runtime.
pub fn reactive(target: impl IntoTarget) -> Proxy {
    Runtime::current().reactive(target)
}

/// Deep, read-only wrapper on the default runtime.
pub fn readonly(target: impl IntoTarget) -> Proxy {
    Runtime::current().readonly(target)
}

/// Shallow, mutable wrapper on the default runtime.
pub fn shallow_reactive(target: impl IntoTarget) -> Proxy {
    Runtime::current().shallow_reactive(target)
}

/// Shallow, read-only wrapper on the default runtime.
pub fn shallow_readonly(target: impl IntoTarget) -> Proxy {
    Runtime::current().shallow_readonly(target)
}

/// The raw object behind a wrapper; any other value is returned unchanged.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => proxy.flag(ReactiveFlag::Raw),
        other => other.clone(),
    }
}

pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_reactive())
}

pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.is_readonly())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture(json: serde_json::Value) -> Object {
        Object::try_from(Value::from(json)).unwrap()
    }

    #[test]
    fn same_target_same_wrapper_per_kind() {
        let runtime = Runtime::new();
        let target = fixture(json!({ "a": 1, "b": 2 }));

        for kind in [
            ProxyKind::Reactive,
            ProxyKind::Readonly,
            ProxyKind::ShallowReactive,
            ProxyKind::ShallowReadonly,
        ] {
            let first = runtime.wrap(target.clone(), kind);
            let second = runtime.wrap(target.clone(), kind);
            assert!(first.ptr_eq(&second), "{kind:?} wrapper not cached");
        }

        assert!(!runtime.reactive(&target).ptr_eq(&runtime.readonly(&target)));
    }

    #[test]
    fn dropped_wrapper_is_recreated() {
        let runtime = Runtime::new();
        let target = Object::new();

        let proxy = runtime.reactive(&target);
        assert_eq!(runtime.cached_wrapper_count(ProxyKind::Reactive), 1);
        drop(proxy);

        let again = runtime.reactive(&target);
        assert!(again.raw().ptr_eq(&target));
    }

    #[test]
    fn flags_answer_without_tracking() {
        let runtime = Runtime::new();
        let target = fixture(json!({ "a": 1 }));
        let proxy = runtime.reactive(&target);
        let frozen = runtime.readonly(&target);

        let effect = runtime.effect({
            let proxy = proxy.clone();
            move || {
                proxy.get(ReactiveFlag::IsReactive.key());
                proxy.get(ReactiveFlag::Raw.key());
            }
        });

        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(proxy.get("__v_isReactive"), Value::Bool(true));
        assert_eq!(proxy.get("__v_isReadonly"), Value::Bool(false));
        assert_eq!(frozen.get("__v_isReactive"), Value::Bool(false));
        assert_eq!(frozen.get("__v_isReadonly"), Value::Bool(true));
        assert_eq!(proxy.get("__v_raw"), Value::Object(target));
    }

    #[test]
    fn flag_keys_round_trip() {
        for flag in [ReactiveFlag::IsReactive, ReactiveFlag::IsReadonly, ReactiveFlag::Raw] {
            assert_eq!(ReactiveFlag::from_key(flag.key()), Some(flag));
        }
        assert_eq!(ReactiveFlag::from_key("price"), None);
    }

    #[test]
    fn deep_wrappers_wrap_nested_objects_lazily() {
        let runtime = Runtime::new();
        let target = fixture(json!({ "details": { "name": "" } }));
        let proxy = runtime.reactive(&target);

        assert_eq!(runtime.cached_wrapper_count(ProxyKind::Reactive), 1);
        let details = proxy.get("details");
        assert!(is_reactive(&details));
        assert_eq!(runtime.cached_wrapper_count(ProxyKind::Reactive), 2);
        assert_eq!(details, proxy.get("details"));

        let frozen = runtime.readonly(&target).get("details");
        assert!(is_readonly(&frozen));
    }

    #[test]
    fn shallow_wrappers_return_raw_nested_objects() {
        let runtime = Runtime::new();
        let target = fixture(json!({ "details": { "name": "abc" } }));
        let raw_details = target.get("details");

        let proxy = runtime.shallow_reactive(&target);
        assert_eq!(proxy.get("details"), raw_details);
        assert!(!is_proxy(&proxy.get("details")));

        let frozen = runtime.shallow_readonly(&target);
        assert_eq!(frozen.get("details"), raw_details);
    }

    #[test]
    fn writes_store_raw_values() {
        let runtime = Runtime::new();
        let proxy = runtime.reactive(Object::new());
        let nested = Object::new();

        proxy.set("child", runtime.reactive(&nested));
        assert_eq!(proxy.raw().get("child"), Value::Object(nested));
    }

    #[test]
    fn readonly_writes_are_swallowed() {
        let runtime = Runtime::with_config(crate::Config::default().warn_on_readonly_write(false));
        let target = fixture(json!({ "count": 7 }));
        let frozen = runtime.readonly(&target);

        assert!(frozen.set("count", 8));
        assert!(frozen.remove("count"));
        assert_eq!(target.get("count"), Value::Int(7));
        assert_eq!(
            frozen.try_set("count", 9),
            Err(Error::ReadonlyWrite {
                key: "count".into()
            })
        );
    }

    #[test]
    fn readonly_of_mutable_wrapper_is_a_tracked_view() {
        let runtime = Runtime::new();
        let target = fixture(json!({ "a": 1, "nested": { "b": 1 } }));
        let proxy = runtime.reactive(&target);

        let view = runtime.readonly(&proxy);
        assert!(view.raw().ptr_eq(&target));
        assert!(view.is_readonly());
        assert!(view.ptr_eq(&runtime.readonly(&proxy)));
        assert!(!view.ptr_eq(&runtime.readonly(&target)));

        let effect = runtime.effect({
            let view = view.clone();
            move || {
                view.get("a");
                view.get("nested").get("b");
            }
        });
        assert_eq!(effect.dependency_count(), 3);

        let nested = view.get("nested");
        assert!(is_readonly(&nested));
        assert_eq!(to_raw(&nested), target.get("nested"));
    }

    #[test]
    fn readonly_input_is_returned_unchanged() {
        let runtime = Runtime::new();
        let target = Object::new();
        let frozen = runtime.readonly(&target);

        assert!(runtime.readonly(&frozen).ptr_eq(&frozen));
        assert!(runtime.shallow_readonly(&frozen).ptr_eq(&frozen));
        assert!(runtime.reactive(&frozen).ptr_eq(&frozen));
    }

    #[test]
    fn mutable_wrappers_of_mutable_wrappers_rewrap_raw_target() {
        let runtime = Runtime::new();
        let target = Object::new();
        let proxy = runtime.reactive(&target);

        assert!(runtime.reactive(&proxy).ptr_eq(&proxy));
        assert!(runtime
            .shallow_reactive(&proxy)
            .ptr_eq(&runtime.shallow_reactive(&target)));
    }

    #[test]
    fn wrapper_outliving_runtime_is_plain_data() {
        let target = fixture(json!({ "a": 1, "nested": { "b": 1 } }));
        let (proxy, frozen) = {
            let runtime = Runtime::new();
            (runtime.reactive(&target), runtime.readonly(&target))
        };

        assert!(proxy.runtime().is_none());
        proxy.set("a", 2);
        assert_eq!(proxy.get("a"), Value::Int(2));
        assert!(is_reactive(&proxy.get("nested")));

        let nested = frozen.get("nested");
        assert!(is_readonly(&nested));
        nested.set("b", 5);
        assert_eq!(target.get("nested").get("b"), Value::Int(1));
    }

    #[test]
    fn to_raw_passes_through_non_proxies() {
        let target = Object::new();
        assert_eq!(to_raw(&Value::Int(3)), Value::Int(3));
        assert_eq!(to_raw(&Value::from(&target)), Value::from(&target));
    }
}
