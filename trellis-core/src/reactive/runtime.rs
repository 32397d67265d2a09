//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive objects,
//! refs, computed values and effects. It owns the dependency graph, the
//! wrapper caches and the tracking context.
//!
//! # How It Works
//!
//! 1. When an effect runs, it pushes itself onto the runtime's context stack.
//!
//! 2. When a tracked value is read, the runtime adds the subscriber on top of
//!    the stack to that value's dependency set (`track`).
//!
//! 3. When a tracked value is written, the runtime notifies a snapshot of its
//!    dependency set (`trigger`):
//!    a. Subscribers with a scheduler get the scheduler called
//!    b. Everything else re-runs its body synchronously
//!    c. Re-running re-tracks, which rebuilds the graph for that subscriber
//!
//! # Isolation
//!
//! A `Runtime` is a cheap handle. Every handle cloned from the same runtime
//! shares one graph; separate runtimes never see each other's dependencies.
//! The free functions at the crate root use a thread-local default runtime.
//!
//! # Lifetime
//!
//! Wrappers, refs, computed values and effects hold their runtime weakly.
//! The runtime owns the graph, and the graph owns the effects, so a strong
//! handle back would keep the whole graph alive forever. Once the last
//! `Runtime` handle is dropped, the graph goes with it; handles that outlive
//! it keep working as plain, untracked data holders.
//!
//! # Threading
//!
//! The runtime is single-threaded by construction: it is neither `Send` nor
//! `Sync`, so sharing reactive state across threads does not compile.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::config::Config;
use crate::data::Object;
use crate::graph::{Dep, TargetMap};

use super::context::{ContextGuard, ContextStack};
use super::proxy::{ProxyKind, WrapperCache};
use super::subscriber::{Subscriber, SubscriberId};

/// Never sweep registries smaller than this.
const MIN_REGISTRY_SWEEP: usize = 64;

thread_local! {
    static DEFAULT_RUNTIME: Runtime = Runtime::new();
}

struct RuntimeInner {
    config: Config,

    /// `target → key → subscribers`.
    targets: RefCell<TargetMap>,

    /// One identity cache per wrapper variant, indexed by `ProxyKind::index`.
    wrappers: [RefCell<WrapperCache>; ProxyKind::COUNT],

    context: ContextStack,

    // Every subscriber that has run tracked at least once.
    // Weak so that an effect nobody depends on can still be dropped.
    registry: RefCell<HashMap<SubscriberId, Weak<dyn Subscriber>>>,
    registry_sweep_at: Cell<usize>,
}

/// Handle to a reactive universe.
///
/// # Example
///
/// ```rust
/// use trellis_core::{Object, Runtime, Value};
///
/// let runtime = Runtime::new();
/// let product = runtime.reactive(
///     [("price", 5), ("quantity", 3), ("total", 0)].into_iter().collect::<Object>(),
/// );
///
/// let p = product.clone();
/// runtime.effect(move || {
///     let total = p.get("price").as_i64().unwrap_or(0) * p.get("quantity").as_i64().unwrap_or(0);
///     p.set("total", total);
/// });
///
/// product.set("price", 25);
/// assert_eq!(product.get("total"), Value::Int(75));
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create an isolated runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an isolated runtime.
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                targets: RefCell::new(TargetMap::new()),
                wrappers: Default::default(),
                context: ContextStack::default(),
                registry: RefCell::new(HashMap::new()),
                registry_sweep_at: Cell::new(MIN_REGISTRY_SWEEP),
            }),
        }
    }

    /// The thread-local default runtime used by the crate-level functions.
    pub fn current() -> Self {
        DEFAULT_RUNTIME.with(Runtime::clone)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Record that the current subscriber depends on `target[key]`.
    ///
    /// No-op when nothing is collecting or tracking is paused.
    pub fn track(&self, target: &Object, key: &str) {
        if !self.inner.context.is_tracking() {
            return;
        }
        let dep = self.inner.targets.borrow_mut().dep_or_insert(target, key);
        trace!(object = target.id().raw(), key, "track");
        self.track_dep(&dep);
    }

    /// Notify every subscriber that depends on `target[key]`.
    ///
    /// Targets or keys that were never tracked have no dependency set; that
    /// is a normal state and nothing happens.
    pub fn trigger(&self, target: &Object, key: &str) {
        let dep = self.inner.targets.borrow().get(target.id(), key);
        let Some(dep) = dep else {
            return;
        };
        trace!(object = target.id().raw(), key, subscribers = dep.len(), "trigger");
        self.trigger_dep(&dep);
    }

    /// Add the current subscriber to `dep`.
    pub(crate) fn track_dep(&self, dep: &Rc<Dep>) {
        let Some(subscriber) = self.inner.context.current() else {
            return;
        };
        if !subscriber.is_active() {
            return;
        }
        dep.insert(Rc::clone(&subscriber));
        subscriber.record_dep(dep);
    }

    /// Notify the members `dep` had when this call started.
    pub(crate) fn trigger_dep(&self, dep: &Dep) {
        for subscriber in dep.snapshot() {
            // Stopped by an earlier subscriber during this same trigger.
            if !subscriber.is_active() {
                continue;
            }
            subscriber.notify(self);
        }
    }

    /// Whether a read right now would be tracked.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_tracking()
    }

    /// The subscriber collecting dependencies right now.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current().map(|s| s.id())
    }

    /// Run `f` with dependency tracking paused.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = ContextGuard::enter(self, None);
        f()
    }

    pub(crate) fn context(&self) -> &ContextStack {
        &self.inner.context
    }

    pub(crate) fn wrapper_cache(&self, kind: ProxyKind) -> &RefCell<WrapperCache> {
        &self.inner.wrappers[kind.index()]
    }

    /// Register a subscriber so `teardown` can find it.
    pub(crate) fn register(&self, subscriber: &Rc<dyn Subscriber>) {
        let mut registry = self.inner.registry.borrow_mut();
        if registry.contains_key(&subscriber.id()) {
            return;
        }
        if registry.len() >= self.inner.registry_sweep_at.get() {
            registry.retain(|_, weak| weak.strong_count() > 0);
            self.inner
                .registry_sweep_at
                .set((registry.len() * 2).max(MIN_REGISTRY_SWEEP));
        }
        registry.insert(subscriber.id(), Rc::downgrade(subscriber));
    }

    pub(crate) fn unregister(&self, id: SubscriberId) {
        self.inner.registry.borrow_mut().remove(&id);
    }

    /// A subscriber just left `dep`.
    ///
    /// With `Config::prune_empty_deps`, an emptied property set is removed
    /// from the target map. If the map is busy (the subscriber is being
    /// dropped by a sweep), the set is left for the sweep to reclaim.
    pub(crate) fn release_dep(&self, dep: &Dep) {
        if !self.inner.config.prunes_empty_deps() || !dep.is_empty() {
            return;
        }
        let Some((target, key)) = dep.owner() else {
            return;
        };
        if let Ok(mut targets) = self.inner.targets.try_borrow_mut() {
            if targets.remove_if_empty(*target, key) {
                trace!(object = target.raw(), key = &**key, "pruned empty dep");
            }
        }
    }

    /// Number of live subscribers registered with this runtime.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .registry
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of targets that have a dependency record.
    pub fn target_count(&self) -> usize {
        self.inner.targets.borrow().len()
    }

    /// Number of properties of `target` that have a dependency set.
    pub fn tracked_key_count(&self, target: &Object) -> usize {
        self.inner.targets.borrow().key_count(target.id())
    }

    /// Whether `target[key]` has a dependency set (possibly empty).
    pub fn has_dep(&self, target: &Object, key: &str) -> bool {
        self.inner.targets.borrow().get(target.id(), key).is_some()
    }

    /// Number of subscribers depending on `target[key]`.
    pub fn dep_len(&self, target: &Object, key: &str) -> usize {
        self.inner
            .targets
            .borrow()
            .get(target.id(), key)
            .map(|dep| dep.len())
            .unwrap_or(0)
    }

    /// Stop every registered subscriber and forget all dependency records and
    /// cached wrappers.
    ///
    /// Wrappers, refs and effects created before teardown keep working as
    /// plain data holders; effects have to be re-run to subscribe again.
    pub fn teardown(&self) {
        let subscribers: Vec<Rc<dyn Subscriber>> = self
            .inner
            .registry
            .borrow_mut()
            .drain()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect();
        for subscriber in &subscribers {
            subscriber.stop(self);
        }

        let deps = self.inner.targets.borrow_mut().drain();
        for dep in &deps {
            dep.clear();
        }
        for cache in &self.inner.wrappers {
            cache.borrow_mut().clear();
        }
        debug!(
            stopped = subscribers.len(),
            deps = deps.len(),
            "runtime torn down"
        );
    }
}

/// Non-owning runtime handle.
#[derive(Clone)]
pub(crate) struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    /// The runtime, unless every `Runtime` handle has been dropped.
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("targets", &self.target_count())
            .field("subscribers", &self.subscriber_count())
            .field("context_depth", &self.inner.context.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::tests_support::MockSubscriber;

    #[test]
    fn runtime_registers_and_unregisters() {
        let runtime = Runtime::new();
        let subscriber = MockSubscriber::new();
        let id = subscriber.id();
        let erased: Rc<dyn Subscriber> = subscriber.clone();

        runtime.register(&erased);
        assert_eq!(runtime.subscriber_count(), 1);

        runtime.unregister(id);
        assert_eq!(runtime.subscriber_count(), 0);
    }

    #[test]
    fn registry_does_not_keep_subscribers_alive() {
        let runtime = Runtime::new();
        let erased: Rc<dyn Subscriber> = MockSubscriber::new();
        runtime.register(&erased);

        drop(erased);
        assert_eq!(runtime.subscriber_count(), 0);
    }

    #[test]
    fn track_outside_context_is_noop() {
        let runtime = Runtime::new();
        let target = Object::new();

        runtime.track(&target, "a");
        assert!(!runtime.has_dep(&target, "a"));
        assert_eq!(runtime.target_count(), 0);
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let runtime = Runtime::new();
        let target = Object::new();
        let first = MockSubscriber::new();
        let second = MockSubscriber::new();

        for subscriber in [first.clone(), second.clone()] {
            let _ctx = ContextGuard::enter(&runtime, Some(subscriber));
            runtime.track(&target, "a");
        }
        assert_eq!(runtime.dep_len(&target, "a"), 2);

        runtime.trigger(&target, "a");
        runtime.trigger(&target, "b");

        assert_eq!(first.notified.get(), 1);
        assert_eq!(second.notified.get(), 1);
    }

    #[test]
    fn trigger_on_unknown_target_is_noop() {
        let runtime = Runtime::new();
        runtime.trigger(&Object::new(), "a");
        assert_eq!(runtime.target_count(), 0);
    }

    #[test]
    fn stopped_subscribers_are_skipped() {
        let runtime = Runtime::new();
        let target = Object::new();
        let subscriber = MockSubscriber::new();
        {
            let _ctx = ContextGuard::enter(&runtime, Some(subscriber.clone()));
            runtime.track(&target, "a");
        }

        subscriber.stop(&runtime);
        runtime.trigger(&target, "a");

        assert_eq!(subscriber.notified.get(), 0);
        assert_eq!(runtime.dep_len(&target, "a"), 0);
    }

    #[test]
    fn untracked_reads_are_not_recorded() {
        let runtime = Runtime::new();
        let target = Object::new();
        let subscriber = MockSubscriber::new();
        let _ctx = ContextGuard::enter(&runtime, Some(subscriber));

        runtime.untracked(|| runtime.track(&target, "a"));
        assert!(!runtime.has_dep(&target, "a"));

        runtime.track(&target, "b");
        assert!(runtime.has_dep(&target, "b"));
    }

    #[test]
    fn separate_runtimes_are_isolated() {
        let left = Runtime::new();
        let right = Runtime::new();
        let target = Object::new();
        let subscriber = MockSubscriber::new();
        {
            let _ctx = ContextGuard::enter(&left, Some(subscriber.clone()));
            left.track(&target, "a");
        }

        right.trigger(&target, "a");
        assert_eq!(subscriber.notified.get(), 0);
        assert!(!right.has_dep(&target, "a"));
        assert!(!left.ptr_eq(&right));
        assert!(left.ptr_eq(&left.clone()));
    }

    #[test]
    fn weak_handle_dies_with_last_runtime() {
        let runtime = Runtime::new();
        let weak = runtime.downgrade();
        assert!(weak.upgrade().is_some_and(|rt| rt.ptr_eq(&runtime)));

        drop(runtime);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn default_runtime_is_shared_per_thread() {
        assert!(Runtime::current().ptr_eq(&Runtime::current()));
    }
}
