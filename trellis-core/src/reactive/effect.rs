//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever its dependencies change.
//!
//! # How Effects Work
//!
//! 1. `run()` pushes the effect onto the runtime's context stack and calls
//!    the body. Every tracked read inside the body subscribes the effect.
//!
//! 2. When any dependency changes, the runtime notifies the effect: the
//!    scheduler is called if there is one, otherwise the body re-runs.
//!
//! 3. Before re-running, the effect leaves the dependency sets of its
//!    previous run, so dependencies that were read only conditionally do not
//!    linger.
//!
//! # Lifecycle
//!
//! An effect is active until `stop()`, which is immediate and permanent. A
//! stopped effect can still be run by hand; it just no longer tracks.
//!
//! Effects are owned by the dependency sets they joined, so an effect keeps
//! reacting after its handle is dropped. Only `stop()`, `Runtime::teardown`
//! or dropping the runtime ends it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::debug;

use crate::graph::{Dep, DepId};

use super::context::ContextGuard;
use super::subscriber::{Subscriber, SubscriberId};
use super::{Runtime, WeakRuntime};

type Scheduler = Box<dyn Fn(&Runtime)>;

pub(crate) struct EffectCore<T> {
    id: SubscriberId,

    body: Box<dyn Fn() -> T>,

    /// Called instead of re-running when a dependency changes.
    scheduler: Option<Scheduler>,

    /// Back-references to every dependency set this effect is in.
    deps: RefCell<IndexMap<DepId, Weak<Dep>>>,

    active: Cell<bool>,

    run_count: Cell<usize>,
}

impl<T: 'static> EffectCore<T> {
    fn new(body: Box<dyn Fn() -> T>, scheduler: Option<Scheduler>) -> Rc<Self> {
        Rc::new(Self {
            id: SubscriberId::new(),
            body,
            scheduler,
            deps: RefCell::new(IndexMap::new()),
            active: Cell::new(true),
            run_count: Cell::new(0),
        })
    }

    fn run(core: &Rc<Self>, runtime: &Runtime) -> T {
        if !core.active.get() {
            return core.run_untracked();
        }
        core.run_count.set(core.run_count.get() + 1);

        let this: Rc<dyn Subscriber> = Rc::clone(core) as Rc<dyn Subscriber>;
        runtime.register(&this);
        core.leave_deps(Some(runtime));

        let _ctx = ContextGuard::enter(runtime, Some(this));
        (core.body)()
    }
}

impl<T> EffectCore<T> {
    fn run_untracked(&self) -> T {
        self.run_count.set(self.run_count.get() + 1);
        (self.body)()
    }

    /// Stop for good. Without a runtime (it is being dropped) there is
    /// nothing to unregister from.
    fn halt(&self, runtime: Option<&Runtime>) {
        if !self.active.replace(false) {
            return;
        }
        let deps = self.deps.borrow().len();
        self.leave_deps(runtime);
        if let Some(runtime) = runtime {
            runtime.unregister(self.id);
        }
        debug!(effect = self.id.raw(), deps, "effect stopped");
    }

    /// Remove this effect from every dependency set it joined, letting the
    /// runtime prune the ones left empty.
    fn leave_deps(&self, runtime: Option<&Runtime>) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps.values().filter_map(Weak::upgrade) {
            dep.remove(self.id);
            if let Some(runtime) = runtime {
                runtime.release_dep(&dep);
            }
        }
    }

    fn dependency_count(&self) -> usize {
        self.deps
            .borrow()
            .values()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }
}

impl<T: 'static> Subscriber for EffectCore<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn record_dep(&self, dep: &Rc<Dep>) {
        self.deps
            .borrow_mut()
            .entry(dep.id())
            .or_insert_with(|| Rc::downgrade(dep));
    }

    fn notify(self: Rc<Self>, runtime: &Runtime) {
        match &self.scheduler {
            Some(scheduler) => scheduler(runtime),
            None => {
                Self::run(&self, runtime);
            }
        }
    }

    fn stop(&self, runtime: &Runtime) {
        self.halt(Some(runtime));
    }
}

/// Handle to a re-runnable computation.
///
/// `T` is the body's return type; `run()` hands it back.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_ref(10);
/// let doubled = Rc::new(Cell::new(0));
///
/// let effect = runtime.effect({
///     let (count, doubled) = (count.clone(), doubled.clone());
///     move || doubled.set(count.get() * 2)
/// });
/// count.set(21);
/// assert_eq!(doubled.get(), 42);
///
/// effect.stop();
/// count.set(0);
/// assert_eq!(doubled.get(), 42);
/// ```
pub struct Effect<T = ()> {
    core: Rc<EffectCore<T>>,
    runtime: WeakRuntime,
}

impl<T: 'static> Effect<T> {
    /// Create an effect without running it.
    ///
    /// Nothing is tracked until the first `run()`.
    pub fn new<F>(runtime: &Runtime, body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self {
            core: EffectCore::new(Box::new(body), None),
            runtime: runtime.downgrade(),
        }
    }

    /// Create an effect that calls `scheduler` instead of re-running when a
    /// dependency changes. The scheduler decides when (or whether) to call
    /// `run()`.
    pub fn with_scheduler<F, S>(runtime: &Runtime, body: F, scheduler: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn() + 'static,
    {
        Self::with_runtime_scheduler(runtime, body, move |_| scheduler())
    }

    pub(crate) fn with_runtime_scheduler<F, S>(runtime: &Runtime, body: F, scheduler: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(&Runtime) + 'static,
    {
        Self {
            core: EffectCore::new(Box::new(body), Some(Box::new(scheduler))),
            runtime: runtime.downgrade(),
        }
    }

    /// Run the body, tracking its reads if the effect is still active and
    /// its runtime still exists.
    pub fn run(&self) -> T {
        match self.runtime.upgrade() {
            Some(runtime) => EffectCore::run(&self.core, &runtime),
            None => self.core.run_untracked(),
        }
    }
}

impl<T> Effect<T> {
    pub fn id(&self) -> SubscriberId {
        self.core.id
    }

    /// Stop the effect for good. Calling this again does nothing.
    pub fn stop(&self) {
        self.core.halt(self.runtime.upgrade().as_ref());
    }

    pub fn active(&self) -> bool {
        self.core.active.get()
    }

    /// Number of times the body has run, tracked or not.
    pub fn run_count(&self) -> usize {
        self.core.run_count.get()
    }

    /// Number of dependency sets the effect is currently in.
    pub fn dependency_count(&self) -> usize {
        self.core.dependency_count()
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.core.id)
            .field("active", &self.core.active.get())
            .field("run_count", &self.core.run_count.get())
            .field("dependency_count", &self.core.deps.borrow().len())
            .finish()
    }
}

impl Runtime {
    /// Create an effect and run it once to collect its dependencies.
    pub fn effect<T, F>(&self, body: F) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        let effect = Effect::new(self, body);
        effect.run();
        effect
    }
}

/// Create an effect on the default runtime and run it once.
pub fn effect<T, F>(body: F) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    Runtime::current().effect(body)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
