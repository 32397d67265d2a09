//! Reactive Context
//!
//! The reactive context tracks which computation is currently collecting
//! dependencies. When a tracked value is read, the runtime asks the context
//! who is reading and registers that subscriber as a dependent.
//!
//! # Implementation
//!
//! Each runtime keeps a stack. Running an effect pushes the effect, and the
//! returned guard pops it when dropped, even if the effect body panics.
//! Nested runs (an effect body that runs another effect, or a computed
//! recomputing inside an effect) therefore restore the outer collector on
//! exit.
//!
//! A `None` entry pauses tracking: reads inside `Runtime::untracked` see no
//! collector.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Runtime, Subscriber, SubscriberId};

/// The collector stack of one runtime.
#[derive(Default)]
pub(crate) struct ContextStack {
    entries: RefCell<Vec<Option<Rc<dyn Subscriber>>>>,
}

impl ContextStack {
    pub(crate) fn push(&self, entry: Option<Rc<dyn Subscriber>>) {
        self.entries.borrow_mut().push(entry);
    }

    pub(crate) fn pop(&self) -> Option<SubscriberId> {
        let entry = self.entries.borrow_mut().pop();
        entry.flatten().map(|s| s.id())
    }

    /// The subscriber collecting right now, if tracking is enabled.
    pub(crate) fn current(&self) -> Option<Rc<dyn Subscriber>> {
        self.entries.borrow().last().cloned().flatten()
    }

    pub(crate) fn is_tracking(&self) -> bool {
        matches!(self.entries.borrow().last(), Some(Some(_)))
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// Guard that pops the context when dropped.
pub(crate) struct ContextGuard {
    runtime: Runtime,
    subscriber: Option<SubscriberId>,
}

impl ContextGuard {
    pub(crate) fn enter(runtime: &Runtime, entry: Option<Rc<dyn Subscriber>>) -> Self {
        let subscriber = entry.as_ref().map(|s| s.id());
        runtime.context().push(entry);
        Self {
            runtime: runtime.clone(),
            subscriber,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let popped = self.runtime.context().pop();

        // Verify we're popping the right context.
        debug_assert_eq!(
            popped, self.subscriber,
            "reactive context mismatch: expected {:?}, got {:?}",
            self.subscriber, popped
        );
    }
}
