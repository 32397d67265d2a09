//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values:
//! user effects and the effects backing computed values.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::graph::Dep;

use super::Runtime;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID keys dependency
/// sets and the runtime registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can sit in dependency sets.
pub(crate) trait Subscriber {
    fn id(&self) -> SubscriberId;

    /// Stopped subscribers are never tracked or notified.
    fn is_active(&self) -> bool;

    /// Remember that this subscriber joined `dep`, so it can leave it later.
    fn record_dep(&self, dep: &Rc<Dep>);

    /// One of the subscriber's dependencies changed.
    fn notify(self: Rc<Self>, runtime: &Runtime);

    /// Leave every dependency set and never run tracked again.
    fn stop(&self, runtime: &Runtime);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn mock_stop_leaves_deps() {
        let runtime = Runtime::new();
        let dep = Dep::standalone();
        let subscriber = mock::MockSubscriber::new();

        dep.insert(subscriber.clone());
        subscriber.record_dep(&dep);
        subscriber.stop(&runtime);

        assert!(dep.is_empty());
        assert!(!subscriber.is_active());
    }
}
