//! Dependency Sets
//!
//! A `Dep` is the set of subscribers interested in one thing: one property of
//! one target, one ref, or one computed value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::data::{Key, ObjectId};
use crate::reactive::{Subscriber, SubscriberId};

/// Counter for generating unique dependency set IDs.
static DEP_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DepId(u64);

impl DepId {
    fn next() -> Self {
        Self(DEP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Subscribers notified together by one trigger.
///
/// Most dependency sets have a handful of subscribers, so snapshots stay on
/// the stack.
pub(crate) type Snapshot = SmallVec<[Rc<dyn Subscriber>; 4]>;

/// A set of subscribers.
///
/// The set owns its subscribers: an effect stays alive for as long as some
/// dependency set still holds it. Subscribers keep only weak back-references
/// to their sets, so there is no ownership cycle between the two.
///
/// Insertion order is preserved, which makes notification order
/// deterministic (first subscribed, first notified).
pub(crate) struct Dep {
    id: DepId,

    /// The `(target, key)` pair this set belongs to, if any.
    owner: Option<(ObjectId, Key)>,

    subscribers: RefCell<IndexMap<SubscriberId, Rc<dyn Subscriber>>>,
}

impl Dep {
    /// Create the dependency set for one property of one target.
    pub(crate) fn for_property(target: ObjectId, key: Key) -> Rc<Self> {
        Rc::new(Self {
            id: DepId::next(),
            owner: Some((target, key)),
            subscribers: RefCell::new(IndexMap::new()),
        })
    }

    /// Create a dependency set owned by a ref or computed value.
    pub(crate) fn standalone() -> Rc<Self> {
        Rc::new(Self {
            id: DepId::next(),
            owner: None,
            subscribers: RefCell::new(IndexMap::new()),
        })
    }

    pub(crate) fn id(&self) -> DepId {
        self.id
    }

    pub(crate) fn owner(&self) -> Option<&(ObjectId, Key)> {
        self.owner.as_ref()
    }

    /// Add a subscriber. Returns `false` if it was already present.
    pub(crate) fn insert(&self, subscriber: Rc<dyn Subscriber>) -> bool {
        let id = subscriber.id();
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, subscriber);
        true
    }

    /// Remove a subscriber. Returns `false` if it was not present.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.borrow_mut().shift_remove(&id);
        removed.is_some()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out the current members.
    ///
    /// Notification iterates the copy, so subscribers that leave or rejoin
    /// the set while running are neither skipped nor notified twice.
    pub(crate) fn snapshot(&self) -> Snapshot {
        self.subscribers.borrow().values().cloned().collect()
    }

    /// Drop every member.
    pub(crate) fn clear(&self) {
        // Members may be the last owners of effects; drop them unborrowed.
        let members = std::mem::take(&mut *self.subscribers.borrow_mut());
        drop(members);
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("subscribers", &self.subscribers.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
