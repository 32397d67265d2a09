//! Target Map
//!
//! Maps a target object's identity and a property key to the dependency set
//! for that pair. Records are created on the first tracked read of any
//! property of a target.
//!
//! The map never keeps a target alive. Each record holds a weak handle to its
//! object; records whose object has been dropped are swept when the map has
//! grown enough since the last sweep, so the cost is amortized over inserts.

use std::collections::HashMap;
use std::rc::Rc;

use crate::data::{Key, Object, ObjectId, WeakObject};

use super::Dep;

/// Never sweep maps smaller than this.
const MIN_SWEEP_THRESHOLD: usize = 64;

/// Dependency sets for one target.
#[derive(Debug)]
struct TargetRecord {
    target: WeakObject,
    deps: HashMap<Key, Rc<Dep>>,
}

/// `target identity → (key → dependency set)`.
#[derive(Debug)]
pub(crate) struct TargetMap {
    records: HashMap<ObjectId, TargetRecord>,
    sweep_at: usize,
}

impl TargetMap {
    pub(crate) fn new() -> Self {
        Self {
            records: HashMap::new(),
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }

    /// Get the dependency set for `(target, key)`, creating the record and
    /// the set if needed.
    pub(crate) fn dep_or_insert(&mut self, target: &Object, key: &str) -> Rc<Dep> {
        let id = target.id();
        if !self.records.contains_key(&id) {
            self.maybe_sweep();
        }
        let record = self.records.entry(id).or_insert_with(|| TargetRecord {
            target: target.downgrade(),
            deps: HashMap::new(),
        });

        if let Some(dep) = record.deps.get(key) {
            return Rc::clone(dep);
        }
        let key = Key::from(key);
        let dep = Dep::for_property(id, Rc::clone(&key));
        record.deps.insert(key, Rc::clone(&dep));
        dep
    }

    /// Look up the dependency set for `(target, key)` without creating it.
    pub(crate) fn get(&self, target: ObjectId, key: &str) -> Option<Rc<Dep>> {
        self.records
            .get(&target)
            .and_then(|record| record.deps.get(key))
            .cloned()
    }

    /// Remove an empty dependency set, and its record if that was the last
    /// set. Returns `true` if the set was removed.
    pub(crate) fn remove_if_empty(&mut self, target: ObjectId, key: &str) -> bool {
        let Some(record) = self.records.get_mut(&target) else {
            return false;
        };
        let removable = record.deps.get(key).is_some_and(|dep| dep.is_empty());
        if !removable {
            return false;
        }
        record.deps.remove(key);
        if record.deps.is_empty() {
            self.records.remove(&target);
        }
        true
    }

    /// Number of targets with a record.
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Number of dependency sets recorded for one target.
    pub(crate) fn key_count(&self, target: ObjectId) -> usize {
        self.records
            .get(&target)
            .map(|record| record.deps.len())
            .unwrap_or(0)
    }

    /// Drop every record, returning the dependency sets that were held.
    pub(crate) fn drain(&mut self) -> Vec<Rc<Dep>> {
        self.sweep_at = MIN_SWEEP_THRESHOLD;
        self.records
            .drain()
            .flat_map(|(_, record)| record.deps.into_values())
            .collect()
    }

    /// Sweep records of dropped targets once the map has doubled since the
    /// last sweep.
    fn maybe_sweep(&mut self) {
        if self.records.len() < self.sweep_at {
            return;
        }
        self.records.retain(|_, record| record.target.is_alive());
        self.sweep_at = (self.records.len() * 2).max(MIN_SWEEP_THRESHOLD);
        tracing::trace!(live = self.records.len(), "swept target map");
    }
}

impl Default for TargetMap {
    fn default() -> Self {
        Self::new()
    }
}
