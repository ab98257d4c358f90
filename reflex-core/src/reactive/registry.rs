//! Dependency Registry
//!
//! Maps tracked objects to their property keys and, per key, to the set of
//! effects subscribed to it:
//!
//! ```text
//! TargetId -> DepsMap (PropertyKey -> DepSet (SubscriberId -> EffectRef))
//! ```
//!
//! The registry is process-wide and sharded with `DashMap`, so threads that
//! each run their own execution context can share it. Shard guards are never
//! held while user code runs: lookups clone the `DepSet` handle out and drop
//! the guard before anything else happens.
//!
//! Ownership runs one way only. The registry owns dep sets, dep sets own the
//! effects subscribed to them, and effects refer back to their dep sets
//! weakly. Evicting a target therefore releases every effect that was only
//! kept alive by its subscriptions.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::subscriber::{EffectRef, SubscriberId};
use super::target::{PropertyKey, TargetId};

/// The effects subscribed to one (object, key) pair.
///
/// Cloning yields another handle to the same set. Iteration order is
/// insertion order.
#[derive(Clone, Default)]
pub struct DepSet {
    members: Arc<Mutex<IndexMap<SubscriberId, EffectRef>>>,
}

impl DepSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe an effect. Returns `false` if it was already a member.
    pub fn insert(&self, effect: EffectRef) -> bool {
        let mut members = self.members.lock();
        if members.contains_key(&effect.id()) {
            return false;
        }
        members.insert(effect.id(), effect);
        true
    }

    /// Unsubscribe an effect. Returns `true` if it was a member.
    pub fn remove(&self, id: SubscriberId) -> bool {
        // Bind the removed handle so it drops after the lock is released.
        let removed = self.members.lock().shift_remove(&id);
        removed.is_some()
    }

    /// Whether the effect is subscribed.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members.lock().contains_key(&id)
    }

    /// Copy the current members into a fresh sequence.
    ///
    /// Re-running an effect removes and re-adds it to the live set, so
    /// callers that run effects must iterate a snapshot, never the set.
    pub fn snapshot(&self) -> Vec<EffectRef> {
        self.members.lock().values().cloned().collect()
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    /// Whether no effect is subscribed.
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Whether two handles refer to the same set.
    pub fn ptr_eq(&self, other: &DepSet) -> bool {
        Arc::ptr_eq(&self.members, &other.members)
    }

    pub(crate) fn downgrade(&self) -> WeakDepSet {
        WeakDepSet {
            members: Arc::downgrade(&self.members),
        }
    }
}

impl std::fmt::Debug for DepSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepSet").field("len", &self.len()).finish()
    }
}

/// Non-owning reference from an effect back to a set it belongs to.
#[derive(Clone)]
pub(crate) struct WeakDepSet {
    members: Weak<Mutex<IndexMap<SubscriberId, EffectRef>>>,
}

impl WeakDepSet {
    pub(crate) fn upgrade(&self) -> Option<DepSet> {
        self.members.upgrade().map(|members| DepSet { members })
    }
}

/// Per-object mapping from property key to dep set.
pub type DepsMap = HashMap<PropertyKey, DepSet>;

/// Aggregate counts over the whole registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Objects with at least one tracked key.
    pub targets: usize,
    /// Tracked (object, key) pairs.
    pub keys: usize,
    /// Total effect memberships across all dep sets.
    pub subscriptions: usize,
}

static TARGETS: OnceLock<DashMap<TargetId, DepsMap>> = OnceLock::new();

fn targets() -> &'static DashMap<TargetId, DepsMap> {
    TARGETS.get_or_init(DashMap::new)
}

/// The global dependency registry.
pub struct Registry;

impl Registry {
    /// Return the dep set for `(target, key)`, creating it and the target's
    /// deps map on first use.
    pub fn dep_set_or_default(target: TargetId, key: &PropertyKey) -> DepSet {
        let mut deps_map = targets().entry(target).or_default();
        if let Some(dep) = deps_map.get(key) {
            return dep.clone();
        }
        let dep = DepSet::new();
        deps_map.insert(key.clone(), dep.clone());
        dep
    }

    /// Look up the dep set for `(target, key)` without creating anything.
    pub fn dep_set(target: TargetId, key: &PropertyKey) -> Option<DepSet> {
        targets()
            .get(&target)
            .and_then(|deps_map| deps_map.get(key).cloned())
    }

    /// Whether the target has a deps map.
    pub fn contains(target: TargetId) -> bool {
        targets().contains_key(&target)
    }

    /// Drop the target's deps map. Returns `true` if one existed.
    pub fn evict(target: TargetId) -> bool {
        // The removed map is dropped outside the shard lock: dropping it may
        // release effects whose captures evict other targets.
        let removed = targets().remove(&target);
        removed.is_some()
    }

    /// Tracked keys of one target, in no particular order.
    pub fn keys(target: TargetId) -> Vec<PropertyKey> {
        targets()
            .get(&target)
            .map(|deps_map| deps_map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Counts over the whole registry.
    pub fn stats() -> RegistryStats {
        let mut target_count = 0;
        let mut dep_sets: Vec<DepSet> = Vec::new();
        for entry in targets().iter() {
            target_count += 1;
            dep_sets.extend(entry.value().values().cloned());
        }

        // Member counts take each set's own lock, so shard guards are gone by now.
        RegistryStats {
            targets: target_count,
            keys: dep_sets.len(),
            subscriptions: dep_sets.iter().map(DepSet::len).sum(),
        }
    }
}
