//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything that can sit in a dependency set: in practice an
//! effect, whether it backs a user side effect or a computed value. The
//! registry stores subscribers type-erased behind [`EffectRef`] so that effects
//! with different return types can share one dependency set.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::effect::Scheduler;
use super::registry::DepSet;

/// Unique identifier for a subscriber.
///
/// Each effect gets a unique ID when created. The ID is the effect's identity:
/// two [`EffectRef`]s are equal exactly when their IDs are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be subscribed to a dependency set.
///
/// Implemented by the effect internals. The trait is object safe so that the
/// registry can hold `Arc<dyn Subscriber>` regardless of the effect's output type.
pub trait Subscriber: Send + Sync {
    /// The subscriber's identity.
    fn id(&self) -> SubscriberId;

    /// Optional human-readable name, used in tracing output.
    fn name(&self) -> Option<&str>;

    /// The scheduler hook, if the subscriber declared one.
    fn scheduler(&self) -> Option<Scheduler>;

    /// Whether the subscriber has been permanently disposed.
    fn is_disposed(&self) -> bool;

    /// Re-run the computation, discarding its output.
    fn notify(self: Arc<Self>);

    /// Remove this subscriber from every dependency set it belongs to.
    fn cleanup(&self);

    /// Record that this subscriber now belongs to `dep`.
    fn add_dependency(&self, dep: &DepSet);
}

/// A cloneable, type-erased handle to an effect.
///
/// This is what dependency sets store, what the execution context stacks, and
/// what a scheduler receives. A scheduler may run it immediately, queue it, or
/// drop it.
#[derive(Clone)]
pub struct EffectRef(Arc<dyn Subscriber>);

impl EffectRef {
    pub(crate) fn new(subscriber: Arc<dyn Subscriber>) -> Self {
        Self(subscriber)
    }

    /// The effect's identity.
    pub fn id(&self) -> SubscriberId {
        self.0.id()
    }

    /// The effect's name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.0.name()
    }

    /// Whether the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.0.is_disposed()
    }

    /// Run the effect now. A disposed effect does nothing.
    pub fn run(&self) {
        Arc::clone(&self.0).notify();
    }

    pub(crate) fn scheduler(&self) -> Option<Scheduler> {
        self.0.scheduler()
    }

    pub(crate) fn add_dependency(&self, dep: &DepSet) {
        self.0.add_dependency(dep);
    }
}

impl PartialEq for EffectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for EffectRef {}

impl Hash for EffectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for EffectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRef")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
