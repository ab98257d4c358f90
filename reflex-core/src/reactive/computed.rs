//! Computed Implementation
//!
//! A Computed is a cached derived value built on a lazy effect.
//!
//! # How Computeds Work
//!
//! 1. The computed starts dirty. Nothing runs at creation.
//!
//! 2. Reading a dirty computed runs the lazy effect, which evaluates the
//!    getter and collects its dependencies. The result is cached and the
//!    computed becomes clean.
//!
//! 3. When a dependency changes, the effect's scheduler marks the computed
//!    dirty and triggers the computed's own value key. It does not
//!    recompute. Recomputation waits for the next read.
//!
//! 4. Every read tracks the value key, so an effect reading the computed is
//!    re-run when the computed's upstream dependencies change.
//!
//! # Why This Matters
//!
//! - A dependency changes ten times between reads
//! - The getter still runs once, on the next read
//! - A computed that is never read again never recomputes
//!
//! # Errors
//!
//! If the getter panics, the panic reaches the reader and the computed stays
//! dirty, so the next read tries again.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::effect::{Effect, EffectOptions};
use super::runtime::Runtime;
use super::target::{PropertyKey, Target, TargetHandle, TargetId};

/// The synthetic key under which a computed's readers are registered.
pub const COMPUTED_VALUE_KEY: PropertyKey = PropertyKey::from_static("value");

struct ComputedInner<T: 'static> {
    handle: TargetHandle,

    /// Shared with the effect's scheduler.
    dirty: Arc<AtomicBool>,

    value: Mutex<Option<T>>,

    effect: Effect<T>,
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        // Upstream dep sets still hold the effect; release them.
        self.effect.dispose();
    }
}

/// A lazily evaluated, cached derived value.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{Computed, Ref};
///
/// let count = Ref::new(3);
/// let reader = count.clone();
/// let doubled = Computed::new(move || reader.get() * 2);
///
/// assert_eq!(doubled.get(), 6);
/// count.set(4);
/// assert!(doubled.is_dirty());
/// assert_eq!(doubled.get(), 8);
/// ```
pub struct Computed<T: 'static> {
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + 'static,
{
    /// Create a computed value. The getter does not run until the first read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let handle = TargetHandle::new();
        let id = handle.id();
        let dirty = Arc::new(AtomicBool::new(true));

        let scheduler_dirty = Arc::clone(&dirty);
        let options = EffectOptions::new().lazy(true).scheduler(move |_effect| {
            scheduler_dirty.store(true, Ordering::Release);
            trace!(computed = id.as_u64(), "computed invalidated");
            Runtime::trigger(id, &COMPUTED_VALUE_KEY);
        });

        let effect = Effect::build(getter, options);

        Self {
            inner: Arc::new(ComputedInner {
                handle,
                dirty,
                value: Mutex::new(None),
                effect,
            }),
        }
    }

    /// Read the value, recomputing first if it is stale.
    ///
    /// Subscribes the running effect, if any, to this computed.
    pub fn get(&self) -> T {
        let value = self.cached().unwrap_or_else(|| self.recompute());
        Runtime::track(self.inner.handle.id(), &COMPUTED_VALUE_KEY);
        value
    }

    /// Read the value without subscribing the running effect.
    pub fn get_untracked(&self) -> T {
        self.cached().unwrap_or_else(|| self.recompute())
    }

    fn cached(&self) -> Option<T> {
        if self.inner.dirty.load(Ordering::Acquire) {
            return None;
        }
        self.inner.value.lock().clone()
    }

    fn recompute(&self) -> T {
        let value = self.inner.effect.invoke();
        *self.inner.value.lock() = Some(value.clone());
        self.inner.dirty.store(false, Ordering::Release);
        value
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    /// Number of times the getter has completed.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }

    /// Number of upstream dep sets the getter subscribed to on its last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.effect.dependency_count()
    }
}

impl<T: 'static> Target for Computed<T> {
    fn target_id(&self) -> TargetId {
        self.inner.handle.id()
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computed<T>
where
    T: Clone + Send + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.handle.id())
            .field("dirty", &self.is_dirty())
            .field("value", &*self.inner.value.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, Registry, TargetId};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn computed_is_lazy_until_first_read() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert!(computed.is_dirty());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(computed.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(!computed.is_dirty());
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get_untracked(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(computed.compute_count(), 1);
    }

    #[test]
    fn upstream_trigger_marks_dirty_without_recomputing() {
        let upstream = TargetId::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            Runtime::track(upstream, &PropertyKey::from("x"));
            call_count_clone.fetch_add(1, Ordering::SeqCst)
        });

        assert_eq!(computed.get(), 0);
        assert_eq!(computed.dependency_count(), 1);

        Runtime::trigger(upstream, &PropertyKey::from("x"));
        Runtime::trigger(upstream, &PropertyKey::from("x"));
        assert!(computed.is_dirty());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        assert_eq!(computed.get(), 1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
        Runtime::untrack(upstream);
    }

    #[test]
    fn reading_inside_effect_subscribes_the_reader() {
        let upstream = TargetId::new();
        let computed = Computed::new(move || {
            Runtime::track(upstream, &PropertyKey::from("x"));
            1
        });

        let reader = computed.clone();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let _effect = effect(move || {
            reader.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        let dep = Registry::dep_set(computed.target_id(), &COMPUTED_VALUE_KEY).unwrap();
        assert_eq!(dep.len(), 1);

        Runtime::trigger(upstream, &PropertyKey::from("x"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        Runtime::untrack(upstream);
    }

    #[test]
    fn getter_panic_leaves_computed_dirty() {
        let fail = Arc::new(AtomicBool::new(true));
        let fail_clone = fail.clone();

        let computed = Computed::new(move || {
            if fail_clone.load(Ordering::SeqCst) {
                panic!("getter failed");
            }
            5
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| computed.get()));
        assert!(result.is_err());
        assert!(computed.is_dirty());

        fail.store(false, Ordering::SeqCst);
        assert_eq!(computed.get(), 5);
        assert!(!computed.is_dirty());
    }

    #[test]
    fn dropping_computed_releases_upstream_subscription() {
        let upstream = TargetId::new();
        let computed = Computed::new(move || {
            Runtime::track(upstream, &PropertyKey::from("x"));
        });
        computed.get();

        let dep = Registry::dep_set(upstream, &PropertyKey::from("x")).unwrap();
        assert_eq!(dep.len(), 1);

        let id = computed.target_id();
        drop(computed);
        assert!(dep.is_empty());
        assert!(!Registry::contains(id));
        Runtime::untrack(upstream);
    }
}
