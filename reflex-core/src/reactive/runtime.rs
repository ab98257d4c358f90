//! Reactive Runtime
//!
//! The runtime connects reads and writes to effects through the registry.
//!
//! # How It Works
//!
//! 1. When a tracked property is read inside an effect, [`Runtime::track`]
//!    adds the running effect to the property's dep set and records the set
//!    on the effect.
//!
//! 2. When a tracked property is written, [`Runtime::trigger`]:
//!    a. Looks up the property's dep set (absent means nothing to do)
//!    b. Snapshots its members
//!    c. Skips the effect that is currently running
//!    d. Hands each remaining effect to its scheduler, or re-runs it
//!
//! 3. Re-running an effect clears and re-collects its dependencies, so the
//!    registry always reflects each effect's most recent run.
//!
//! # Re-entrancy
//!
//! `trigger` may re-enter the engine: a re-run effect can write tracked
//! properties and trigger further effects. The only guard is that an effect
//! never re-triggers itself. A write cycle between two or more effects is not
//! detected and recurses until the caller breaks it.

use tracing::trace;

use super::computed::Computed;
use super::context::ReactiveContext;
use super::effect::{Effect, EffectOptions};
use super::registry::{Registry, RegistryStats};
use super::subscriber::SubscriberId;
use super::target::{PropertyKey, Target, TargetId};
use crate::error::Result;

/// Entry points of the track/trigger protocol.
pub struct Runtime;

impl Runtime {
    /// Subscribe the running effect to `(target, key)`.
    ///
    /// Does nothing outside an effect, inside an untracked frame, or when the
    /// running effect was disposed mid-body.
    pub fn track(target: TargetId, key: &PropertyKey) {
        let Some(effect) = ReactiveContext::tracking_subscriber() else {
            return;
        };
        if effect.is_disposed() {
            return;
        }

        let dep = Registry::dep_set_or_default(target, key);
        if dep.insert(effect.clone()) {
            effect.add_dependency(&dep);
            trace!(
                object = target.as_u64(),
                key = %key,
                effect = effect.id().as_u64(),
                "tracked"
            );
        }
    }

    /// Notify every effect subscribed to `(target, key)`.
    ///
    /// Call after the underlying value has been written.
    pub fn trigger(target: TargetId, key: &PropertyKey) {
        let Some(dep) = Registry::dep_set(target, key) else {
            return;
        };

        let effects = dep.snapshot();
        let active = ReactiveContext::current_subscriber();
        trace!(
            object = target.as_u64(),
            key = %key,
            subscribers = effects.len(),
            "triggered"
        );

        for effect in effects {
            if active.as_ref() == Some(&effect) || effect.is_disposed() {
                continue;
            }
            match effect.scheduler() {
                Some(scheduler) => scheduler(effect),
                None => effect.run(),
            }
        }
    }

    /// Forget everything tracked on `target`.
    ///
    /// Called automatically when a [`TargetHandle`](super::TargetHandle) drops.
    pub fn untrack(target: TargetId) -> bool {
        let evicted = Registry::evict(target);
        if evicted {
            trace!(object = target.as_u64(), "untracked");
        }
        evicted
    }

    /// Counts over the whole registry.
    pub fn stats() -> RegistryStats {
        Registry::stats()
    }

    /// The effect currently running on this thread, if any.
    pub fn active_effect() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber().map(|effect| effect.id())
    }

    /// Whether reads on this thread are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Record that the running effect read `key` on `target`.
pub fn track<T>(target: &T, key: impl Into<PropertyKey>)
where
    T: Target + ?Sized,
{
    Runtime::track(target.target_id(), &key.into());
}

/// Notify the effects that read `key` on `target`.
pub fn trigger<T>(target: &T, key: impl Into<PropertyKey>)
where
    T: Target + ?Sized,
{
    Runtime::trigger(target.target_id(), &key.into());
}

/// Create an eager effect with default options.
pub fn effect<T, F>(body: F) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Effect::new(body)
}

/// Create an effect with explicit options.
pub fn effect_with<T, F>(body: F, options: EffectOptions) -> Result<Effect<T>>
where
    T: 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Effect::with_options(body, options)
}

/// Create a lazily evaluated, cached derived value.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(getter)
}

/// Run `f` without subscribing the running effect to anything it reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::pause();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use crate::reactive::EffectRef;

    fn key(name: &str) -> PropertyKey {
        PropertyKey::from(name)
    }

    #[test]
    fn track_outside_effect_is_a_no_op() {
        let target = TargetId::new();
        Runtime::track(target, &key("a"));
        assert!(!Registry::contains(target));
    }

    #[test]
    fn trigger_on_untracked_property_is_a_no_op() {
        let target = TargetId::new();
        Runtime::trigger(target, &key("a"));
        assert!(!Registry::contains(target));
    }

    #[test]
    fn trigger_reruns_subscribers() {
        let target = TargetId::new();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let _effect = effect(move || {
            Runtime::track(target, &key("a"));
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        Runtime::trigger(target, &key("a"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        Runtime::trigger(target, &key("b"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        Runtime::untrack(target);
    }

    #[test]
    fn track_keeps_both_views_symmetric() {
        let target = TargetId::new();
        let effect = effect(move || {
            Runtime::track(target, &key("a"));
            Runtime::track(target, &key("a"));
            Runtime::track(target, &key("b"));
        });

        assert_eq!(effect.dependency_count(), 2);
        for name in ["a", "b"] {
            let dep = Registry::dep_set(target, &key(name)).unwrap();
            assert_eq!(dep.len(), 1);
            assert!(dep.contains(effect.id()));
        }
        Runtime::untrack(target);
    }

    #[test]
    fn scheduler_replaces_direct_rerun() {
        let target = TargetId::new();
        let runs = Arc::new(AtomicI32::new(0));
        let queue: Arc<Mutex<Vec<EffectRef>>> = Arc::new(Mutex::new(Vec::new()));

        let runs_clone = runs.clone();
        let queue_clone = queue.clone();
        let _effect = effect_with(
            move || {
                Runtime::track(target, &key("a"));
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            EffectOptions::new().scheduler(move |effect| queue_clone.lock().push(effect)),
        )
        .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        Runtime::trigger(target, &key("a"));
        Runtime::trigger(target, &key("a"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(queue.lock().len(), 2);

        let pending: Vec<EffectRef> = std::mem::take(&mut *queue.lock());
        pending[0].run();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        Runtime::untrack(target);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let target = TargetId::new();
        let effect = effect(move || {
            Runtime::track(target, &key("seen"));
            untracked(|| Runtime::track(target, &key("hidden")));
        });

        assert_eq!(effect.dependency_count(), 1);
        assert!(Registry::dep_set(target, &key("hidden")).is_none());
        Runtime::untrack(target);
    }

    #[test]
    fn active_effect_reported_inside_body() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let effect = effect(move || {
            *seen_clone.lock() = Runtime::active_effect();
            assert!(Runtime::is_tracking());
        });

        assert_eq!(*seen.lock(), Some(effect.id()));
        assert!(Runtime::active_effect().is_none());
        assert!(!Runtime::is_tracking());
    }

    #[test]
    fn free_functions_accept_targets() {
        let target = TargetId::new();
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let _effect = effect(move || {
            track(&target, "x");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        trigger(&target, "x");
        trigger(&target, 0usize);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(Runtime::untrack(target));
        assert!(!Runtime::untrack(target));
    }
}
