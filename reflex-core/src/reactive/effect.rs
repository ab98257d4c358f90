//! Effect Implementation
//!
//! An Effect is a wrapped computation that re-runs whenever the tracked
//! properties it read on its last run change.
//!
//! # How Effects Work
//!
//! Every invocation of an effect:
//!
//! 1. Removes the effect from every dep set it joined on its previous run.
//!    The set of properties a body reads may change between runs
//!    (conditional reads), so stale subscriptions must not linger.
//!
//! 2. Pushes the effect onto the reactive context, making it the active
//!    reader.
//!
//! 3. Runs the body. Tracked reads subscribe the effect again.
//!
//! 4. Pops the context, restoring the enclosing effect. The pop happens in a
//!    guard's `Drop`, so it also runs when the body panics.
//!
//! # Eager and lazy effects
//!
//! A non-lazy effect runs once at creation to establish its dependencies. A
//! lazy effect only runs when invoked through [`Effect::run`]; computed values
//! are built on lazy effects.
//!
//! # Scheduling
//!
//! If an effect declares a [`Scheduler`], a change to one of its dependencies
//! calls the scheduler instead of re-running the effect. The scheduler gets an
//! [`EffectRef`] and decides whether and when to run it. The effect itself
//! never calls its own scheduler.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, debug_span};

use super::context::ReactiveContext;
use super::registry::{DepSet, WeakDepSet};
use super::subscriber::{EffectRef, Subscriber, SubscriberId};
use crate::error::{Error, Result};

/// Hook invoked by `trigger` in place of re-running an effect.
pub type Scheduler = Arc<dyn Fn(EffectRef) + Send + Sync>;

/// Options accepted when creating an effect.
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Skip the initial run; the caller invokes the effect on demand.
    pub lazy: bool,

    /// Called by `trigger` instead of re-running the effect directly.
    pub scheduler: Option<Scheduler>,

    /// Label used in tracing output.
    pub name: Option<String>,
}

impl EffectOptions {
    /// Default options: eager, no scheduler, unnamed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the effect is lazy.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Install a scheduler.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(EffectRef) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Name the effect.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Reject malformed options before an effect is built from them.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidOptions(
                    "effect name must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("name", &self.name)
            .finish()
    }
}

struct EffectInner<T> {
    id: SubscriberId,

    body: Box<dyn Fn() -> T + Send + Sync>,

    /// Weak references to every dep set this effect currently belongs to.
    deps: Mutex<SmallVec<[WeakDepSet; 4]>>,

    options: EffectOptions,

    disposed: AtomicBool,

    run_count: AtomicUsize,
}

fn execute<T: 'static>(inner: &Arc<EffectInner<T>>) -> T {
    inner.cleanup();

    let _span = debug_span!("effect", id = inner.id.as_u64(), name = ?inner.options.name).entered();
    let _ctx = ReactiveContext::enter(EffectRef::new(Arc::clone(inner) as Arc<dyn Subscriber>));

    let value = (inner.body)();
    inner.run_count.fetch_add(1, Ordering::Relaxed);
    value
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.options.name.as_deref()
    }

    fn scheduler(&self) -> Option<Scheduler> {
        self.options.scheduler.clone()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn notify(self: Arc<Self>) {
        if self.is_disposed() {
            debug!(id = self.id.as_u64(), "skipping disposed effect");
            return;
        }
        let _ = execute(&self);
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for dep in deps.iter().filter_map(WeakDepSet::upgrade) {
            dep.remove(self.id);
        }
    }

    fn add_dependency(&self, dep: &DepSet) {
        self.deps.lock().push(dep.downgrade());
    }
}

/// A reactive computation that re-runs when its dependencies change.
///
/// `Effect` is a cheap handle; clones share identity, dependencies and
/// disposal state.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{Effect, Ref};
///
/// let count = Ref::new(0);
/// let reader = count.clone();
/// let effect = Effect::new(move || {
///     println!("count is {}", reader.get());
/// });
///
/// count.set(5); // prints "count is 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
pub struct Effect<T: 'static = ()> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create an effect and run it once to establish its dependencies.
    ///
    /// A panic in the body propagates to the caller.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let effect = Self::build(body, EffectOptions::default());
        let _ = effect.invoke();
        effect
    }

    /// Create an effect without running it.
    pub fn new_lazy<F>(body: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(body, EffectOptions::default().lazy(true))
    }

    /// Create an effect from explicit options.
    ///
    /// Options are validated before anything runs. Unless `options.lazy` is
    /// set, the effect runs once before this returns.
    pub fn with_options<F>(body: F, options: EffectOptions) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        options.validate()?;
        let lazy = options.lazy;
        let effect = Self::build(body, options);
        if !lazy {
            let _ = effect.invoke();
        }
        Ok(effect)
    }

    pub(crate) fn build<F>(body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                body: Box::new(body),
                deps: Mutex::new(SmallVec::new()),
                options,
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        };
        debug!(
            id = effect.inner.id.as_u64(),
            name = ?effect.inner.options.name,
            lazy = effect.inner.options.lazy,
            "effect created"
        );
        effect
    }

    /// Run the effect and return the body's value.
    pub fn run(&self) -> Result<T> {
        if self.is_disposed() {
            return Err(Error::Disposed { id: self.id() });
        }
        Ok(self.invoke())
    }

    pub(crate) fn invoke(&self) -> T {
        execute(&self.inner)
    }

    /// The effect's identity.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// The effect's name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.inner.options.name.as_deref()
    }

    /// Whether the effect was created lazy.
    pub fn is_lazy(&self) -> bool {
        self.inner.options.lazy
    }

    /// Permanently stop the effect.
    ///
    /// Removes it from every dep set. Later triggers skip it and [`run`]
    /// returns [`Error::Disposed`].
    ///
    /// [`run`]: Effect::run
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::AcqRel) {
            debug!(id = self.inner.id.as_u64(), "effect disposed");
            self.inner.cleanup();
        }
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Number of dep sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.lock().len()
    }

    /// A type-erased handle to this effect.
    pub fn as_effect_ref(&self) -> EffectRef {
        EffectRef::new(Arc::clone(&self.inner) as Arc<dyn Subscriber>)
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("name", &self.inner.options.name)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
