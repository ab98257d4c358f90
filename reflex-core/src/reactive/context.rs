//! Reactive Context
//!
//! The reactive context tracks which effect is currently running.
//! This enables automatic dependency tracking: when a tracked property is
//! read, we can subscribe the current effect to it.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing effect.
//! When an effect runs, we push it onto the stack. When it completes, we pop
//! it and the previous top becomes the active effect again.
//!
//! This design supports nested effects (an effect that synchronously runs
//! another effect, or a computed value read from inside an effect).
//!
//! Each thread has its own stack. The dependency registry is shared.

use std::cell::RefCell;

use super::subscriber::{EffectRef, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The running effect, if any.
    subscriber: Option<EffectRef>,
    /// Whether reads made in this frame subscribe the effect.
    tracking: bool,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the effect body panics.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While this context is active, any tracked reads subscribe the effect.
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(effect: EffectRef) -> Self {
        let subscriber_id = Some(effect.id());
        Self::push(ContextEntry {
            subscriber: Some(effect),
            tracking: true,
        });
        Self { subscriber_id }
    }

    /// Enter a frame in which reads are not tracked.
    ///
    /// The running effect stays the active one, so self-trigger suppression
    /// still applies to writes made inside the frame.
    pub fn pause() -> Self {
        let subscriber = Self::current_subscriber();
        let subscriber_id = subscriber.as_ref().map(EffectRef::id);
        Self::push(ContextEntry {
            subscriber,
            tracking: false,
        });
        Self { subscriber_id }
    }

    fn push(entry: ContextEntry) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::tracking_subscriber().is_some()
    }

    /// The running effect, if any.
    pub fn current_subscriber() -> Option<EffectRef> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// The effect that reads should be attributed to, if any.
    pub fn tracking_subscriber() -> Option<EffectRef> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|entry| entry.tracking)
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber.as_ref().map(EffectRef::id),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}",
                    self.subscriber_id,
                );
            }
        });
    }
}
