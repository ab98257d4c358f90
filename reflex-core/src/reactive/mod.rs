//! Reactive Primitives
//!
//! This module implements the reactive engine: the dependency registry, the
//! execution context, effects, the track/trigger protocol and computed values.
//!
//! # Concepts
//!
//! ## Track and trigger
//!
//! A tracked object is anything with a [`TargetId`]. Reading one of its
//! properties inside an effect calls [`track`], which subscribes the running
//! effect to that (object, key) pair. Writing the property calls [`trigger`],
//! which re-runs every subscribed effect, or hands it to the effect's
//! scheduler.
//!
//! ## Effects
//!
//! An [`Effect`] wraps a computation. Each run forgets the previous run's
//! subscriptions and collects fresh ones, so conditional reads never leave
//! stale subscriptions behind.
//!
//! ## Computed values
//!
//! A [`Computed`] is a cached derived value. It is built from a lazy effect
//! whose scheduler marks the cache stale instead of recomputing, and it is a
//! tracked object itself, so effects that read it are re-run when its inputs
//! change.
//!
//! ## Interception
//!
//! [`ReactiveMap`] and [`Ref`] wrap plain data and call `track`/`trigger` on
//! every read and write.
//!
//! # Implementation Notes
//!
//! The execution context is a thread-local stack; the registry is global and
//! sharded. Effect bodies run synchronously to completion, and no lock is held
//! while user code runs.

mod computed;
mod context;
mod effect;
mod proxy;
mod registry;
mod runtime;
mod subscriber;
mod target;

pub use computed::{Computed, COMPUTED_VALUE_KEY};
pub use context::ReactiveContext;
pub use effect::{Effect, EffectOptions, Scheduler};
pub use proxy::{ReactiveMap, Ref, ITERATE_KEY, REF_VALUE_KEY};
pub use registry::{DepSet, DepsMap, Registry, RegistryStats};
pub use runtime::{computed, effect, effect_with, track, trigger, untracked, Runtime};
pub use subscriber::{EffectRef, Subscriber, SubscriberId};
pub use target::{PropertyKey, Target, TargetHandle, TargetId};
