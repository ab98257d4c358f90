//! Reflex Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! It implements:
//!
//! - A global dependency registry keyed by object identity and property key
//! - Effects that record what they read and re-run when it changes
//! - The `track` / `trigger` protocol used by property interception
//! - Lazy, cached computed values built on top of effects
//!
//! # Architecture
//!
//! - `reactive`: registry, execution context, effects, computed values and
//!   the interception adapters (`ReactiveMap`, `Ref`)
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use reflex_core::reactive::{effect, ReactiveMap};
//!
//! let state = ReactiveMap::from_entries([("a", 1_i64), ("b", 2_i64)]);
//! let sum = Arc::new(AtomicI64::new(0));
//!
//! let reader = state.clone();
//! let observed = sum.clone();
//! let _effect = effect(move || {
//!     let total = reader.get("a").unwrap_or(0) + reader.get("b").unwrap_or(0);
//!     observed.store(total, Ordering::SeqCst);
//! });
//! assert_eq!(sum.load(Ordering::SeqCst), 3);
//!
//! state.set("a", 2);
//! assert_eq!(sum.load(Ordering::SeqCst), 4);
//! ```

pub mod error;
pub mod reactive;

pub use error::{Error, Result};
