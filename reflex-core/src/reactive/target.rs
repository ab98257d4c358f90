//! Tracked object identity and property keys.
//!
//! The registry never holds the objects it tracks. It is keyed by a
//! [`TargetId`], and each tracked object owns a [`TargetHandle`] that evicts
//! the object's registry entry when the last reference to it goes away.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::Runtime;

/// Identity of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Names a slot within a tracked object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    /// A string-named property.
    Named(Cow<'static, str>),
    /// A positional slot.
    Index(usize),
    /// A unique key that can never collide with a user-supplied name.
    Symbol(u64),
}

impl PropertyKey {
    /// A named key from a static string, usable in `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        Self::Named(Cow::Borrowed(name))
    }

    /// Mint a fresh symbol key.
    ///
    /// Symbol `0` is reserved for the iteration key of reactive maps.
    pub fn symbol() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self::Symbol(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The key's name, if it is a named key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{}]", index),
            Self::Symbol(id) => write!(f, "Symbol({})", id),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        Self::Named(Cow::Owned(name.to_owned()))
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        Self::Named(Cow::Owned(name))
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}

/// Anything with a stable identity in the dependency registry.
pub trait Target {
    /// The identity used as the registry key.
    fn target_id(&self) -> TargetId;
}

impl Target for TargetId {
    fn target_id(&self) -> TargetId {
        *self
    }
}

/// Owned identity token of a tracked object.
///
/// Dropping the handle evicts the object's entry from the registry. Types that
/// are cheap to clone keep the handle behind an `Arc` so all clones share one
/// identity.
///
/// An effect whose body captures a clone of the object it reads keeps that
/// clone, and so this handle, alive through the object's own dep sets. Drop
/// never fires in that case: [`Effect::dispose`] or [`Runtime::untrack`]
/// releases the entry instead.
///
/// [`Effect::dispose`]: super::Effect::dispose
#[derive(Debug)]
pub struct TargetHandle {
    id: TargetId,
}

impl TargetHandle {
    /// Mint a new identity.
    pub fn new() -> Self {
        Self { id: TargetId::new() }
    }

    /// The identity this handle owns.
    pub fn id(&self) -> TargetId {
        self.id
    }
}

impl Default for TargetHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Target for TargetHandle {
    fn target_id(&self) -> TargetId {
        self.id
    }
}

impl Drop for TargetHandle {
    fn drop(&mut self) {
        Runtime::untrack(self.id);
    }
}
