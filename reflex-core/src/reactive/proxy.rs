//! Interception Adapters
//!
//! Wrappers that turn plain data into tracked objects: every read calls
//! `track` before reading, every write writes and then calls `trigger`.
//!
//! - [`ReactiveMap`] holds values under dynamic [`PropertyKey`]s, the closest
//!   analogue of a plain object with arbitrary properties.
//! - [`Ref`] holds a single value.
//!
//! Both are cheap handles. Clones share identity and storage, and the last
//! clone to drop evicts the object from the registry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::runtime::Runtime;
use super::target::{PropertyKey, Target, TargetHandle, TargetId};
use crate::error::{Error, Result};

/// Key tracked by operations that depend on which keys exist.
///
/// Adding or removing a key triggers it; overwriting an existing key does not.
pub const ITERATE_KEY: PropertyKey = PropertyKey::Symbol(0);

/// Key under which a [`Ref`]'s value is tracked.
pub const REF_VALUE_KEY: PropertyKey = PropertyKey::from_static("value");

struct MapInner<V> {
    handle: TargetHandle,
    entries: RwLock<IndexMap<PropertyKey, V>>,
}

/// A tracked key/value object.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::ReactiveMap;
///
/// let user = ReactiveMap::new();
/// assert!(user.set("name", "ada".to_string()));
/// assert_eq!(user.get("name").as_deref(), Some("ada"));
/// ```
pub struct ReactiveMap<V> {
    inner: Arc<MapInner<V>>,
}

impl<V> ReactiveMap<V>
where
    V: Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self::from_entries(std::iter::empty::<(PropertyKey, V)>())
    }

    /// Create a map holding the given entries.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<PropertyKey>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            inner: Arc::new(MapInner {
                handle: TargetHandle::new(),
                entries: RwLock::new(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key.into(), value))
                        .collect(),
                ),
            }),
        }
    }

    fn id(&self) -> TargetId {
        self.inner.handle.id()
    }

    /// Read a value, subscribing the running effect to `key`.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Option<V> {
        let key = key.into();
        Runtime::track(self.id(), &key);
        self.inner.entries.read().get(&key).cloned()
    }

    /// Read a value without tracking.
    pub fn get_untracked(&self, key: impl Into<PropertyKey>) -> Option<V> {
        self.inner.entries.read().get(&key.into()).cloned()
    }

    /// Whether `key` is present, subscribing the running effect to `key`.
    pub fn contains_key(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        Runtime::track(self.id(), &key);
        self.inner.entries.read().contains_key(&key)
    }

    /// Write a value and notify readers of `key`.
    ///
    /// Always returns `true`: the write itself cannot fail.
    pub fn set(&self, key: impl Into<PropertyKey>, value: V) -> bool {
        let key = key.into();
        let added = self.inner.entries.write().insert(key.clone(), value).is_none();

        Runtime::trigger(self.id(), &key);
        if added {
            Runtime::trigger(self.id(), &ITERATE_KEY);
        }
        true
    }

    /// Modify a value in place and notify readers of `key`.
    ///
    /// Returns `false` without triggering if the key is absent.
    pub fn update(&self, key: impl Into<PropertyKey>, f: impl FnOnce(&mut V)) -> bool {
        let key = key.into();
        let updated = match self.inner.entries.write().get_mut(&key) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        };

        if updated {
            Runtime::trigger(self.id(), &key);
        }
        updated
    }

    /// Remove a value and notify readers of `key` and of the key set.
    pub fn remove(&self, key: impl Into<PropertyKey>) -> Option<V> {
        let key = key.into();
        let removed = self.inner.entries.write().shift_remove(&key);

        if removed.is_some() {
            Runtime::trigger(self.id(), &key);
            Runtime::trigger(self.id(), &ITERATE_KEY);
        }
        removed
    }

    /// Current keys in insertion order, subscribing to key additions and removals.
    pub fn keys(&self) -> Vec<PropertyKey> {
        Runtime::track(self.id(), &ITERATE_KEY);
        self.inner.entries.read().keys().cloned().collect()
    }

    /// Number of entries, subscribing to key additions and removals.
    pub fn len(&self) -> usize {
        Runtime::track(self.id(), &ITERATE_KEY);
        self.inner.entries.read().len()
    }

    /// Whether the map is empty, subscribing to key additions and removals.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReactiveMap<Value> {
    /// Build a map from the members of a JSON object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(members) => Ok(Self::from_entries(members)),
            _ => Err(Error::NotAnObject),
        }
    }

    /// Parse a JSON object.
    pub fn from_json_str(source: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(source)?)
    }

    /// Snapshot the map as a JSON object without tracking.
    ///
    /// Symbol keys have no JSON spelling and are skipped.
    pub fn to_json(&self) -> Value {
        let entries = self.inner.entries.read();
        let mut members = Map::with_capacity(entries.len());
        for (key, value) in entries.iter() {
            let name = match key {
                PropertyKey::Named(name) => name.to_string(),
                PropertyKey::Index(index) => index.to_string(),
                PropertyKey::Symbol(_) => continue,
            };
            members.insert(name, value.clone());
        }
        Value::Object(members)
    }
}

impl<V: Clone> Default for ReactiveMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Target for ReactiveMap<V> {
    fn target_id(&self) -> TargetId {
        self.inner.handle.id()
    }
}

impl<V> Clone for ReactiveMap<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ReactiveMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveMap")
            .field("id", &self.inner.handle.id())
            .field("entries", &*self.inner.entries.read())
            .finish()
    }
}

struct RefInner<T> {
    handle: TargetHandle,
    value: RwLock<T>,
}

/// A tracked single value.
pub struct Ref<T> {
    inner: Arc<RefInner<T>>,
}

impl<T> Ref<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RefInner {
                handle: TargetHandle::new(),
                value: RwLock::new(value),
            }),
        }
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        Runtime::track(self.inner.handle.id(), &REF_VALUE_KEY);
        self.inner.value.read().clone()
    }

    /// Read the value without tracking.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.read().clone()
    }

    /// Borrow the value for the duration of `f`, subscribing the running effect.
    ///
    /// `f` must not write to this ref.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.handle.id(), &REF_VALUE_KEY);
        f(&self.inner.value.read())
    }

    /// Replace the value and notify readers. Always returns `true`.
    pub fn set(&self, value: T) -> bool {
        *self.inner.value.write() = value;
        Runtime::trigger(self.inner.handle.id(), &REF_VALUE_KEY);
        true
    }

    /// Modify the value in place and notify readers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.write());
        Runtime::trigger(self.inner.handle.id(), &REF_VALUE_KEY);
    }
}

impl<T> Target for Ref<T> {
    fn target_id(&self) -> TargetId {
        self.inner.handle.id()
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.handle.id())
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, Registry};
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn reads_outside_effects_are_not_tracked() {
        let map = ReactiveMap::from_entries([("a", 1)]);
        assert_eq!(map.get("a"), Some(1));
        assert!(!Registry::contains(map.target_id()));
    }

    #[test]
    fn set_reruns_readers_of_that_key_only() {
        let map = ReactiveMap::from_entries([("a", 1), ("b", 2)]);
        let runs = Arc::new(AtomicI32::new(0));

        let reader = map.clone();
        let runs_clone = runs.clone();
        let _effect = effect(move || {
            reader.get("a");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(map.set("b", 3));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert!(map.set("a", 3));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn key_set_changes_rerun_iterating_readers() {
        let map = ReactiveMap::from_entries([("a", 1)]);
        let seen = Arc::new(AtomicI32::new(0));

        let reader = map.clone();
        let seen_clone = seen.clone();
        let _effect = effect(move || {
            seen_clone.store(reader.len() as i32, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // Overwrite: key set unchanged
        map.set("a", 5);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        map.set("b", 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        assert_eq!(map.remove("a"), Some(5));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert_eq!(map.remove("missing"), None);
        assert_eq!(map.keys(), vec![PropertyKey::from("b")]);
    }

    #[test]
    fn update_triggers_only_existing_keys() {
        let map = ReactiveMap::from_entries([("n", 1)]);
        let runs = Arc::new(AtomicI32::new(0));

        let reader = map.clone();
        let runs_clone = runs.clone();
        let _effect = effect(move || {
            reader.get("n");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(map.update("n", |n| *n += 1));
        assert!(!map.update("missing", |n| *n += 1));
        assert_eq!(map.get_untracked("n"), Some(2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn json_round_trip_through_map() {
        let map = ReactiveMap::<Value>::from_json(json!({"ok": true, "a": 1})).unwrap();
        assert_eq!(map.get("a"), Some(json!(1)));

        map.set("b", json!("two"));
        assert_eq!(map.to_json(), json!({"ok": true, "a": 1, "b": "two"}));
    }

    #[test]
    fn json_requires_an_object() {
        assert!(matches!(
            ReactiveMap::<Value>::from_json(json!([1, 2])),
            Err(Error::NotAnObject)
        ));
        assert!(matches!(
            ReactiveMap::<Value>::from_json_str("{not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn ref_get_set_update() {
        let count = Ref::new(1);
        let observed = Arc::new(AtomicI32::new(0));

        let reader = count.clone();
        let observed_clone = observed.clone();
        let _effect = effect(move || {
            observed_clone.store(reader.get(), Ordering::SeqCst);
        });
        assert_eq!(observed.load(Ordering::SeqCst), 1);

        assert!(count.set(10));
        assert_eq!(observed.load(Ordering::SeqCst), 10);

        count.update(|n| *n *= 2);
        assert_eq!(observed.load(Ordering::SeqCst), 20);
        assert_eq!(count.with(|n| *n + 1), 21);
    }

    #[test]
    fn last_clone_drop_evicts_target() {
        let map = ReactiveMap::from_entries([("a", 1)]);
        let id = map.target_id();
        Registry::dep_set_or_default(id, &PropertyKey::from("a"));

        let clone = map.clone();
        drop(map);
        assert!(Registry::contains(id));

        drop(clone);
        assert!(!Registry::contains(id));
    }
}
