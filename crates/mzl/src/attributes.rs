//! Per-instance attribute storage.
//!
//! Every constructed [`Instance`](crate::Instance) carries an [`Attributes`]
//! bag. Generated child and collection accessors keep their values here,
//! initialized lazily through [`Attributes::get_or_init`].

use std::any::{Any, type_name};
use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::BuildError;

type Slot = Box<dyn Any + Send + Sync>;

/// Named, type-erased values attached to a single instance.
#[derive(Default)]
pub struct Attributes {
    slots: FxHashMap<String, Slot>,
}

impl Attributes {
    /// Creates an empty attribute bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`, initializing it first if unset.
    ///
    /// `init` runs at most once per key: once a value is stored it is
    /// returned as-is on every later call. Fails if the stored value is not
    /// a `V`.
    pub fn get_or_init<V, F>(&mut self, key: &str, init: F) -> Result<&mut V, BuildError>
    where
        V: Any + Send + Sync,
        F: FnOnce() -> V,
    {
        let slot = match self.slots.entry(key.to_owned()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let value: Slot = Box::new(init());
                entry.insert(value)
            }
        };
        slot.downcast_mut::<V>().ok_or_else(|| BuildError::AttributeType {
            key: key.to_owned(),
            expected: type_name::<V>(),
        })
    }

    /// Returns the value under `key` if it is set and holds a `V`.
    pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
        self.slots.get(key)?.downcast_ref::<V>()
    }

    /// Mutable variant of [`Attributes::get`].
    pub fn get_mut<V: Any>(&mut self, key: &str) -> Option<&mut V> {
        self.slots.get_mut(key)?.downcast_mut::<V>()
    }

    /// Like [`Attributes::get_mut`], but reports why the lookup failed.
    pub(crate) fn require_mut<V: Any>(&mut self, key: &str) -> Result<&mut V, BuildError> {
        self.get_mut::<V>(key).ok_or_else(|| BuildError::AttributeType {
            key: key.to_owned(),
            expected: type_name::<V>(),
        })
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) {
        self.slots.insert(key.into(), Box::new(value));
    }

    /// Removes the value under `key`. Returns true if something was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Iterates over the stored keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Attributes").field("keys", &keys).finish()
    }
}
